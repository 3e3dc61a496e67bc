//! Training module: return/advantage estimation and the PPO training loop.

pub mod advantage;
pub mod metrics;
pub mod pipeline;

pub use advantage::{
    calc_gae, discount_sum_rewards, episode_targets, normalize_advantages, scale_rewards,
};
pub use metrics::{BatchMetrics, MetricsSink};
pub use pipeline::TrainingPipeline;
