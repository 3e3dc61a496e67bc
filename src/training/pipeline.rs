//! The PPO training loop.
//!
//! ```text
//! 1. Warm up the scaler with a batch of episodes (discarded)
//! 2. While episode < num_episodes:
//!      a. Collect episodes_per_batch episodes (scaler updated afterwards)
//!      b. Predict values, scale rewards by (1 - gamma)
//!      c. Discounted returns and GAE over the batch, normalize advantages
//!      d. Policy update, value update
//!      e. Every eval_interval_batches batches: one evaluation episode
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::agent::PpoAgent;
use crate::config::TrainConfig;
use crate::env::Environment;
use crate::rollout::{Batch, BatchCollector};
use crate::scaler::Scaler;

use super::advantage::{
    calc_gae, discount_sum_rewards, episode_targets, normalize_advantages, scale_rewards,
};
use super::metrics::{BatchMetrics, MetricsSink};

pub const METRICS_FILE: &str = "metrics.jsonl";
pub const SCALER_FILE: &str = "scaler.json";

/// Orchestrates collection, estimation and the agent's learning steps.
pub struct TrainingPipeline {
    config: TrainConfig,
    collector: BatchCollector,
    run_dir: Option<PathBuf>,
}

impl TrainingPipeline {
    /// Create a pipeline, rejecting invalid hyperparameters.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate().context("invalid training configuration")?;
        let collector = BatchCollector::from_config(&config.rollout);
        Ok(Self {
            config,
            collector,
            run_dir: None,
        })
    }

    /// Write `metrics.jsonl` and the final `scaler.json` into `dir`.
    pub fn with_run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Run the complete training loop.
    pub fn run<E, A>(
        &self,
        env: &mut E,
        agent: &mut A,
        scaler: &mut Scaler,
    ) -> Result<Vec<BatchMetrics>>
    where
        E: Environment,
        A: PpoAgent,
    {
        let ppo = &self.config.ppo;
        let rollout = &self.config.rollout;

        info!(
            env = %self.config.env,
            num_episodes = ppo.num_episodes,
            episodes_per_batch = rollout.episodes_per_batch,
            gamma = ppo.gamma,
            lam = ppo.lam,
            kl_targ = ppo.kl_targ,
            loss_type = %ppo.loss_type,
            "Starting PPO training"
        );

        let mut sink = match &self.run_dir {
            Some(dir) => Some(MetricsSink::create(&dir.join(METRICS_FILE))?),
            None => None,
        };

        if rollout.warmup_episodes > 0 {
            self.collector
                .collect(env, agent, scaler, rollout.warmup_episodes)
                .context("scaler warm-up failed")?;
            info!(
                episodes = rollout.warmup_episodes,
                observations = scaler.count(),
                "Scaler warm-up complete"
            );
        }

        let mut all_metrics = Vec::new();
        let mut episode = 0usize;
        let mut batch_index = 0usize;

        while episode < ppo.num_episodes {
            let batch = self
                .collector
                .collect(env, agent, scaler, rollout.episodes_per_batch)
                .with_context(|| format!("collecting batch {} failed", batch_index + 1))?;
            episode += rollout.episodes_per_batch;
            batch_index += 1;

            let mut metrics = self.train_step(agent, &batch, batch_index, episode)?;

            info!(
                "Episode {}, Train reward: {}, Policy loss: {}, KL: {}, Value loss: {}",
                episode, metrics.train_reward, metrics.policy_loss, metrics.kl, metrics.value_loss
            );

            if batch_index % ppo.eval_interval_batches == 0 {
                let eval_reward = self
                    .collector
                    .runner()
                    .run_evaluate_episode(env, agent, scaler)
                    .context("evaluation episode failed")?;
                info!("Episode {}, Evaluate reward: {}", episode, eval_reward);
                metrics.eval_reward = Some(eval_reward);
            }

            if let Some(sink) = sink.as_mut() {
                sink.record(&metrics)?;
            }
            all_metrics.push(metrics);
        }

        if let Some(dir) = &self.run_dir {
            save_scaler(scaler, &dir.join(SCALER_FILE))?;
        }

        info!(
            episodes = episode,
            batches = batch_index,
            "PPO training finished"
        );
        Ok(all_metrics)
    }

    /// Estimate targets for one batch and run both learning steps.
    pub fn train_step<A: PpoAgent>(
        &self,
        agent: &mut A,
        batch: &Batch,
        batch_index: usize,
        episode: usize,
    ) -> Result<BatchMetrics> {
        let ppo = &self.config.ppo;

        let values = agent.value_predict(&batch.observations)?;
        let scaled = scale_rewards(&batch.rewards, ppo.gamma);
        let (returns, advantages) = if ppo.per_episode_targets {
            episode_targets(&scaled, &values, &batch.episode_ranges(), ppo.gamma, ppo.lam)?
        } else {
            // Discounting runs over the flat batch and crosses episode boundaries.
            (
                discount_sum_rewards(&scaled, ppo.gamma),
                calc_gae(&scaled, &values, ppo.gamma, ppo.lam)?,
            )
        };
        let advantages = normalize_advantages(&advantages)
            .with_context(|| format!("batch {batch_index} produced unusable advantages"))?;

        let policy = agent
            .policy_learn(&batch.observations, &batch.actions, &advantages)
            .context("policy update failed")?;
        let value_loss = agent
            .value_learn(&batch.observations, &returns)
            .context("value update failed")?;

        Ok(BatchMetrics {
            batch: batch_index,
            episode,
            train_reward: batch.total_reward() / self.config.rollout.episodes_per_batch as f64,
            policy_loss: policy.loss,
            kl: policy.kl,
            value_loss,
            steps: batch.len(),
            mean_episode_length: batch.mean_episode_length(),
            eval_reward: None,
            timestamp: Utc::now(),
        })
    }
}

fn save_scaler(scaler: &Scaler, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(scaler)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to save scaler to {}", path.display()))?;
    info!(path = %path.display(), "Scaler saved");
    Ok(())
}
