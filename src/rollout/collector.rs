//! Batch collection: several training episodes followed by a scaler update.
//!
//! All episodes of a batch are normalized with the scaler state from before
//! the batch; the batch's unscaled observations are folded into the scaler
//! only once every episode has finished.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::agent::PpoAgent;
use crate::config::RolloutConfig;
use crate::env::Environment;
use crate::scaler::Scaler;

use super::runner::EpisodeRunner;
use super::types::Batch;

#[derive(Debug, Clone, Default)]
pub struct BatchCollector {
    runner: EpisodeRunner,
}

impl BatchCollector {
    pub fn new(runner: EpisodeRunner) -> Self {
        Self { runner }
    }

    pub fn from_config(config: &RolloutConfig) -> Self {
        Self::new(EpisodeRunner::from_config(config))
    }

    pub fn runner(&self) -> &EpisodeRunner {
        &self.runner
    }

    /// Run `episodes` training episodes and update `scaler` with everything
    /// they observed.
    pub fn collect<E, A>(
        &self,
        env: &mut E,
        agent: &mut A,
        scaler: &mut Scaler,
        episodes: usize,
    ) -> Result<Batch>
    where
        E: Environment,
        A: PpoAgent,
    {
        let mut trajectories = Vec::with_capacity(episodes);

        for ep in 0..episodes {
            let trajectory = self
                .runner
                .run_train_episode(env, agent, scaler)
                .with_context(|| format!("training episode {ep} failed"))?;
            debug!(
                episode = ep,
                steps = trajectory.len(),
                reward = trajectory.total_reward(),
                "Collected episode"
            );
            trajectories.push(trajectory);
        }

        let (batch, unscaled) = Batch::from_trajectories(trajectories);
        scaler
            .update(&unscaled)
            .context("failed to update observation scaler")?;

        info!(
            episodes = batch.num_episodes(),
            steps = batch.len(),
            mean_reward = batch.mean_episode_reward(),
            scaler_count = scaler.count(),
            "Collected batch"
        );
        Ok(batch)
    }
}
