//! The capability interface the training loop needs from a PPO agent.
//!
//! The loop never looks inside the agent: any policy/value implementation
//! (linear, neural, remote) can be substituted as long as it provides these
//! five operations.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Statistics reported by a policy update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyLearnStats {
    /// Surrogate loss after the update.
    pub loss: f64,
    /// Mean KL divergence between the pre-update and post-update policies.
    pub kl: f64,
}

pub trait PpoAgent {
    /// Draw a stochastic action for one normalized observation.
    fn policy_sample(&mut self, obs: &[f64]) -> Result<Vec<f64>>;

    /// The deterministic (mode) action for one normalized observation.
    fn policy_predict(&self, obs: &[f64]) -> Result<Vec<f64>>;

    /// State-value predictions for a batch of normalized observations.
    fn value_predict(&self, obs: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Improve the policy from `(obs, action, advantage)` triples.
    fn policy_learn(
        &mut self,
        obs: &[Vec<f64>],
        actions: &[Vec<f64>],
        advantages: &[f64],
    ) -> Result<PolicyLearnStats>;

    /// Regress the value function onto `targets`; returns the value loss.
    fn value_learn(&mut self, obs: &[Vec<f64>], targets: &[f64]) -> Result<f64>;
}
