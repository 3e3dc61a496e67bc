use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Complete configuration for a PPO training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Registered environment name (see [`crate::env::make_env`]).
    pub env: String,
    pub rollout: RolloutConfig,
    pub ppo: PpoConfig,
    pub agent: AgentConfig,
    /// Parent directory of per-run log directories.
    pub log_root: PathBuf,
}

/// Episode collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Episodes per training batch (default: 5).
    pub episodes_per_batch: usize,
    /// Episodes run once before training to initialise the scaler (default: 5).
    pub warmup_episodes: usize,
    /// Truncate episodes that run longer than this (default: none).
    pub max_episode_steps: Option<usize>,
    /// Increment of the synthetic time-step feature per step (default: 1e-3).
    pub time_step_increment: f64,
}

/// PPO loop hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    /// Total training episodes, warm-up excluded (default: 10000).
    pub num_episodes: usize,
    /// Discount factor (default: 0.995).
    pub gamma: f64,
    /// GAE lambda (default: 0.98).
    pub lam: f64,
    /// Target KL divergence per policy update (default: 0.003).
    pub kl_targ: f64,
    pub loss_type: LossType,
    /// Run an evaluation episode every this many batches (default: 5).
    pub eval_interval_batches: usize,
    /// Restart returns and GAE at every episode boundary instead of
    /// discounting across the concatenated batch (default: false).
    pub per_episode_targets: bool,
    /// RNG seed for the agent's action sampling.
    pub seed: Option<u64>,
}

/// Initial settings of the reference agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Policy learning rate before the KL multiplier (default: 3e-3).
    pub policy_lr: f64,
    /// Value learning rate (default: 1e-2).
    pub value_lr: f64,
    /// Initial log standard deviation of the Gaussian policy (default: -0.5).
    pub init_log_std: f64,
    /// Gradient epochs per policy update (default: 20).
    pub policy_epochs: usize,
    /// Gradient epochs per value update (default: 10).
    pub value_epochs: usize,
    /// Initial KL penalty coefficient (default: 1.0).
    pub init_beta: f64,
    /// Ratio clip range for the CLIP surrogate (default: 0.2).
    pub clip_epsilon: f64,
}

/// Surrogate objective used by the policy update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossType {
    #[serde(rename = "CLIP")]
    Clip,
    #[serde(rename = "KLPEN")]
    KlPen,
}

impl LossType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clip => "CLIP",
            Self::KlPen => "KLPEN",
        }
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CLIP" => Ok(Self::Clip),
            "KLPEN" => Ok(Self::KlPen),
            other => bail!("unknown loss type {other:?}, expected CLIP or KLPEN"),
        }
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            env: "Pendulum-v0".into(),
            rollout: RolloutConfig::default(),
            ppo: PpoConfig::default(),
            agent: AgentConfig::default(),
            log_root: PathBuf::from("./log_dir"),
        }
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            episodes_per_batch: 5,
            warmup_episodes: 5,
            max_episode_steps: None,
            time_step_increment: 1e-3,
        }
    }
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            num_episodes: 10_000,
            gamma: 0.995,
            lam: 0.98,
            kl_targ: 0.003,
            loss_type: LossType::Clip,
            eval_interval_batches: 5,
            per_episode_targets: false,
            seed: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            policy_lr: 3e-3,
            value_lr: 1e-2,
            init_log_std: -0.5,
            policy_epochs: 20,
            value_epochs: 10,
            init_beta: 1.0,
            clip_epsilon: 0.2,
        }
    }
}

impl TrainConfig {
    /// Read a configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Reject hyperparameters the training loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let ppo = &self.ppo;
        if !(0.0..=1.0).contains(&ppo.gamma) {
            bail!("gamma must lie in [0, 1], got {}", ppo.gamma);
        }
        if !(0.0..=1.0).contains(&ppo.lam) {
            bail!("lam must lie in [0, 1], got {}", ppo.lam);
        }
        if !(ppo.kl_targ > 0.0) {
            bail!("kl_targ must be positive, got {}", ppo.kl_targ);
        }
        if ppo.eval_interval_batches == 0 {
            bail!("eval_interval_batches must be at least 1");
        }
        if self.rollout.episodes_per_batch == 0 {
            bail!("episodes_per_batch must be at least 1");
        }
        if self.rollout.max_episode_steps == Some(0) {
            bail!("max_episode_steps must be at least 1 when set");
        }
        if !(self.rollout.time_step_increment.is_finite()) {
            bail!("time_step_increment must be finite");
        }
        let agent = &self.agent;
        if !(agent.policy_lr > 0.0) || !(agent.value_lr > 0.0) {
            bail!("learning rates must be positive");
        }
        if !(agent.init_beta > 0.0) {
            bail!("init_beta must be positive, got {}", agent.init_beta);
        }
        if !(agent.clip_epsilon > 0.0 && agent.clip_epsilon < 1.0) {
            bail!("clip_epsilon must lie in (0, 1), got {}", agent.clip_epsilon);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = TrainConfig::default();
        assert_eq!(config.ppo.num_episodes, 10_000);
        assert!((config.ppo.gamma - 0.995).abs() < 1e-12);
        assert!((config.ppo.lam - 0.98).abs() < 1e-12);
        assert!((config.ppo.kl_targ - 0.003).abs() < 1e-12);
        assert_eq!(config.rollout.episodes_per_batch, 5);
        assert_eq!(config.rollout.warmup_episodes, 5);
        assert_eq!(config.ppo.loss_type, LossType::Clip);
        assert!(!config.ppo.per_episode_targets);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loss_type_parses_case_insensitively() {
        assert_eq!("clip".parse::<LossType>().unwrap(), LossType::Clip);
        assert_eq!("KLPEN".parse::<LossType>().unwrap(), LossType::KlPen);
        assert!("adam".parse::<LossType>().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"env": "PointMass-v0", "ppo": {"gamma": 0.9, "loss_type": "KLPEN"}}"#;
        let config: TrainConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.env, "PointMass-v0");
        assert!((config.ppo.gamma - 0.9).abs() < 1e-12);
        assert_eq!(config.ppo.loss_type, LossType::KlPen);
        assert_eq!(config.ppo.num_episodes, 10_000);
        assert_eq!(config.rollout.episodes_per_batch, 5);
    }

    #[test]
    fn test_validate_rejects_bad_hyperparameters() {
        let mut config = TrainConfig::default();
        config.ppo.gamma = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.rollout.episodes_per_batch = 0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.ppo.kl_targ = 0.0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.ppo.lam = f64::NAN;
        assert!(config.validate().is_err());
    }
}
