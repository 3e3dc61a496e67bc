//! ppo-rollout: train a PPO agent on a continuous-control environment.
//!
//! Flags override the values of an optional JSON `--config` file, which in
//! turn override the built-in defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ppo_rollout::agent::LinearGaussianAgent;
use ppo_rollout::config::{LossType, TrainConfig};
use ppo_rollout::env::{make_env, Environment};
use ppo_rollout::logging;
use ppo_rollout::scaler::Scaler;
use ppo_rollout::training::TrainingPipeline;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Train a PPO agent on a continuous-control environment.
#[derive(Parser)]
#[command(name = "ppo-rollout", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment name.
    #[arg(long)]
    env: Option<String>,

    /// Number of episodes to run.
    #[arg(long = "num_episodes", alias = "num-episodes")]
    num_episodes: Option<usize>,

    /// Discount factor.
    #[arg(long)]
    gamma: Option<f64>,

    /// Lambda for Generalized Advantage Estimation.
    #[arg(long)]
    lam: Option<f64>,

    /// D_KL target value.
    #[arg(long = "kl_targ", alias = "kl-targ")]
    kl_targ: Option<f64>,

    /// Number of episodes per training batch.
    #[arg(long = "episodes_per_batch", alias = "episodes-per-batch")]
    episodes_per_batch: Option<usize>,

    /// Loss type of the PPO policy update: CLIP or KLPEN.
    #[arg(long = "loss_type", alias = "loss-type")]
    loss_type: Option<LossType>,

    /// Directory that receives the per-run log directory.
    #[arg(long = "log_root", alias = "log-root")]
    log_root: Option<PathBuf>,

    /// Seed for the environment and the agent's action sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Truncate episodes longer than this many steps.
    #[arg(long = "max_episode_steps", alias = "max-episode-steps")]
    max_episode_steps: Option<usize>,
}

impl Cli {
    /// Load `--config` (or the defaults) and apply the flag overrides.
    fn into_config(self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::load(path)?,
            None => TrainConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(self, config: &mut TrainConfig) {
        if let Some(env) = self.env {
            config.env = env;
        }
        if let Some(v) = self.num_episodes {
            config.ppo.num_episodes = v;
        }
        if let Some(v) = self.gamma {
            config.ppo.gamma = v;
        }
        if let Some(v) = self.lam {
            config.ppo.lam = v;
        }
        if let Some(v) = self.kl_targ {
            config.ppo.kl_targ = v;
        }
        if let Some(v) = self.episodes_per_batch {
            config.rollout.episodes_per_batch = v;
        }
        if let Some(v) = self.loss_type {
            config.ppo.loss_type = v;
        }
        if let Some(v) = self.log_root {
            config.log_root = v;
        }
        if let Some(v) = self.seed {
            config.ppo.seed = Some(v);
        }
        if let Some(v) = self.max_episode_steps {
            config.rollout.max_episode_steps = Some(v);
        }
    }
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    config.validate().context("invalid configuration")?;

    let run_dir = logging::create_run_dir(&config.log_root, config.ppo.loss_type)?;
    let _guard = logging::init(&run_dir)?;
    tracing::info!(run_dir = %run_dir.display(), "Logging to run directory");

    std::fs::write(
        run_dir.join("config.json"),
        serde_json::to_string_pretty(&config)?,
    )
    .context("Failed to save run configuration")?;

    let seed = config.ppo.seed.unwrap_or_else(rand::random);
    let mut env = make_env(&config.env, seed)?;

    // One extra dimension for the time-step feature.
    let obs_dim = env.observation_space().dim() + 1;
    let act_dim = env.action_space().dim();
    tracing::info!(obs_dim, act_dim, seed, "Building agent");

    let mut scaler = Scaler::new(obs_dim);
    let mut agent = LinearGaussianAgent::new(
        obs_dim,
        act_dim,
        config.ppo.kl_targ,
        config.ppo.loss_type,
        &config.agent,
        seed.wrapping_add(1),
    );

    let pipeline = TrainingPipeline::new(config)?.with_run_dir(&run_dir);
    let metrics = pipeline.run(&mut env, &mut agent, &mut scaler)?;

    if let Some(last) = metrics.last() {
        tracing::info!(
            episodes = last.episode,
            train_reward = last.train_reward,
            beta = agent.kl_controller().beta(),
            lr_multiplier = agent.kl_controller().lr_multiplier(),
            "Training complete"
        );
    }

    Ok(())
}
