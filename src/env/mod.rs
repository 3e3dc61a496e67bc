//! Environment abstractions and built-in implementations.
//!
//! Every environment implements the [`Environment`] trait so that the episode
//! runner can interact with it uniformly.
//!
//! Included environments:
//! - **Pendulum** ([`pendulum`]) -- torque-limited pendulum swing-up.
//! - **PointMass** ([`point_mass`]) -- 1-D point mass regulated to the origin.
//! - **Constant** ([`mock`]) -- scripted rewards, for tests and smoke runs.

pub mod mock;
pub mod pendulum;
pub mod point_mass;
pub mod traits;

pub use traits::{BoxSpace, EnvStep, Environment};

use anyhow::{bail, Result};

/// Names accepted by [`make_env`].
pub const REGISTERED_ENVS: &[&str] = &["Pendulum-v0", "PointMass-v0", "Constant-v0"];

// ---------------------------------------------------------------------------
// AnyEnv: enum dispatch wrapper for runtime environment selection
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete environment types, so the binary can
/// pick one by name.
#[derive(Debug)]
pub enum AnyEnv {
    Pendulum(pendulum::Pendulum),
    PointMass(point_mass::PointMass),
    Constant(mock::ConstantRewardEnv),
}

/// Construct a registered environment by name.
pub fn make_env(name: &str, seed: u64) -> Result<AnyEnv> {
    let env = match name {
        "Pendulum-v0" => AnyEnv::Pendulum(pendulum::Pendulum::new(seed)),
        "PointMass-v0" => AnyEnv::PointMass(point_mass::PointMass::new(seed)),
        "Constant-v0" => AnyEnv::Constant(mock::ConstantRewardEnv::default()),
        other => bail!(
            "unknown environment {other:?}, expected one of {}",
            REGISTERED_ENVS.join(", ")
        ),
    };
    tracing::info!(env = name, seed, "Environment created");
    Ok(env)
}

impl Environment for AnyEnv {
    fn reset(&mut self) -> Result<Vec<f64>> {
        match self {
            Self::Pendulum(e) => e.reset(),
            Self::PointMass(e) => e.reset(),
            Self::Constant(e) => e.reset(),
        }
    }

    fn step(&mut self, action: &[f64]) -> Result<EnvStep> {
        match self {
            Self::Pendulum(e) => e.step(action),
            Self::PointMass(e) => e.step(action),
            Self::Constant(e) => e.step(action),
        }
    }

    fn observation_space(&self) -> &BoxSpace {
        match self {
            Self::Pendulum(e) => e.observation_space(),
            Self::PointMass(e) => e.observation_space(),
            Self::Constant(e) => e.observation_space(),
        }
    }

    fn action_space(&self) -> &BoxSpace {
        match self {
            Self::Pendulum(e) => e.action_space(),
            Self::PointMass(e) => e.action_space(),
            Self::Constant(e) => e.action_space(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_every_name() {
        for name in REGISTERED_ENVS {
            let mut env = make_env(name, 0).unwrap();
            let obs = env.reset().unwrap();
            assert_eq!(obs.len(), env.observation_space().dim());
        }
    }

    #[test]
    fn test_registry_rejects_unknown_name() {
        let err = make_env("HalfCheetah-v2", 0).unwrap_err();
        assert!(err.to_string().contains("HalfCheetah-v2"));
    }
}
