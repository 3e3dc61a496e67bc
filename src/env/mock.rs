//! Scripted stub environment for tests and smoke runs.
//!
//! [`ConstantRewardEnv`] replays a fixed reward sequence every episode and
//! records the actions it receives, so rollout code can be checked without a
//! simulator.

use anyhow::{bail, Result};

use super::traits::{BoxSpace, EnvStep, Environment};

/// An environment that pays a scripted reward per step and terminates once the
/// script is exhausted.
///
/// The observation at step `t` is `base + t` in every dimension.
#[derive(Debug, Clone)]
pub struct ConstantRewardEnv {
    rewards: Vec<f64>,
    base: f64,
    observation_space: BoxSpace,
    action_space: BoxSpace,
    step_index: usize,
    done: bool,
    episodes_started: usize,
    received_actions: Vec<Vec<f64>>,
}

impl ConstantRewardEnv {
    /// Stub with `obs_dim` observations and `act_dim` actions bounded in `[-1, 1]`.
    pub fn new(rewards: Vec<f64>, obs_dim: usize, act_dim: usize) -> Self {
        Self {
            rewards,
            base: 0.0,
            observation_space: BoxSpace::unbounded(obs_dim),
            action_space: BoxSpace::symmetric(act_dim, 1.0),
            step_index: 0,
            done: true,
            episodes_started: 0,
            received_actions: Vec::new(),
        }
    }

    /// Replace the action bounds.
    pub fn with_action_space(mut self, action_space: BoxSpace) -> Self {
        self.action_space = action_space;
        self
    }

    /// Offset added to every observation.
    pub fn with_observation_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    /// Every action passed to [`Environment::step`] since construction.
    pub fn received_actions(&self) -> &[Vec<f64>] {
        &self.received_actions
    }

    pub fn episodes_started(&self) -> usize {
        self.episodes_started
    }

    fn observation(&self) -> Vec<f64> {
        vec![self.base + self.step_index as f64; self.observation_space.dim()]
    }
}

impl Default for ConstantRewardEnv {
    fn default() -> Self {
        Self::new(vec![1.0; 5], 3, 1)
    }
}

impl Environment for ConstantRewardEnv {
    fn reset(&mut self) -> Result<Vec<f64>> {
        if self.rewards.is_empty() {
            bail!("stub environment needs at least one scripted reward");
        }
        self.step_index = 0;
        self.done = false;
        self.episodes_started += 1;
        Ok(self.observation())
    }

    fn step(&mut self, action: &[f64]) -> Result<EnvStep> {
        if self.done {
            bail!("cannot step in a terminated episode");
        }
        if action.len() != self.action_space.dim() {
            bail!(
                "expected {} action components, got {}",
                self.action_space.dim(),
                action.len()
            );
        }
        self.received_actions.push(action.to_vec());

        let reward = self.rewards[self.step_index];
        self.step_index += 1;
        self.done = self.step_index >= self.rewards.len();

        Ok(EnvStep {
            observation: self.observation(),
            reward,
            done: self.done,
        })
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_scripted_rewards() {
        let mut env = ConstantRewardEnv::new(vec![1.0, 2.0, 3.0], 2, 1);
        let obs = env.reset().unwrap();
        assert_eq!(obs, vec![0.0, 0.0]);

        let mut total = 0.0;
        loop {
            let step = env.step(&[0.0]).unwrap();
            total += step.reward;
            if step.done {
                assert_eq!(step.observation, vec![3.0, 3.0]);
                break;
            }
        }
        assert!((total - 6.0).abs() < 1e-12);
        assert_eq!(env.received_actions().len(), 3);
    }

    #[test]
    fn test_refuses_to_step_after_termination() {
        let mut env = ConstantRewardEnv::new(vec![1.0], 1, 1);
        assert!(env.step(&[0.0]).is_err());
        env.reset().unwrap();
        env.step(&[0.0]).unwrap();
        assert!(env.step(&[0.0]).is_err());
    }

    #[test]
    fn test_rejects_wrong_action_width() {
        let mut env = ConstantRewardEnv::new(vec![1.0], 1, 2);
        env.reset().unwrap();
        assert!(env.step(&[0.0]).is_err());
    }
}
