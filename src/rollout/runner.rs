//! Single-episode rollouts.
//!
//! Every step of an episode:
//!   1. appends the time-step feature to the raw observation,
//!   2. normalizes it with the scaler state captured at episode start,
//!   3. asks the agent for an action (sampled when training, mode when
//!      evaluating),
//!   4. clips it to `[-1, 1]` and maps it onto the environment's action box,
//!   5. steps the environment and records the reward.

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::agent::PpoAgent;
use crate::config::RolloutConfig;
use crate::env::{BoxSpace, Environment};
use crate::scaler::{normalize, Scaler};

use super::types::Trajectory;

/// Map an action in `[-1, 1]` linearly onto `[space.low, space.high]`.
///
/// The result is clamped into the box, so inputs outside `[-1, 1]` land on
/// the nearest bound.
pub fn action_mapping(action: &[f64], space: &BoxSpace) -> Vec<f64> {
    action
        .iter()
        .zip(space.low.iter().zip(&space.high))
        .map(|(a, (low, high))| (low + (a + 1.0) * 0.5 * (high - low)).clamp(*low, *high))
        .collect()
}

/// Clip every component to `[-1, 1]`.
pub fn clip_action(action: &mut [f64]) {
    action.iter_mut().for_each(|a| *a = a.clamp(-1.0, 1.0));
}

/// Drives one environment episode at a time.
#[derive(Debug, Clone)]
pub struct EpisodeRunner {
    time_step_increment: f64,
    max_episode_steps: Option<usize>,
}

impl EpisodeRunner {
    pub fn new(time_step_increment: f64, max_episode_steps: Option<usize>) -> Self {
        Self {
            time_step_increment,
            max_episode_steps,
        }
    }

    pub fn from_config(config: &RolloutConfig) -> Self {
        Self::new(config.time_step_increment, config.max_episode_steps)
    }

    /// Run one training episode with stochastic actions.
    pub fn run_train_episode<E, A>(
        &self,
        env: &mut E,
        agent: &mut A,
        scaler: &Scaler,
    ) -> Result<Trajectory>
    where
        E: Environment,
        A: PpoAgent,
    {
        let (scale, offset) = scaler.get();
        let action_space = checked_action_space(env)?.clone();

        let mut trajectory = Trajectory::new();
        let mut obs = env.reset().context("environment reset failed")?;
        let mut time_step = 0.0;

        loop {
            if self.limit_reached(trajectory.len()) {
                warn!(
                    steps = trajectory.len(),
                    "Episode hit max_episode_steps, truncating"
                );
                trajectory.truncated = true;
                break;
            }

            let unscaled = augment(&obs, time_step, scaler.obs_dim())?;
            let scaled = normalize(&unscaled, &scale, &offset);

            let mut action = agent.policy_sample(&scaled)?;
            check_action_width(&action, &action_space)?;
            clip_action(&mut action);
            let env_action = action_mapping(&action, &action_space);

            let step = env.step(&env_action).context("environment step failed")?;

            trajectory.unscaled_observations.push(unscaled);
            trajectory.observations.push(scaled);
            trajectory.actions.push(action);
            trajectory.rewards.push(step.reward);

            obs = step.observation;
            time_step += self.time_step_increment;
            if step.done {
                break;
            }
        }

        debug!(
            id = %trajectory.id,
            steps = trajectory.len(),
            reward = trajectory.total_reward(),
            truncated = trajectory.truncated,
            "Training episode finished"
        );
        Ok(trajectory)
    }

    /// Run one evaluation episode with deterministic actions and return its
    /// total reward.
    pub fn run_evaluate_episode<E, A>(&self, env: &mut E, agent: &A, scaler: &Scaler) -> Result<f64>
    where
        E: Environment,
        A: PpoAgent,
    {
        let (scale, offset) = scaler.get();
        let action_space = checked_action_space(env)?.clone();

        let mut obs = env.reset().context("environment reset failed")?;
        let mut time_step = 0.0;
        let mut total_reward = 0.0;
        let mut steps = 0usize;

        loop {
            if self.limit_reached(steps) {
                warn!(steps, "Evaluation episode hit max_episode_steps, truncating");
                break;
            }

            let unscaled = augment(&obs, time_step, scaler.obs_dim())?;
            let scaled = normalize(&unscaled, &scale, &offset);

            let action = agent.policy_predict(&scaled)?;
            check_action_width(&action, &action_space)?;
            let env_action = action_mapping(&action, &action_space);

            let step = env.step(&env_action).context("environment step failed")?;
            total_reward += step.reward;
            steps += 1;

            obs = step.observation;
            time_step += self.time_step_increment;
            if step.done {
                break;
            }
        }

        debug!(steps, reward = total_reward, "Evaluation episode finished");
        Ok(total_reward)
    }

    fn limit_reached(&self, steps: usize) -> bool {
        self.max_episode_steps.is_some_and(|max| steps >= max)
    }
}

impl Default for EpisodeRunner {
    fn default() -> Self {
        Self::from_config(&RolloutConfig::default())
    }
}

/// Append the time-step feature, checking the result width.
fn augment(obs: &[f64], time_step: f64, expected_dim: usize) -> Result<Vec<f64>> {
    if obs.len() + 1 != expected_dim {
        bail!(
            "environment returned a {}-dimensional observation, expected {}",
            obs.len(),
            expected_dim.saturating_sub(1)
        );
    }
    let mut augmented = Vec::with_capacity(expected_dim);
    augmented.extend_from_slice(obs);
    augmented.push(time_step);
    Ok(augmented)
}

fn check_action_width(action: &[f64], space: &BoxSpace) -> Result<()> {
    if action.len() != space.dim() {
        bail!(
            "agent returned {} action components, action space has {}",
            action.len(),
            space.dim()
        );
    }
    Ok(())
}

fn checked_action_space<E: Environment>(env: &E) -> Result<&BoxSpace> {
    let space = env.action_space();
    if space.low.iter().chain(&space.high).any(|b| !b.is_finite()) {
        bail!("action space must be bounded to rescale policy actions");
    }
    Ok(space)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::PolicyLearnStats;
    use crate::env::mock::ConstantRewardEnv;

    /// An agent that always returns fixed actions.
    struct FixedAgent {
        sample: Vec<f64>,
        predict: Vec<f64>,
    }

    impl FixedAgent {
        fn new(sample: Vec<f64>, predict: Vec<f64>) -> Self {
            Self { sample, predict }
        }
    }

    impl PpoAgent for FixedAgent {
        fn policy_sample(&mut self, _obs: &[f64]) -> Result<Vec<f64>> {
            Ok(self.sample.clone())
        }

        fn policy_predict(&self, _obs: &[f64]) -> Result<Vec<f64>> {
            Ok(self.predict.clone())
        }

        fn value_predict(&self, obs: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(vec![0.0; obs.len()])
        }

        fn policy_learn(
            &mut self,
            _obs: &[Vec<f64>],
            _actions: &[Vec<f64>],
            _advantages: &[f64],
        ) -> Result<PolicyLearnStats> {
            Ok(PolicyLearnStats::default())
        }

        fn value_learn(&mut self, _obs: &[Vec<f64>], _targets: &[f64]) -> Result<f64> {
            Ok(0.0)
        }
    }

    #[test]
    fn test_action_mapping_is_linear_onto_bounds() {
        let space = BoxSpace::new(vec![-2.0, 0.0], vec![4.0, 10.0]).unwrap();
        assert_eq!(action_mapping(&[-1.0, -1.0], &space), vec![-2.0, 0.0]);
        assert_eq!(action_mapping(&[1.0, 1.0], &space), vec![4.0, 10.0]);
        assert_eq!(action_mapping(&[0.0, 0.0], &space), vec![1.0, 5.0]);
        assert_eq!(action_mapping(&[0.5, -0.5], &space), vec![2.5, 2.5]);
        assert_eq!(action_mapping(&[3.0, -3.0], &space), vec![4.0, 0.0]);
    }

    #[test]
    fn test_train_episode_records_every_step() {
        let mut env = ConstantRewardEnv::new(vec![1.0; 5], 2, 1);
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0]);
        let scaler = Scaler::new(3);

        let t = EpisodeRunner::default()
            .run_train_episode(&mut env, &mut agent, &scaler)
            .unwrap();

        assert_eq!(t.len(), 5);
        assert_eq!(t.observations.len(), 5);
        assert_eq!(t.actions.len(), 5);
        assert_eq!(t.unscaled_observations.len(), 5);
        assert!(!t.truncated);
        assert!((t.total_reward() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_step_feature_is_appended_and_unscaled() {
        let mut env = ConstantRewardEnv::new(vec![0.0; 4], 1, 1).with_observation_base(2.0);
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0]);
        let scaler = Scaler::new(2);
        let (scale, _) = scaler.get();

        let t = EpisodeRunner::default()
            .run_train_episode(&mut env, &mut agent, &scaler)
            .unwrap();

        for (i, (raw, scaled)) in t
            .unscaled_observations
            .iter()
            .zip(&t.observations)
            .enumerate()
        {
            let expected_step = i as f64 * 1e-3;
            assert!((raw[1] - expected_step).abs() < 1e-12);
            assert!((scaled[1] - expected_step).abs() < 1e-12);
            assert!((raw[0] - (2.0 + i as f64)).abs() < 1e-12);
            assert!((scaled[0] - raw[0] * scale[0]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sampled_actions_are_clipped_then_rescaled() {
        let space = BoxSpace::new(vec![-2.0], vec![4.0]).unwrap();
        let mut env = ConstantRewardEnv::new(vec![1.0; 2], 1, 1).with_action_space(space);
        let mut agent = FixedAgent::new(vec![2.5], vec![0.0]);
        let scaler = Scaler::new(2);

        let t = EpisodeRunner::default()
            .run_train_episode(&mut env, &mut agent, &scaler)
            .unwrap();

        assert_eq!(t.actions, vec![vec![1.0], vec![1.0]]);
        assert_eq!(env.received_actions(), &[vec![4.0], vec![4.0]]);
    }

    #[test]
    fn test_evaluate_episode_sums_rewards_with_mode_action() {
        let space = BoxSpace::new(vec![-2.0], vec![4.0]).unwrap();
        let mut env = ConstantRewardEnv::new(vec![1.0, 2.0, 3.5], 1, 1).with_action_space(space);
        let agent = FixedAgent::new(vec![-1.0], vec![0.0]);
        let scaler = Scaler::new(2);

        let reward = EpisodeRunner::default()
            .run_evaluate_episode(&mut env, &agent, &scaler)
            .unwrap();

        assert!((reward - 6.5).abs() < 1e-12);
        assert_eq!(env.received_actions(), &[vec![1.0], vec![1.0], vec![1.0]]);
    }

    #[test]
    fn test_max_episode_steps_truncates() {
        let mut env = ConstantRewardEnv::new(vec![1.0; 10], 1, 1);
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0]);
        let scaler = Scaler::new(2);
        let runner = EpisodeRunner::new(1e-3, Some(3));

        let t = runner.run_train_episode(&mut env, &mut agent, &scaler).unwrap();
        assert_eq!(t.len(), 3);
        assert!(t.truncated);

        let reward = runner.run_evaluate_episode(&mut env, &agent, &scaler).unwrap();
        assert!((reward - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_observation_width_mismatch_is_an_error() {
        let mut env = ConstantRewardEnv::new(vec![1.0], 3, 1);
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0]);
        let scaler = Scaler::new(2);
        assert!(EpisodeRunner::default()
            .run_train_episode(&mut env, &mut agent, &scaler)
            .is_err());
    }

    #[test]
    fn test_wrong_action_width_is_an_error() {
        let mut env = ConstantRewardEnv::new(vec![1.0; 2], 1, 2);
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0, 0.0, 0.0]);
        let scaler = Scaler::new(2);
        let runner = EpisodeRunner::default();

        assert!(runner.run_train_episode(&mut env, &mut agent, &scaler).is_err());
        assert!(env.received_actions().is_empty());
        assert!(runner.run_evaluate_episode(&mut env, &agent, &scaler).is_err());
        assert!(env.received_actions().is_empty());
    }

    #[test]
    fn test_zero_width_scaler_errors_without_panicking() {
        let mut env = ConstantRewardEnv::new(vec![1.0], 1, 1);
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0]);
        let scaler = Scaler::new(0);
        let err = EpisodeRunner::default()
            .run_train_episode(&mut env, &mut agent, &scaler)
            .unwrap_err();
        assert!(err.to_string().contains("expected 0"));
    }

    #[test]
    fn test_unbounded_action_space_is_an_error() {
        let mut env =
            ConstantRewardEnv::new(vec![1.0], 1, 1).with_action_space(BoxSpace::unbounded(1));
        let mut agent = FixedAgent::new(vec![0.0], vec![0.0]);
        let scaler = Scaler::new(2);
        assert!(EpisodeRunner::default()
            .run_train_episode(&mut env, &mut agent, &scaler)
            .is_err());
    }
}
