//! Reference agent: linear-mean Gaussian policy with a linear value baseline.
//!
//! The policy is `a ~ N(W s + b, diag(exp(log_std))^2)` with a fixed
//! `log_std`, and the value estimate is `V(s) = w . s + c`. Both are fitted by
//! full-batch gradient steps, which keeps the agent small enough to train on
//! a CPU in seconds while still exercising every part of the training loop.
//!
//! The policy update maximises one of two surrogates, chosen by [`LossType`]:
//!
//! ```text
//! CLIP:  L = mean_i min(r_i A_i, clip(r_i, 1 - eps, 1 + eps) A_i)
//! KLPEN: L = mean_i r_i A_i - beta * KL(pi_old || pi_new)
//! ```
//!
//! where `r_i = pi_new(a_i | s_i) / pi_old(a_i | s_i)`.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

use crate::config::{AgentConfig, LossType};

use super::kl::KlController;
use super::traits::{PolicyLearnStats, PpoAgent};

pub struct LinearGaussianAgent {
    obs_dim: usize,
    act_dim: usize,
    /// `act_dim x obs_dim` policy weights.
    policy_w: Vec<Vec<f64>>,
    policy_b: Vec<f64>,
    log_std: Vec<f64>,
    value_w: Vec<f64>,
    value_b: f64,
    loss_type: LossType,
    clip_epsilon: f64,
    policy_lr: f64,
    value_lr: f64,
    policy_epochs: usize,
    value_epochs: usize,
    kl: KlController,
    rng: StdRng,
}

impl LinearGaussianAgent {
    /// Create an agent with zero-initialised weights.
    pub fn new(
        obs_dim: usize,
        act_dim: usize,
        kl_targ: f64,
        loss_type: LossType,
        config: &AgentConfig,
        seed: u64,
    ) -> Self {
        Self {
            obs_dim,
            act_dim,
            policy_w: vec![vec![0.0; obs_dim]; act_dim],
            policy_b: vec![0.0; act_dim],
            log_std: vec![config.init_log_std; act_dim],
            value_w: vec![0.0; obs_dim],
            value_b: 0.0,
            loss_type,
            clip_epsilon: config.clip_epsilon,
            policy_lr: config.policy_lr,
            value_lr: config.value_lr,
            policy_epochs: config.policy_epochs,
            value_epochs: config.value_epochs,
            kl: KlController::new(kl_targ, config.init_beta),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn kl_controller(&self) -> &KlController {
        &self.kl
    }

    fn check_obs(&self, obs: &[f64]) -> Result<()> {
        if obs.len() != self.obs_dim {
            bail!(
                "agent expects {}-dimensional observations, got {}",
                self.obs_dim,
                obs.len()
            );
        }
        Ok(())
    }

    fn mean(&self, obs: &[f64]) -> Vec<f64> {
        self.policy_w
            .iter()
            .zip(&self.policy_b)
            .map(|(row, b)| dot(row, obs) + b)
            .collect()
    }

    fn value(&self, obs: &[f64]) -> f64 {
        dot(&self.value_w, obs) + self.value_b
    }

    fn variances(&self) -> Vec<f64> {
        self.log_std.iter().map(|s| (2.0 * s).exp()).collect()
    }

    /// `log pi_new(a|s) - log pi_old(a|s)` for a shared, fixed std.
    fn log_ratio(action: &[f64], mean: &[f64], old_mean: &[f64], var: &[f64]) -> f64 {
        action
            .iter()
            .zip(mean)
            .zip(old_mean)
            .zip(var)
            .map(|(((a, m), m_old), v)| ((a - m_old).powi(2) - (a - m).powi(2)) / (2.0 * v))
            .sum()
    }

    /// `KL(pi_old || pi_new)` for a shared, fixed std.
    fn kl_divergence(mean: &[f64], old_mean: &[f64], var: &[f64]) -> f64 {
        mean.iter()
            .zip(old_mean)
            .zip(var)
            .map(|((m, m_old), v)| (m - m_old).powi(2) / (2.0 * v))
            .sum()
    }

    /// Mean surrogate objective and mean KL of the current policy against the
    /// snapshot `old_means`.
    fn surrogate(
        &self,
        obs: &[Vec<f64>],
        actions: &[Vec<f64>],
        advantages: &[f64],
        old_means: &[Vec<f64>],
    ) -> (f64, f64) {
        let var = self.variances();
        let n = obs.len() as f64;
        let mut objective = 0.0;
        let mut kl = 0.0;
        for i in 0..obs.len() {
            let mean = self.mean(&obs[i]);
            let ratio = Self::log_ratio(&actions[i], &mean, &old_means[i], &var).exp();
            let adv = advantages[i];
            objective += match self.loss_type {
                LossType::Clip => (ratio * adv).min(clip_ratio(ratio, self.clip_epsilon) * adv),
                LossType::KlPen => ratio * adv,
            };
            kl += Self::kl_divergence(&mean, &old_means[i], &var);
        }
        (objective / n, kl / n)
    }
}

impl PpoAgent for LinearGaussianAgent {
    fn policy_sample(&mut self, obs: &[f64]) -> Result<Vec<f64>> {
        self.check_obs(obs)?;
        let mut sample = self.mean(obs);
        for (a, s) in sample.iter_mut().zip(&self.log_std) {
            let z: f64 = self.rng.sample(StandardNormal);
            *a += s.exp() * z;
        }
        Ok(sample)
    }

    fn policy_predict(&self, obs: &[f64]) -> Result<Vec<f64>> {
        self.check_obs(obs)?;
        Ok(self.mean(obs))
    }

    fn value_predict(&self, obs: &[Vec<f64>]) -> Result<Vec<f64>> {
        obs.iter()
            .map(|o| {
                self.check_obs(o)?;
                Ok(self.value(o))
            })
            .collect()
    }

    fn policy_learn(
        &mut self,
        obs: &[Vec<f64>],
        actions: &[Vec<f64>],
        advantages: &[f64],
    ) -> Result<PolicyLearnStats> {
        if obs.len() != actions.len() || obs.len() != advantages.len() {
            bail!(
                "policy_learn length mismatch: {} observations, {} actions, {} advantages",
                obs.len(),
                actions.len(),
                advantages.len()
            );
        }
        if obs.is_empty() {
            bail!("policy_learn called with an empty batch");
        }
        for (o, a) in obs.iter().zip(actions) {
            self.check_obs(o)?;
            if a.len() != self.act_dim {
                bail!("agent expects {} action components, got {}", self.act_dim, a.len());
            }
        }

        let old_means: Vec<Vec<f64>> = obs.iter().map(|o| self.mean(o)).collect();
        let var = self.variances();
        let n = obs.len() as f64;
        let lr = self.policy_lr * self.kl.lr_multiplier();
        let beta = self.kl.beta();
        let mut epochs_run = 0;

        for _ in 0..self.policy_epochs {
            let mut grad_w = vec![vec![0.0; self.obs_dim]; self.act_dim];
            let mut grad_b = vec![0.0; self.act_dim];

            for i in 0..obs.len() {
                let mean = self.mean(&obs[i]);
                let ratio = Self::log_ratio(&actions[i], &mean, &old_means[i], &var).exp();
                let adv = advantages[i];

                let surrogate_active = match self.loss_type {
                    LossType::Clip => {
                        !((adv > 0.0 && ratio > 1.0 + self.clip_epsilon)
                            || (adv < 0.0 && ratio < 1.0 - self.clip_epsilon))
                    }
                    LossType::KlPen => true,
                };

                for d in 0..self.act_dim {
                    let mut g = 0.0;
                    if surrogate_active {
                        g += adv * ratio * (actions[i][d] - mean[d]) / var[d];
                    }
                    if self.loss_type == LossType::KlPen {
                        g -= beta * (mean[d] - old_means[i][d]) / var[d];
                    }
                    grad_b[d] += g;
                    for (gw, x) in grad_w[d].iter_mut().zip(&obs[i]) {
                        *gw += g * x;
                    }
                }
            }

            // Gradient ascent on the surrogate.
            for d in 0..self.act_dim {
                self.policy_b[d] += lr * grad_b[d] / n;
                for (w, g) in self.policy_w[d].iter_mut().zip(&grad_w[d]) {
                    *w += lr * g / n;
                }
            }
            epochs_run += 1;

            let kl = obs
                .iter()
                .zip(&old_means)
                .map(|(o, m_old)| Self::kl_divergence(&self.mean(o), m_old, &var))
                .sum::<f64>()
                / n;
            if kl > self.kl.early_stop_threshold() {
                break;
            }
        }

        let (objective, final_kl) = self.surrogate(obs, actions, advantages, &old_means);
        let loss = match self.loss_type {
            LossType::Clip => -objective,
            LossType::KlPen => -objective + beta * final_kl,
        };

        self.kl.update(final_kl);

        debug!(
            loss,
            kl = final_kl,
            epochs = epochs_run,
            beta = self.kl.beta(),
            lr_multiplier = self.kl.lr_multiplier(),
            "Policy update finished"
        );

        Ok(PolicyLearnStats { loss, kl: final_kl })
    }

    fn value_learn(&mut self, obs: &[Vec<f64>], targets: &[f64]) -> Result<f64> {
        if obs.len() != targets.len() {
            bail!(
                "value_learn length mismatch: {} observations, {} targets",
                obs.len(),
                targets.len()
            );
        }
        if obs.is_empty() {
            bail!("value_learn called with an empty batch");
        }
        for o in obs {
            self.check_obs(o)?;
        }

        let n = obs.len() as f64;
        let mse = |agent: &Self| -> f64 {
            obs.iter()
                .zip(targets)
                .map(|(o, t)| (agent.value(o) - t).powi(2))
                .sum::<f64>()
                / n
        };
        let loss = mse(self);

        for _ in 0..self.value_epochs {
            let mut grad_w = vec![0.0; self.obs_dim];
            let mut grad_b = 0.0;
            for (o, t) in obs.iter().zip(targets) {
                let err = self.value(o) - t;
                grad_b += 2.0 * err;
                for (g, x) in grad_w.iter_mut().zip(o) {
                    *g += 2.0 * err * x;
                }
            }
            self.value_b -= self.value_lr * grad_b / n;
            for (w, g) in self.value_w.iter_mut().zip(&grad_w) {
                *w -= self.value_lr * g / n;
            }
        }

        debug!(loss, after = mse(self), "Value update finished");
        Ok(loss)
    }
}

/// Clip a probability ratio to `[1 - epsilon, 1 + epsilon]`.
pub fn clip_ratio(ratio: f64, epsilon: f64) -> f64 {
    ratio.clamp(1.0 - epsilon, 1.0 + epsilon)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(loss_type: LossType) -> LinearGaussianAgent {
        LinearGaussianAgent::new(2, 1, 0.01, loss_type, &AgentConfig::default(), 11)
    }

    #[test]
    fn test_clip_ratio_bounds() {
        assert!((clip_ratio(1.5, 0.2) - 1.2).abs() < 1e-12);
        assert!((clip_ratio(0.5, 0.2) - 0.8).abs() < 1e-12);
        assert!((clip_ratio(1.1, 0.2) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_fresh_agent_predicts_zero_mean() {
        let agent = agent(LossType::Clip);
        assert_eq!(agent.policy_predict(&[3.0, -1.0]).unwrap(), vec![0.0]);
        assert_eq!(agent.value_predict(&[vec![1.0, 2.0]]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_sampling_is_seeded() {
        let mut a = agent(LossType::Clip);
        let mut b = agent(LossType::Clip);
        let obs = [0.3, 0.1];
        for _ in 0..5 {
            assert_eq!(a.policy_sample(&obs).unwrap(), b.policy_sample(&obs).unwrap());
        }
    }

    #[test]
    fn test_rejects_wrong_observation_width() {
        let mut agent = agent(LossType::Clip);
        assert!(agent.policy_sample(&[1.0]).is_err());
        assert!(agent.policy_predict(&[1.0, 2.0, 3.0]).is_err());
        assert!(agent.value_predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_positive_advantage_pulls_mean_towards_action() {
        for loss_type in [LossType::Clip, LossType::KlPen] {
            let mut agent = agent(loss_type);
            let obs = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
            let actions = vec![vec![0.5], vec![0.5]];
            let stats = agent.policy_learn(&obs, &actions, &[1.0, 1.0]).unwrap();

            let mean = agent.policy_predict(&[1.0, 0.0]).unwrap()[0];
            assert!(mean > 0.0, "{loss_type}: mean {mean} should move towards 0.5");
            assert!(stats.kl > 0.0);
            assert!(stats.loss.is_finite());
        }
    }

    #[test]
    fn test_policy_learn_rejects_length_mismatch() {
        let mut agent = agent(LossType::Clip);
        let obs = vec![vec![1.0, 0.0]];
        assert!(agent.policy_learn(&obs, &[], &[1.0]).is_err());
        assert!(agent.policy_learn(&[], &[], &[]).is_err());
    }

    #[test]
    fn test_value_learn_reduces_loss() {
        let mut agent = agent(LossType::Clip);
        let obs: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 / 10.0, 1.0]).collect();
        let targets: Vec<f64> = obs.iter().map(|o| 2.0 * o[0] + 0.5).collect();

        let first = agent.value_learn(&obs, &targets).unwrap();
        let mut last = first;
        for _ in 0..50 {
            last = agent.value_learn(&obs, &targets).unwrap();
        }
        assert!(last < first, "value loss should fall: {first} -> {last}");
    }
}
