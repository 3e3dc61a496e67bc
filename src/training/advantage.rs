//! Return and advantage estimation.
//!
//! Implements the discounted reward-to-go and Generalized Advantage
//! Estimation used by the training loop:
//!
//!   G_t     = r_t + gamma * G_{t+1}
//!   delta_t = r_t + gamma * V_{t+1} - V_t        (V_T = 0)
//!   A_t     = delta_t + gamma * lam * A_{t+1}
//!
//! Everything here works on a single episode; [`episode_targets`] applies it
//! segment by segment to a concatenated batch.

use std::ops::Range;

use anyhow::{bail, Result};

/// Floor added to the advantage standard deviation.
pub const ADVANTAGE_EPSILON: f64 = 1e-6;

/// Scale rewards by `1 - gamma`, keeping discounted sums near the reward scale.
pub fn scale_rewards(rewards: &[f64], gamma: f64) -> Vec<f64> {
    rewards.iter().map(|r| r * (1.0 - gamma)).collect()
}

/// Reverse cumulative discounted sum: `out[t] = sum_k gamma^k * x[t + k]`.
pub fn discount_sum_rewards(rewards: &[f64], gamma: f64) -> Vec<f64> {
    let mut out = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for t in (0..rewards.len()).rev() {
        running = rewards[t] + gamma * running;
        out[t] = running;
    }
    out
}

/// Generalized advantage estimates for one episode.
///
/// The value after the final step is taken as zero (the episode terminated).
///
/// # Errors
///
/// Fails if `rewards` and `values` differ in length.
pub fn calc_gae(rewards: &[f64], values: &[f64], gamma: f64, lam: f64) -> Result<Vec<f64>> {
    if rewards.len() != values.len() {
        bail!(
            "GAE needs one value per reward: {} rewards, {} values",
            rewards.len(),
            values.len()
        );
    }
    let tds: Vec<f64> = (0..rewards.len())
        .map(|t| {
            let next_value = values.get(t + 1).copied().unwrap_or(0.0);
            rewards[t] + gamma * next_value - values[t]
        })
        .collect();
    Ok(discount_sum_rewards(&tds, gamma * lam))
}

/// Standardize advantages to zero mean and unit (population) variance.
///
/// # Errors
///
/// Fails if any advantage is NaN or infinite.
pub fn normalize_advantages(advantages: &[f64]) -> Result<Vec<f64>> {
    if let Some(i) = advantages.iter().position(|a| !a.is_finite()) {
        bail!("advantage {i} is not finite ({})", advantages[i]);
    }
    if advantages.is_empty() {
        return Ok(Vec::new());
    }
    let n = advantages.len() as f64;
    let mean = advantages.iter().sum::<f64>() / n;
    let std = (advantages.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n).sqrt();
    Ok(advantages
        .iter()
        .map(|a| (a - mean) / (std + ADVANTAGE_EPSILON))
        .collect())
}

/// Discounted returns and raw GAE computed separately for every episode of a
/// concatenated batch, so discounting never crosses an episode boundary.
///
/// The training loop only uses this when `per_episode_targets` is set; by
/// default it discounts over the flat batch.
///
/// `rewards` should already be scaled. Returns `(returns, advantages)`.
pub fn episode_targets(
    rewards: &[f64],
    values: &[f64],
    episodes: &[Range<usize>],
    gamma: f64,
    lam: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if rewards.len() != values.len() {
        bail!(
            "batch has {} rewards but {} value predictions",
            rewards.len(),
            values.len()
        );
    }
    let covered: usize = episodes.iter().map(|r| r.len()).sum();
    if covered != rewards.len() || episodes.iter().any(|r| r.end > rewards.len()) {
        bail!(
            "episode boundaries cover {covered} steps of a {}-step batch",
            rewards.len()
        );
    }

    let mut returns = Vec::with_capacity(rewards.len());
    let mut advantages = Vec::with_capacity(rewards.len());
    for range in episodes {
        let r = &rewards[range.clone()];
        returns.extend(discount_sum_rewards(r, gamma));
        advantages.extend(calc_gae(r, &values[range.clone()], gamma, lam)?);
    }
    Ok((returns, advantages))
}
