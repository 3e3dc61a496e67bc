//! Running observation normalizer.
//!
//! The scaler keeps a per-dimension running mean and variance of *unscaled*
//! observations and turns them into `(scale, offset)` vectors so that
//! `(obs - offset) * scale` is roughly centred with a small spread. The final
//! dimension carries the synthetic time-step feature and is never scaled.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    means: Vec<f64>,
    vars: Vec<f64>,
    /// Number of observations folded in so far.
    count: usize,
}

impl Scaler {
    /// `obs_dim` includes the trailing time-step feature.
    pub fn new(obs_dim: usize) -> Self {
        Self {
            means: vec![0.0; obs_dim],
            vars: vec![0.0; obs_dim],
            count: 0,
        }
    }

    pub fn obs_dim(&self) -> usize {
        self.means.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn vars(&self) -> &[f64] {
        &self.vars
    }

    /// Fold a batch of unscaled observations into the running statistics.
    ///
    /// The first batch initialises the moments outright; later batches are
    /// merged with the pooled-moment form of the parallel Welford update.
    /// Variances are population variances floored at zero. An empty batch is
    /// a no-op.
    pub fn update(&mut self, batch: &[Vec<f64>]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let dim = self.obs_dim();
        if let Some(row) = batch.iter().position(|row| row.len() != dim) {
            bail!(
                "scaler expects {dim}-dimensional observations, row {row} has {}",
                batch[row].len()
            );
        }

        let n = batch.len() as f64;
        let mut batch_mean = vec![0.0; dim];
        for row in batch {
            for (acc, x) in batch_mean.iter_mut().zip(row) {
                *acc += x;
            }
        }
        batch_mean.iter_mut().for_each(|m| *m /= n);

        let mut batch_var = vec![0.0; dim];
        for row in batch {
            for ((acc, x), mean) in batch_var.iter_mut().zip(row).zip(&batch_mean) {
                *acc += (x - mean).powi(2);
            }
        }
        batch_var.iter_mut().for_each(|v| *v /= n);

        if self.count == 0 {
            self.means = batch_mean;
            self.vars = batch_var;
        } else {
            let m = self.count as f64;
            for j in 0..dim {
                let new_mean = (self.means[j] * m + batch_mean[j] * n) / (m + n);
                let pooled = (m * (self.vars[j] + self.means[j].powi(2))
                    + n * (batch_var[j] + batch_mean[j].powi(2)))
                    / (m + n);
                self.vars[j] = (pooled - new_mean.powi(2)).max(0.0);
                self.means[j] = new_mean;
            }
        }
        self.count += batch.len();

        tracing::debug!(count = self.count, batch = batch.len(), "Scaler updated");
        Ok(())
    }

    /// Current `(scale, offset)` vectors.
    ///
    /// `scale = 1 / (sqrt(var) + 0.1) / 3` and `offset = mean`, except the
    /// time-step dimension which is always `(1, 0)`.
    pub fn get(&self) -> (Vec<f64>, Vec<f64>) {
        let mut scale: Vec<f64> = self
            .vars
            .iter()
            .map(|v| 1.0 / (v.sqrt() + 0.1) / 3.0)
            .collect();
        let mut offset = self.means.clone();
        if let (Some(s), Some(o)) = (scale.last_mut(), offset.last_mut()) {
            *s = 1.0;
            *o = 0.0;
        }
        (scale, offset)
    }
}

/// Apply `(obs - offset) * scale` element-wise.
pub fn normalize(obs: &[f64], scale: &[f64], offset: &[f64]) -> Vec<f64> {
    obs.iter()
        .zip(offset)
        .zip(scale)
        .map(|((x, o), s)| (x - o) * s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_scale(var: f64) -> f64 {
        1.0 / (var.sqrt() + 0.1) / 3.0
    }

    #[test]
    fn test_first_update_sets_batch_moments() {
        let mut scaler = Scaler::new(3);
        scaler
            .update(&[vec![1.0, 10.0, 0.0], vec![3.0, 20.0, 0.001]])
            .unwrap();

        assert_eq!(scaler.count(), 2);
        assert!((scaler.means()[0] - 2.0).abs() < 1e-12);
        assert!((scaler.vars()[0] - 1.0).abs() < 1e-12);
        assert!((scaler.means()[1] - 15.0).abs() < 1e-12);
        assert!((scaler.vars()[1] - 25.0).abs() < 1e-12);

        let (scale, offset) = scaler.get();
        assert!((scale[0] - expected_scale(1.0)).abs() < 1e-12);
        assert!((offset[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_incremental_update_matches_pooled_statistics() {
        let first = vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![4.0, 0.0]];
        let second = vec![vec![8.0, 0.0], vec![-3.0, 0.0]];

        let mut scaler = Scaler::new(2);
        scaler.update(&first).unwrap();
        scaler.update(&second).unwrap();

        let all: Vec<f64> = first.iter().chain(&second).map(|r| r[0]).collect();
        let n = all.len() as f64;
        let mean = all.iter().sum::<f64>() / n;
        let var = all.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        assert_eq!(scaler.count(), 5);
        assert!((scaler.means()[0] - mean).abs() < 1e-9);
        assert!((scaler.vars()[0] - var).abs() < 1e-9);

        let (scale, offset) = scaler.get();
        assert!((scale[0] - expected_scale(var)).abs() < 1e-9);
        assert!((offset[0] - mean).abs() < 1e-9);
    }

    #[test]
    fn test_time_step_dimension_is_never_scaled() {
        let mut scaler = Scaler::new(2);
        let (scale, offset) = scaler.get();
        assert_eq!((scale[1], offset[1]), (1.0, 0.0));

        scaler
            .update(&[vec![5.0, 0.0], vec![7.0, 0.5], vec![9.0, 1.0]])
            .unwrap();
        let (scale, offset) = scaler.get();
        assert_eq!((scale[1], offset[1]), (1.0, 0.0));
        assert!(scaler.vars()[1] > 0.0);
    }

    #[test]
    fn test_constant_dimension_keeps_finite_scale() {
        let mut scaler = Scaler::new(2);
        scaler.update(&[vec![2.0, 0.0], vec![2.0, 0.0]]).unwrap();
        scaler.update(&[vec![2.0, 0.0]]).unwrap();
        let (scale, _) = scaler.get();
        assert!(scaler.vars()[0] >= 0.0);
        assert!((scale[0] - expected_scale(0.0)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_is_noop_and_bad_width_errors() {
        let mut scaler = Scaler::new(2);
        scaler.update(&[]).unwrap();
        assert_eq!(scaler.count(), 0);
        assert!(scaler.update(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_normalize_centres_and_scales() {
        let out = normalize(&[3.0, 0.25], &[2.0, 1.0], &[1.0, 0.0]);
        assert_eq!(out, vec![4.0, 0.25]);
    }
}
