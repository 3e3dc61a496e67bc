//! Rollout data types: one trajectory per episode, concatenated into batches.

use std::ops::Range;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Single episode
// ---------------------------------------------------------------------------

/// One episode of agent-environment interaction.
///
/// All four sequences have one entry per step. Observations carry the appended
/// time-step feature; `observations` are normalized with the scaler state at
/// episode start, `unscaled_observations` are the raw values the scaler is
/// later updated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub observations: Vec<Vec<f64>>,
    /// Policy actions after clipping to `[-1, 1]`, not the actions mapped
    /// onto the environment's bounds.
    pub actions: Vec<Vec<f64>>,
    pub rewards: Vec<f64>,
    pub unscaled_observations: Vec<Vec<f64>>,
    /// The episode hit the step limit instead of terminating.
    pub truncated: bool,
}

impl Trajectory {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            observations: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            unscaled_observations: Vec::new(),
            truncated: false,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Batch of episodes
// ---------------------------------------------------------------------------

/// Several trajectories concatenated step-wise.
///
/// `episode_lengths` keeps the episode boundaries so per-episode quantities
/// (returns, advantages) can be computed on the flat arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    pub observations: Vec<Vec<f64>>,
    pub actions: Vec<Vec<f64>>,
    pub rewards: Vec<f64>,
    pub episode_lengths: Vec<usize>,
    pub episode_returns: Vec<f64>,
}

impl Batch {
    /// Concatenate trajectories, returning the batch and the unscaled
    /// observations in the same order.
    pub fn from_trajectories(trajectories: Vec<Trajectory>) -> (Self, Vec<Vec<f64>>) {
        let steps: usize = trajectories.iter().map(Trajectory::len).sum();
        let mut batch = Self {
            observations: Vec::with_capacity(steps),
            actions: Vec::with_capacity(steps),
            rewards: Vec::with_capacity(steps),
            episode_lengths: Vec::with_capacity(trajectories.len()),
            episode_returns: Vec::with_capacity(trajectories.len()),
        };
        let mut unscaled = Vec::with_capacity(steps);

        for t in trajectories {
            batch.episode_lengths.push(t.len());
            batch.episode_returns.push(t.total_reward());
            batch.observations.extend(t.observations);
            batch.actions.extend(t.actions);
            batch.rewards.extend(t.rewards);
            unscaled.extend(t.unscaled_observations);
        }

        (batch, unscaled)
    }

    /// Total number of steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn num_episodes(&self) -> usize {
        self.episode_lengths.len()
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Mean undiscounted return per episode.
    pub fn mean_episode_reward(&self) -> f64 {
        if self.episode_lengths.is_empty() {
            return 0.0;
        }
        self.total_reward() / self.episode_lengths.len() as f64
    }

    pub fn mean_episode_length(&self) -> f64 {
        if self.episode_lengths.is_empty() {
            return 0.0;
        }
        self.len() as f64 / self.episode_lengths.len() as f64
    }

    /// Index range of every episode within the flat arrays.
    pub fn episode_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.episode_lengths
            .iter()
            .map(|&len| {
                let range = start..start + len;
                start += len;
                range
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory(rewards: &[f64]) -> Trajectory {
        let mut t = Trajectory::new();
        for (i, r) in rewards.iter().enumerate() {
            t.observations.push(vec![i as f64, 0.0]);
            t.unscaled_observations.push(vec![10.0 + i as f64, 0.0]);
            t.actions.push(vec![0.0]);
            t.rewards.push(*r);
        }
        t
    }

    #[test]
    fn test_batch_concatenates_in_order() {
        let (batch, unscaled) =
            Batch::from_trajectories(vec![trajectory(&[1.0, 2.0]), trajectory(&[3.0])]);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.num_episodes(), 2);
        assert_eq!(batch.rewards, vec![1.0, 2.0, 3.0]);
        assert_eq!(batch.episode_lengths, vec![2, 1]);
        assert_eq!(batch.episode_returns, vec![3.0, 3.0]);
        assert_eq!(unscaled.len(), 3);
        assert_eq!(unscaled[2], vec![10.0, 0.0]);
        assert_eq!(batch.episode_ranges(), vec![0..2, 2..3]);
    }

    #[test]
    fn test_mean_statistics() {
        let (batch, _) =
            Batch::from_trajectories(vec![trajectory(&[1.0, 1.0, 1.0]), trajectory(&[2.0])]);
        assert!((batch.mean_episode_reward() - 2.5).abs() < 1e-12);
        assert!((batch.mean_episode_length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_batch() {
        let (batch, unscaled) = Batch::from_trajectories(Vec::new());
        assert!(batch.is_empty());
        assert!(unscaled.is_empty());
        assert_eq!(batch.mean_episode_reward(), 0.0);
        assert!(batch.episode_ranges().is_empty());
    }

    #[test]
    fn test_trajectory_ids_are_unique() {
        assert_ne!(Trajectory::new().id, Trajectory::new().id);
    }
}
