//! Core environment trait and shared types.
//!
//! Every continuous-control environment implements [`Environment`] so that the
//! episode runner can drive it uniformly.

use anyhow::{bail, Result};

/// A box-shaped space: one closed interval per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    /// Build a space from explicit bounds.
    ///
    /// # Errors
    ///
    /// Fails when the bound vectors differ in length or any `low > high`.
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if low.len() != high.len() {
            bail!(
                "box bounds differ in length: low has {}, high has {}",
                low.len(),
                high.len()
            );
        }
        if let Some(i) = low.iter().zip(&high).position(|(l, h)| l > h) {
            bail!("box bound {i} is inverted: {} > {}", low[i], high[i]);
        }
        Ok(Self { low, high })
    }

    /// `[-bound, bound]` in every one of `dim` dimensions.
    pub fn symmetric(dim: usize, bound: f64) -> Self {
        Self {
            low: vec![-bound; dim],
            high: vec![bound; dim],
        }
    }

    /// An unbounded space of the given dimension.
    pub fn unbounded(dim: usize) -> Self {
        Self::symmetric(dim, f64::INFINITY)
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }
}

/// The outcome of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    /// Observation after the transition.
    pub observation: Vec<f64>,
    /// Scalar reward for the transition.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
}

/// The core environment trait.
pub trait Environment {
    /// Start a new episode and return its initial observation.
    fn reset(&mut self) -> Result<Vec<f64>>;

    /// Apply an action already rescaled to [`Environment::action_space`].
    fn step(&mut self, action: &[f64]) -> Result<EnvStep>;

    fn observation_space(&self) -> &BoxSpace;

    fn action_space(&self) -> &BoxSpace;
}
