//! One-dimensional point mass that must be driven to the origin.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::{BoxSpace, EnvStep, Environment};

const DT: f64 = 0.1;
const MAX_FORCE: f64 = 1.0;
const BOUNDARY: f64 = 5.0;

pub const DEFAULT_EPISODE_STEPS: usize = 100;

/// Observations are `[position, velocity]`. The episode ends after a fixed
/// number of steps or when the mass leaves `[-5, 5]`.
#[derive(Debug)]
pub struct PointMass {
    position: f64,
    velocity: f64,
    episode_steps: usize,
    current_step: usize,
    done: bool,
    rng: StdRng,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl PointMass {
    pub fn new(seed: u64) -> Self {
        Self::with_episode_steps(seed, DEFAULT_EPISODE_STEPS)
    }

    pub fn with_episode_steps(seed: u64, episode_steps: usize) -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            episode_steps,
            current_step: 0,
            done: true,
            rng: StdRng::seed_from_u64(seed),
            observation_space: BoxSpace::unbounded(2),
            action_space: BoxSpace::symmetric(1, MAX_FORCE),
        }
    }

    fn observation(&self) -> Vec<f64> {
        vec![self.position, self.velocity]
    }
}

impl Environment for PointMass {
    fn reset(&mut self) -> Result<Vec<f64>> {
        self.position = self.rng.gen_range(-1.0..1.0);
        self.velocity = 0.0;
        self.current_step = 0;
        self.done = false;
        Ok(self.observation())
    }

    fn step(&mut self, action: &[f64]) -> Result<EnvStep> {
        if self.done {
            bail!("cannot step in a terminated episode");
        }
        let [force] = action else {
            bail!("point mass expects one action component, got {}", action.len());
        };
        let force = force.clamp(-MAX_FORCE, MAX_FORCE);

        // Semi-implicit Euler.
        self.velocity += force * DT;
        self.position += self.velocity * DT;
        self.current_step += 1;

        let out_of_bounds = self.position.abs() > BOUNDARY;
        self.done = out_of_bounds || self.current_step >= self.episode_steps;

        let mut reward = -(self.position.powi(2)) - 0.01 * force.powi(2);
        if out_of_bounds {
            reward -= 10.0;
        }

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
