//! Torque-controlled pendulum swing-up.
//!
//! The pole starts at a random angle and the agent applies a bounded torque to
//! swing it upright and hold it there. Observations are
//! `[cos(theta), sin(theta), theta_dot]`; each episode lasts a fixed number of
//! steps.

use std::f64::consts::PI;

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::traits::{BoxSpace, EnvStep, Environment};

const GRAVITY: f64 = 10.0;
const MASS: f64 = 1.0;
const LENGTH: f64 = 1.0;
const DT: f64 = 0.05;
const MAX_SPEED: f64 = 8.0;
const MAX_TORQUE: f64 = 2.0;

pub const DEFAULT_EPISODE_STEPS: usize = 200;

#[derive(Debug)]
pub struct Pendulum {
    theta: f64,
    theta_dot: f64,
    episode_steps: usize,
    current_step: usize,
    done: bool,
    rng: StdRng,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl Pendulum {
    pub fn new(seed: u64) -> Self {
        Self::with_episode_steps(seed, DEFAULT_EPISODE_STEPS)
    }

    pub fn with_episode_steps(seed: u64, episode_steps: usize) -> Self {
        let observation_space = BoxSpace {
            low: vec![-1.0, -1.0, -MAX_SPEED],
            high: vec![1.0, 1.0, MAX_SPEED],
        };
        Self {
            theta: PI,
            theta_dot: 0.0,
            episode_steps,
            current_step: 0,
            done: true,
            rng: StdRng::seed_from_u64(seed),
            observation_space,
            action_space: BoxSpace::symmetric(1, MAX_TORQUE),
        }
    }

    fn observation(&self) -> Vec<f64> {
        vec![self.theta.cos(), self.theta.sin(), self.theta_dot]
    }
}

/// Wrap an angle into `[-pi, pi)`.
fn angle_normalize(x: f64) -> f64 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Pendulum {
    fn reset(&mut self) -> Result<Vec<f64>> {
        self.theta = self.rng.gen_range(-PI..PI);
        self.theta_dot = self.rng.gen_range(-1.0..1.0);
        self.current_step = 0;
        self.done = false;
        Ok(self.observation())
    }

    fn step(&mut self, action: &[f64]) -> Result<EnvStep> {
        if self.done {
            bail!("cannot step in a terminated episode");
        }
        let [torque] = action else {
            bail!("pendulum expects one action component, got {}", action.len());
        };
        let u = torque.clamp(-MAX_TORQUE, MAX_TORQUE);

        let cost = angle_normalize(self.theta).powi(2)
            + 0.1 * self.theta_dot.powi(2)
            + 0.001 * u.powi(2);

        let theta_acc =
            3.0 * GRAVITY / (2.0 * LENGTH) * self.theta.sin() + 3.0 / (MASS * LENGTH * LENGTH) * u;
        self.theta_dot = (self.theta_dot + theta_acc * DT).clamp(-MAX_SPEED, MAX_SPEED);
        self.theta += self.theta_dot * DT;

        self.current_step += 1;
        self.done = self.current_step >= self.episode_steps;

        Ok(EnvStep {
            observation: self.observation(),
            reward: -cost,
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
    fn test_angle_normalize_wraps() {
        assert!((angle_normalize(0.0)).abs() < 1e-12);
        assert!((angle_normalize(2.0 * PI + 0.5) - 0.5).abs() < 1e-12);
        assert!((angle_normalize(-PI - 0.5) - (PI - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_episode_runs_for_fixed_steps() {
        let mut env = Pendulum::with_episode_steps(7, 10);
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 3);
        assert!((obs[0].powi(2) + obs[1].powi(2) - 1.0).abs() < 1e-9);

        let mut steps = 0;
        loop {
            let step = env.step(&[0.5]).unwrap();
            steps += 1;
            assert!(step.reward <= 0.0);
            assert!(step.observation[2].abs() <= MAX_SPEED);
            if step.done {
                break;
            }
        }
        assert_eq!(steps, 10);
        assert!(env.step(&[0.0]).is_err());
    }

    #[test]
    fn test_same_seed_same_start() {
        let mut a = Pendulum::new(42);
        let mut b = Pendulum::new(42);
        assert_eq!(a.reset().unwrap(), b.reset().unwrap());
    }
}
