//! PPO training runner for continuous-control environments.
//!
//! Wires an environment loop, a running observation normalizer and
//! discounted-return/GAE estimation around an agent that exposes the PPO
//! capabilities (sample, predict, value, learn).

pub mod agent;
pub mod config;
pub mod env;
pub mod logging;
pub mod rollout;
pub mod scaler;
pub mod training;
