//! Episode rollouts and batch collection.
//!
//! This module provides:
//! - [`types::Trajectory`], [`types::Batch`] -- what one episode and one
//!   training batch recorded.
//! - [`runner::EpisodeRunner`] -- runs single training or evaluation episodes.
//! - [`collector::BatchCollector`] -- runs a batch of training episodes and
//!   folds their observations into the scaler.

pub mod collector;
pub mod runner;
pub mod types;

pub use collector::BatchCollector;
pub use runner::{action_mapping, clip_action, EpisodeRunner};
pub use types::{Batch, Trajectory};
