//! Run-directory naming and tracing setup.
//!
//! Console output goes through `tracing_subscriber::fmt` (filtered by
//! `RUST_LOG`, default `info`); a second, ANSI-free layer writes the same
//! events to `train.log` inside the run directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LossType;

pub const LOG_FILE: &str = "train.log";

/// `{LOSS_TYPE}_{unix seconds with millisecond fraction}`.
pub fn run_dir_name(loss_type: LossType, now: DateTime<Utc>) -> String {
    format!("{}_{}", loss_type, now.format("%s%.3f"))
}

/// Create a fresh run directory under `root`.
pub fn create_run_dir(root: &Path, loss_type: LossType) -> Result<PathBuf> {
    let dir = root.join(run_dir_name(loss_type, Utc::now()));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    Ok(dir)
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init(run_dir: &Path) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(run_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
