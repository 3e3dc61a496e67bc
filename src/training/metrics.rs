//! Per-batch training metrics and their JSON-lines sink.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metrics recorded after every training batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// 1-indexed batch number (warm-up excluded).
    pub batch: usize,
    /// Training episodes run so far (warm-up excluded).
    pub episode: usize,
    /// Batch reward divided by the episodes per batch.
    pub train_reward: f64,
    pub policy_loss: f64,
    pub kl: f64,
    pub value_loss: f64,
    /// Steps in this batch.
    pub steps: usize,
    pub mean_episode_length: f64,
    /// Reward of the evaluation episode, when one ran after this batch.
    pub eval_reward: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct MetricsSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl MetricsSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open metrics file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, metrics: &BatchMetrics) -> Result<()> {
        serde_json::to_writer(&mut self.writer, metrics)?;
        self.writer.write_all(b"\n")?;
        // Flush per batch so a killed run keeps its history.
        self.writer
            .flush()
            .with_context(|| format!("Failed to write metrics to {}", self.path.display()))
    }
}
