//! Configuration for parallel processing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Configuration for [`ParallelProcessor`](super::ParallelProcessor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// When false, work runs sequentially on the calling thread.
    pub enabled: bool,

    /// Worker pool size; 0 means the number of CPU cores.
    pub max_workers: usize,

    /// Items claimed together by one worker.
    pub batch_size: usize,

    /// Per-item timeout.
    #[serde(with = "crate::util::duration_ms")]
    pub timeout: Duration,

    /// Whether per-run and cumulative metrics are collected.
    pub enable_metrics: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: 0,
            batch_size: 16,
            timeout: Duration::from_secs(30),
            enable_metrics: true,
        }
    }
}

impl ParallelConfig {
    /// A configuration that runs everything sequentially.
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the worker count.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the per-item timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Worker count after resolving 0 to the core count.
    pub fn effective_workers(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_workers
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DriftError::invalid_config("parallel.batch_size must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(DriftError::invalid_config("parallel.timeout must be positive"));
        }
        Ok(())
    }
}
