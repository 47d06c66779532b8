//! Configuration for streaming analysis.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};
use crate::util::size::mb_to_bytes;

/// Configuration for [`StreamingAnalyzer`](super::StreamingAnalyzer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Whether large batches are streamed in chunks.
    pub enabled: bool,

    /// Documents per chunk.
    pub chunk_size: usize,

    /// Chunks the reader may buffer ahead of processing.
    pub buffer_size: usize,

    /// Soft ceiling on in-flight data, in MiB.
    pub max_memory_mb: usize,

    /// Whether the progress callback is invoked.
    pub enable_progress: bool,

    /// Report progress every this many chunks.
    pub progress_interval: usize,

    /// Overall time budget of one stream.
    #[serde(with = "crate::util::duration_ms")]
    pub timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: 100,
            buffer_size: 4,
            max_memory_mb: 512,
            enable_progress: true,
            progress_interval: 1,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl StreamingConfig {
    /// A configuration with streaming turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the memory ceiling in MiB.
    pub fn with_max_memory_mb(mut self, mb: usize) -> Self {
        self.max_memory_mb = mb;
        self
    }

    /// Configure progress reporting.
    pub fn with_progress(mut self, enabled: bool, interval: usize) -> Self {
        self.enable_progress = enabled;
        self.progress_interval = interval;
        self
    }

    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Memory ceiling in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        mb_to_bytes(self.max_memory_mb)
    }

    /// Validate the configuration. A disabled streamer is always valid.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.chunk_size == 0 {
            return Err(DriftError::invalid_config("streaming.chunk_size must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(DriftError::invalid_config("streaming.buffer_size must be at least 1"));
        }
        if self.max_memory_mb == 0 {
            return Err(DriftError::invalid_config(
                "streaming.max_memory_mb must be at least 1",
            ));
        }
        if self.enable_progress && self.progress_interval == 0 {
            return Err(DriftError::invalid_config(
                "streaming.progress_interval must be at least 1",
            ));
        }
        if self.timeout.is_zero() {
            return Err(DriftError::invalid_config("streaming.timeout must be positive"));
        }
        Ok(())
    }
}
