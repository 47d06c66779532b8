//! Parallel processing of (document, tokenizer) work items.
//!
//! This module provides a bounded worker pool with per-item timeouts,
//! cooperative cancellation, and optional metrics. A sequential fallback with
//! the same contract is used when parallelism is disabled.

pub mod config;
pub mod metrics;
pub mod processor;
pub mod work;

pub use config::ParallelConfig;
pub use metrics::{ProcessMetrics, ProcessMetricsCollector};
pub use processor::{AnalyzeFn, ParallelProcessor, process_sequential};
pub use work::{FailureKind, ProcessOutcome, WorkFailure, WorkItem};
