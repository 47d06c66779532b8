//! # tokdrift
//!
//! Measure how differently tokenizers segment the same corpus.
//!
//! ## Features
//!
//! - Entropy, rolling entropy and DEFLATE compression metrics per document
//! - Drift between two tokenizations: token-count delta, entropy delta and
//!   boundary alignment
//! - Content-addressed result cache with LRU eviction and TTL expiry
//! - Bounded worker pool with per-item timeouts and cooperative cancellation
//! - Chunked streaming under a soft memory ceiling, with progress reporting
//! - Metric plugins registered in code or loaded from manifest files

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod parallel;
pub mod plugin;
pub mod streaming;
pub mod util;

pub use error::{DriftError, Result};

pub mod prelude {
    pub use crate::analysis::{Token, TokenizationResult, Tokenizer, TokenizerRegistry};
    pub use crate::config::DriftConfig;
    pub use crate::document::Document;
    pub use crate::error::{DriftError, Result};
    pub use crate::manager::{AdvancedManager, AnalysisRunResult, ComparisonReport};
    pub use crate::metrics::{AnalysisResult, DriftMetrics, MetricValue};
    pub use crate::plugin::{AnalysisContext, MetricPlugin, MetricResult};
    pub use crate::util::CancellationToken;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
