//! Entropy, compression and drift metrics over tokenizer output.
//!
//! [`MetricsEngine`] is the entry point: it invokes a tokenizer once per
//! document and turns the tokens into an [`AnalysisResult`]. The submodules
//! hold the pure computations and can be used on their own.

pub mod compression;
pub mod config;
pub mod drift;
pub mod engine;
pub mod entropy;
pub mod result;

pub use config::AnalysisOptions;
pub use drift::{DriftMetrics, alignment_score, compute_drift};
pub use engine::{MetricsEngine, names};
pub use entropy::{EntropyStats, RollingEntropy};
pub use result::{AnalysisResult, MetricValue, Timing};
