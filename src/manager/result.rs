//! Aggregate results of manager runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::config::DriftConfig;
use crate::metrics::{AnalysisResult, DriftMetrics};
use crate::parallel::{ProcessMetrics, WorkFailure};
use crate::streaming::StreamStats;

/// Statistics gathered during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Documents submitted.
    pub documents: usize,

    /// Documents answered from the cache.
    pub cache_hits: usize,

    /// Documents that had to be analyzed.
    pub cache_misses: usize,

    /// Whether the misses went through the streaming analyzer.
    pub streamed: bool,

    /// Cache counters at the end of the run, when the cache is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,

    /// Processor counters for this run, when metrics are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessMetrics>,

    /// Streaming statistics, when the run was streamed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamStats>,
}

/// Outcome of one [`analyze_with_advanced`] call.
///
/// [`analyze_with_advanced`]: super::AdvancedManager::analyze_with_advanced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRunResult {
    /// Unique id of the run.
    pub run_id: Uuid,

    /// Tokenizer the documents were analyzed with.
    pub tokenizer: String,

    /// Start of the run.
    pub started_at: DateTime<Utc>,

    /// End of the run.
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration.
    #[serde(with = "crate::util::duration_ms")]
    pub duration: Duration,

    /// Configuration the run used.
    pub config: DriftConfig,

    /// Successful analyses, cached and fresh, in submission order.
    pub results: Vec<Arc<AnalysisResult>>,

    /// Documents that could not be analyzed.
    pub failures: Vec<WorkFailure>,

    /// Run statistics.
    pub statistics: RunStatistics,

    /// Why the run stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<String>,
}

impl AnalysisRunResult {
    /// Result for a document id.
    pub fn result(&self, document_id: &str) -> Option<&Arc<AnalysisResult>> {
        self.results.iter().find(|r| r.document_id() == document_id)
    }

    /// Whether the run stopped before every document was handled.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Whether every submitted document produced a result.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.is_interrupted()
    }

    /// Mean of a metric over all results that carry it.
    pub fn mean_metric(&self, name: &str) -> Option<f64> {
        let values: Vec<f64> = self.results.iter().filter_map(|r| r.metric(name)).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Outcome of [`compare_tokenizers`](super::AdvancedManager::compare_tokenizers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Unique id of the comparison.
    pub comparison_id: Uuid,

    /// Tokenizers compared, in the order given.
    pub tokenizers: Vec<String>,

    /// One run per tokenizer, in the same order.
    pub runs: Vec<AnalysisRunResult>,

    /// Drift of every earlier tokenizer against every later one, per document.
    pub drift: Vec<DriftMetrics>,

    /// Wall-clock duration.
    #[serde(with = "crate::util::duration_ms")]
    pub duration: Duration,
}

impl ComparisonReport {
    /// The run of one tokenizer.
    pub fn run(&self, tokenizer: &str) -> Option<&AnalysisRunResult> {
        self.runs.iter().find(|r| r.tokenizer == tokenizer)
    }

    /// Drift entries of tokenizer `a` against tokenizer `b`.
    pub fn drift_between<'a>(
        &'a self,
        a: &'a str,
        b: &'a str,
    ) -> impl Iterator<Item = &'a DriftMetrics> + 'a {
        self.drift
            .iter()
            .filter(move |d| d.tokenizer_a == a && d.tokenizer_b == b)
    }

    /// Mean alignment score of tokenizer `a` against tokenizer `b`.
    pub fn mean_alignment(&self, a: &str, b: &str) -> Option<f64> {
        let scores: Vec<f64> = self.drift_between(a, b).map(|d| d.alignment_score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    /// Whether any underlying run was interrupted.
    pub fn is_interrupted(&self) -> bool {
        self.runs.iter().any(AnalysisRunResult::is_interrupted)
    }
}
