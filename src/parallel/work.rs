//! Work items and their outcomes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{DriftError, TokenizerErrorKind};
use crate::metrics::result::AnalysisResult;
use crate::parallel::metrics::ProcessMetrics;

/// One (document, tokenizer) pair to analyze.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// The document.
    pub document: Arc<Document>,

    /// Registry name of the tokenizer.
    pub tokenizer: String,
}

impl WorkItem {
    /// Create a work item.
    pub fn new<S: Into<String>>(document: Arc<Document>, tokenizer: S) -> Self {
        Self {
            document,
            tokenizer: tokenizer.into(),
        }
    }
}

/// Why a work item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The tokenizer collaborator failed.
    Tokenizer(TokenizerErrorKind),
    /// The per-item timeout expired.
    Timeout,
    /// The caller cancelled before or during the item.
    Cancelled,
    /// Metric computation failed.
    Analysis,
    /// The analysis function panicked.
    Panicked,
}

impl FailureKind {
    /// Classify an error.
    pub fn of(error: &DriftError) -> Self {
        match error {
            DriftError::Tokenizer { kind, .. } => FailureKind::Tokenizer(*kind),
            DriftError::Timeout(_) => FailureKind::Timeout,
            DriftError::Cancelled(_) => FailureKind::Cancelled,
            _ => FailureKind::Analysis,
        }
    }
}

/// A work item that did not produce a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkFailure {
    /// Id of the document.
    pub document_id: String,

    /// Registry name of the tokenizer.
    pub tokenizer: String,

    /// Failure classification.
    pub kind: FailureKind,

    /// Error message.
    pub error: String,
}

impl WorkFailure {
    /// Build a failure for `item` from `error`.
    pub fn from_error(item: &WorkItem, error: &DriftError) -> Self {
        Self::new(item, FailureKind::of(error), error.to_string())
    }

    /// Build a failure for `item`.
    pub fn new<S: Into<String>>(item: &WorkItem, kind: FailureKind, error: S) -> Self {
        Self {
            document_id: item.document.id().to_string(),
            tokenizer: item.tokenizer.clone(),
            kind,
            error: error.into(),
        }
    }
}

/// Everything a batch produced. Every submitted item appears exactly once,
/// in `results` or in `failures`.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    /// Successful analyses, in completion order.
    pub results: Vec<AnalysisResult>,

    /// Failed items.
    pub failures: Vec<WorkFailure>,

    /// Per-run counters, when metrics are enabled.
    pub metrics: Option<ProcessMetrics>,
}

impl ProcessOutcome {
    /// Number of items accounted for.
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Move another outcome's results and failures into this one.
    pub fn extend(&mut self, other: ProcessOutcome) {
        self.results.extend(other.results);
        self.failures.extend(other.failures);
        match (&mut self.metrics, other.metrics) {
            (Some(mine), Some(theirs)) => mine.merge(&theirs),
            (None, Some(theirs)) => self.metrics = Some(theirs),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        let item = WorkItem::new(Arc::new(Document::new("d1", "x")), "ws");

        let failure = WorkFailure::from_error(
            &item,
            &DriftError::tokenizer(TokenizerErrorKind::Runtime, "exit 1"),
        );
        assert_eq!(failure.kind, FailureKind::Tokenizer(TokenizerErrorKind::Runtime));
        assert_eq!(failure.document_id, "d1");

        assert_eq!(FailureKind::of(&DriftError::timeout("t")), FailureKind::Timeout);
        assert_eq!(FailureKind::of(&DriftError::cancelled("c")), FailureKind::Cancelled);
        assert_eq!(FailureKind::of(&DriftError::analysis("a")), FailureKind::Analysis);
    }
}
