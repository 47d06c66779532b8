//! Analysis result types.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::token::TokenizationResult;
use crate::document::Document;
use crate::metrics::entropy::RollingEntropy;
use crate::util::size::EstimateSize;

/// A computed metric with optional unit and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Numeric value.
    pub value: f64,

    /// Unit, e.g. `"bits"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl MetricValue {
    /// A unitless value.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            unit: None,
            metadata: BTreeMap::new(),
        }
    }

    /// A value with a unit.
    pub fn with_unit<S: Into<String>>(value: f64, unit: S) -> Self {
        Self {
            value,
            unit: Some(unit.into()),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Wall-clock timing of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// When the analysis started.
    pub started_at: DateTime<Utc>,

    /// When the analysis finished.
    pub finished_at: DateTime<Utc>,

    /// Elapsed time.
    #[serde(with = "crate::util::duration_ms")]
    pub duration: Duration,
}

/// One document analyzed by one tokenizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The analyzed document.
    pub document: Arc<Document>,

    /// Registry name of the tokenizer.
    pub tokenizer: String,

    /// The tokens the tokenizer produced.
    pub tokenization: TokenizationResult,

    /// Metric name to value.
    pub metrics: BTreeMap<String, MetricValue>,

    /// Rolling entropy series, when the window fits the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_entropy: Option<RollingEntropy>,

    /// Timing metadata.
    pub timing: Timing,
}

impl AnalysisResult {
    /// Document id shortcut.
    pub fn document_id(&self) -> &str {
        self.document.id()
    }

    /// Value of the named metric, if present.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|m| m.value)
    }

    /// Number of tokens.
    pub fn token_count(&self) -> usize {
        self.tokenization.len()
    }
}

impl EstimateSize for AnalysisResult {
    fn estimated_size(&self) -> usize {
        let metrics: usize = self
            .metrics
            .iter()
            .map(|(k, v)| k.capacity() + std::mem::size_of::<MetricValue>() + v.metadata.len() * 32)
            .sum();
        let rolling = self
            .rolling_entropy
            .as_ref()
            .map_or(0, |r| r.values.len() * std::mem::size_of::<f64>());

        std::mem::size_of::<AnalysisResult>()
            + self.tokenizer.capacity()
            + self.tokenization.estimated_size()
            + metrics
            + rolling
    }
}
