//! Drift between two tokenizations of the same document.
//!
//! The alignment score is the Jaccard overlap of the two tokenizations'
//! boundary sets, where a boundary is any byte offset at which a token starts
//! or ends. Identical segmentations score 1.0; segmentations that never agree
//! on a boundary score 0.0.

use serde::{Deserialize, Serialize};

use crate::analysis::token::TokenizationResult;
use crate::error::{DriftError, Result};
use crate::metrics::entropy::token_entropy;
use crate::metrics::result::AnalysisResult;

/// Drift of tokenizer A relative to tokenizer B on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMetrics {
    /// Document both tokenizations belong to.
    pub document_id: String,

    /// Name of tokenizer A.
    pub tokenizer_a: String,

    /// Name of tokenizer B.
    pub tokenizer_b: String,

    /// `count(A) - count(B)`.
    pub token_count_delta: i64,

    /// `entropy(A) - entropy(B)`, in bits.
    pub entropy_delta: f64,

    /// Shared boundary fraction in [0, 1].
    pub alignment_score: f64,
}

/// Jaccard overlap of token boundary offsets; 1.0 when both are empty.
pub fn alignment_score(a: &TokenizationResult, b: &TokenizationResult) -> f64 {
    let boundaries_a = a.boundaries();
    let boundaries_b = b.boundaries();

    let union = boundaries_a.union(&boundaries_b).count();
    if union == 0 {
        return 1.0;
    }
    let shared = boundaries_a.intersection(&boundaries_b).count();
    shared as f64 / union as f64
}

/// Compute drift of `a` relative to `b`.
///
/// # Errors
///
/// Returns [`DriftError::Drift`] when the two results were computed over
/// different document texts.
pub fn compute_drift(a: &AnalysisResult, b: &AnalysisResult) -> Result<DriftMetrics> {
    if a.document.text() != b.document.text() {
        return Err(DriftError::drift(format!(
            "cannot compare '{}' and '{}': document texts differ",
            a.document_id(),
            b.document_id()
        )));
    }

    let entropy_a = token_entropy(a.tokenization.texts()).entropy;
    let entropy_b = token_entropy(b.tokenization.texts()).entropy;

    Ok(DriftMetrics {
        document_id: a.document_id().to_string(),
        tokenizer_a: a.tokenizer.clone(),
        tokenizer_b: b.tokenizer.clone(),
        token_count_delta: a.token_count() as i64 - b.token_count() as i64,
        entropy_delta: entropy_a - entropy_b,
        alignment_score: alignment_score(&a.tokenization, &b.tokenization),
    })
}
