//! The metrics engine: tokenize once, then compute every enabled metric.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::analysis::registry::TokenizerHandle;
use crate::analysis::token::TokenizationResult;
use crate::document::Document;
use crate::error::{DriftError, Result, TokenizerErrorKind};
use crate::metrics::compression::compression_stats;
use crate::metrics::config::AnalysisOptions;
use crate::metrics::drift::{DriftMetrics, compute_drift};
use crate::metrics::entropy::{RollingEntropy, rolling_entropy, token_entropy};
use crate::metrics::result::{AnalysisResult, MetricValue, Timing};
use crate::util::CancellationToken;

/// Metric names emitted by the engine.
pub mod names {
    pub const TOKEN_COUNT: &str = "token_count";
    pub const UNIQUE_TOKENS: &str = "unique_tokens";
    pub const ENTROPY: &str = "entropy";
    pub const NORMALIZED_ENTROPY: &str = "normalized_entropy";
    pub const COMPRESSION_RATIO: &str = "compression_ratio";
    pub const BYTES_PER_TOKEN: &str = "bytes_per_token";
    pub const ROLLING_ENTROPY_MEAN: &str = "rolling_entropy_mean";
    pub const ROLLING_ENTROPY_VARIANCE: &str = "rolling_entropy_variance";
    pub const ROLLING_ENTROPY_WINDOWS: &str = "rolling_entropy_windows";
}

/// Stateless metric computation over tokenizer output.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    options: AnalysisOptions,
}

impl MetricsEngine {
    /// Create an engine, validating `options`.
    pub fn new(options: AnalysisOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Options in effect.
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Tokenize `document` with `tokenizer` and compute its metrics.
    ///
    /// Fails when the tokenizer fails, when it returns no tokens for a
    /// non-empty document (whitespace included), or when `cancel` fires before metrics are
    /// computed. Numeric edge cases never fail: an empty document has entropy 0.
    pub fn analyze_document(
        &self,
        cancel: &CancellationToken,
        document: Arc<Document>,
        tokenizer: &TokenizerHandle,
    ) -> Result<AnalysisResult> {
        cancel.check("analysis")?;

        let started_at = Utc::now();
        let start = Instant::now();

        let tokens = tokenizer.tokenizer.tokenize(document.text())?;
        if tokens.is_empty() && !document.text().is_empty() {
            return Err(DriftError::tokenizer(
                TokenizerErrorKind::Runtime,
                format!(
                    "'{}' produced no tokens for non-empty document '{}'",
                    tokenizer.name,
                    document.id()
                ),
            ));
        }
        let tokenization = TokenizationResult::new(tokenizer.name.clone(), tokens);

        cancel.check("analysis")?;

        let (metrics, rolling) = self.compute_metrics(document.text(), &tokenization)?;

        let finished_at = Utc::now();
        log::debug!(
            "analyzed '{}' with '{}': {} tokens",
            document.id(),
            tokenizer.name,
            tokenization.len()
        );

        Ok(AnalysisResult {
            document,
            tokenizer: tokenizer.name.clone(),
            tokenization,
            metrics,
            rolling_entropy: rolling,
            timing: Timing {
                started_at,
                finished_at,
                duration: start.elapsed(),
            },
        })
    }

    /// Compute the metric map for an existing tokenization of `text`.
    pub fn compute_metrics(
        &self,
        text: &str,
        tokenization: &TokenizationResult,
    ) -> Result<(BTreeMap<String, MetricValue>, Option<RollingEntropy>)> {
        let texts = tokenization.texts();
        let mut metrics = BTreeMap::new();

        let entropy = token_entropy(texts.iter().copied());
        metrics.insert(
            names::TOKEN_COUNT.to_string(),
            MetricValue::with_unit(entropy.token_count as f64, "tokens"),
        );
        metrics.insert(
            names::UNIQUE_TOKENS.to_string(),
            MetricValue::with_unit(entropy.unique_tokens as f64, "tokens"),
        );
        metrics.insert(
            names::ENTROPY.to_string(),
            MetricValue::with_unit(entropy.entropy, "bits"),
        );
        if self.options.normalize_entropy {
            metrics.insert(
                names::NORMALIZED_ENTROPY.to_string(),
                MetricValue::new(entropy.normalized),
            );
        }

        if self.options.compression_ratio {
            let compression = compression_stats(text, texts.iter().copied())?;
            metrics.insert(
                names::COMPRESSION_RATIO.to_string(),
                MetricValue::new(compression.compression_ratio)
                    .with_metadata("compressor", "deflate")
                    .with_metadata("compressed_bytes", compression.compressed_bytes.to_string()),
            );
            metrics.insert(
                names::BYTES_PER_TOKEN.to_string(),
                MetricValue::with_unit(compression.bytes_per_token, "bytes"),
            );
        }

        let rolling = rolling_entropy(texts.iter().copied(), self.options.entropy_window_size);
        if let Some(rolling) = &rolling {
            let window = rolling.window_size.to_string();
            metrics.insert(
                names::ROLLING_ENTROPY_MEAN.to_string(),
                MetricValue::with_unit(rolling.mean, "bits").with_metadata("window_size", &window),
            );
            metrics.insert(
                names::ROLLING_ENTROPY_VARIANCE.to_string(),
                MetricValue::new(rolling.variance).with_metadata("window_size", &window),
            );
            metrics.insert(
                names::ROLLING_ENTROPY_WINDOWS.to_string(),
                MetricValue::new(rolling.window_count() as f64),
            );
        }

        Ok((metrics, rolling))
    }

    /// Drift of `a` relative to `b`; both must cover the same text.
    pub fn drift(&self, a: &AnalysisResult, b: &AnalysisResult) -> Result<DriftMetrics> {
        compute_drift(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;
    use crate::analysis::tokenizer::Tokenizer;
    use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;

    struct SilentTokenizer;

    impl Tokenizer for SilentTokenizer {
        fn tokenize(&self, _text: &str) -> Result<Vec<Token>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn handle(name: &str, tokenizer: Arc<dyn Tokenizer>) -> TokenizerHandle {
        TokenizerHandle {
            name: name.to_string(),
            tokenizer,
        }
    }

    fn engine(window: usize) -> MetricsEngine {
        MetricsEngine::new(AnalysisOptions::default().with_entropy_window_size(window)).unwrap()
    }

    #[test]
    fn test_analyze_simple_document() {
        let engine = engine(2);
        let doc = Arc::new(Document::new("d1", "the cat sat"));
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));

        let result = engine
            .analyze_document(&CancellationToken::new(), doc, &mock)
            .unwrap();

        assert_eq!(result.token_count(), 3);
        assert_eq!(result.metric(names::TOKEN_COUNT), Some(3.0));
        assert_eq!(result.metric(names::ROLLING_ENTROPY_WINDOWS), Some(2.0));
        assert_eq!(result.rolling_entropy.as_ref().unwrap().window_count(), 2);
        assert!(result.metric(names::COMPRESSION_RATIO).is_some());
        assert!(result.timing.finished_at >= result.timing.started_at);
    }

    #[test]
    fn test_window_larger_than_document_omits_rolling() {
        let engine = engine(10);
        let doc = Arc::new(Document::new("d1", "a b c"));
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));

        let result = engine
            .analyze_document(&CancellationToken::new(), doc, &mock)
            .unwrap();
        assert!(result.rolling_entropy.is_none());
        assert!(result.metric(names::ROLLING_ENTROPY_MEAN).is_none());
        assert!(result.metric(names::ENTROPY).is_some());
    }

    #[test]
    fn test_empty_document_has_zero_entropy() {
        let engine = engine(2);
        let doc = Arc::new(Document::new("empty", ""));
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));

        let result = engine
            .analyze_document(&CancellationToken::new(), doc, &mock)
            .unwrap();
        assert_eq!(result.metric(names::ENTROPY), Some(0.0));
        assert_eq!(result.metric(names::COMPRESSION_RATIO), Some(0.0));
    }

    #[test]
    fn test_zero_tokens_for_text_is_an_error() {
        let engine = engine(2);
        let doc = Arc::new(Document::new("d1", "some text"));
        let silent = handle("silent", Arc::new(SilentTokenizer));

        let err = engine
            .analyze_document(&CancellationToken::new(), doc, &silent)
            .unwrap_err();
        assert!(err.is_tokenizer_error());
    }

    #[test]
    fn test_whitespace_only_document_without_tokens_is_an_error() {
        let engine = engine(2);
        let doc = Arc::new(Document::new("blank", "   "));
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));

        let err = engine
            .analyze_document(&CancellationToken::new(), doc, &mock)
            .unwrap_err();
        assert!(err.is_tokenizer_error());
    }

    #[test]
    fn test_cancelled_token_stops_analysis() {
        let engine = engine(2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let doc = Arc::new(Document::new("d1", "a b"));
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));

        assert!(matches!(
            engine.analyze_document(&cancel, doc, &mock),
            Err(DriftError::Cancelled(_))
        ));
    }

    #[test]
    fn test_disabled_metrics_are_omitted() {
        let options = AnalysisOptions::default()
            .with_normalize_entropy(false)
            .with_compression_ratio(false);
        let engine = MetricsEngine::new(options).unwrap();
        let doc = Arc::new(Document::new("d1", "a b a"));
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));

        let result = engine
            .analyze_document(&CancellationToken::new(), doc, &mock)
            .unwrap();
        assert!(result.metric(names::NORMALIZED_ENTROPY).is_none());
        assert!(result.metric(names::COMPRESSION_RATIO).is_none());
        assert!(result.metric(names::BYTES_PER_TOKEN).is_none());
    }

    #[test]
    fn test_drift_between_identical_configurations() {
        let engine = engine(2);
        let doc = Arc::new(Document::new("d1", "the cat sat"));
        let a = handle("mock_a", Arc::new(WhitespaceTokenizer::new()));
        let b = handle("mock_b", Arc::new(WhitespaceTokenizer::new().with_lowercase(true)));
        let cancel = CancellationToken::new();

        let ra = engine.analyze_document(&cancel, doc.clone(), &a).unwrap();
        let rb = engine.analyze_document(&cancel, doc, &b).unwrap();
        let drift = engine.drift(&ra, &rb).unwrap();

        assert_eq!(drift.token_count_delta, 0);
        assert_eq!(drift.alignment_score, 1.0);
        assert_eq!(drift.tokenizer_a, "mock_a");
    }

    #[test]
    fn test_drift_rejects_different_texts() {
        let engine = engine(2);
        let mock = handle("mock", Arc::new(WhitespaceTokenizer::new()));
        let cancel = CancellationToken::new();

        let ra = engine
            .analyze_document(&cancel, Arc::new(Document::new("d1", "a b")), &mock)
            .unwrap();
        let rb = engine
            .analyze_document(&cancel, Arc::new(Document::new("d1", "a c")), &mock)
            .unwrap();
        assert!(matches!(engine.drift(&ra, &rb), Err(DriftError::Drift(_))));
    }
}
