//! Plugins shipped with the crate.

use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{DriftError, Result};
use crate::plugin::{AnalysisContext, MetricPlugin, MetricResult, PluginConfig};

/// Names of the built-in plugins.
pub const BUILTIN_PLUGINS: &[&str] = &[TokenLengthPlugin::NAME, VocabularyPlugin::NAME];

/// Instantiate a built-in plugin by name.
pub fn builtin(name: &str) -> Option<Arc<dyn MetricPlugin>> {
    match name {
        TokenLengthPlugin::NAME => Some(Arc::new(TokenLengthPlugin)),
        VocabularyPlugin::NAME => Some(Arc::new(VocabularyPlugin)),
        _ => None,
    }
}

/// Token length statistics, in characters.
///
/// Emits `mean`, `max`, and `long_token_ratio` (fraction of tokens longer
/// than `threshold` characters) when a threshold is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenLengthPlugin;

impl TokenLengthPlugin {
    pub const NAME: &'static str = "token_length";
}

impl MetricPlugin for TokenLengthPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> String {
        "Mean and maximum token length in characters".to_string()
    }

    fn validate_config(&self, config: &PluginConfig) -> Result<()> {
        match config.threshold {
            Some(t) if !t.is_finite() || t < 0.0 => Err(DriftError::invalid_config(
                "token_length threshold must be a non-negative number",
            )),
            _ => Ok(()),
        }
    }

    fn compute(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<MetricResult>> {
        let lengths: Vec<usize> = ctx
            .tokenization
            .tokens()
            .iter()
            .map(|t| t.text.chars().count())
            .collect();

        let (mean, max) = if lengths.is_empty() {
            (0.0, 0)
        } else {
            let total: usize = lengths.iter().sum();
            (
                total as f64 / lengths.len() as f64,
                lengths.iter().copied().max().unwrap_or(0),
            )
        };

        let mut metrics = vec![
            MetricResult::new("mean", mean).with_unit("chars"),
            MetricResult::new("max", max as f64).with_unit("chars"),
        ];

        if let Some(threshold) = ctx.config.threshold {
            let long = lengths.iter().filter(|&&len| len as f64 > threshold).count();
            let ratio = if lengths.is_empty() {
                0.0
            } else {
                long as f64 / lengths.len() as f64
            };
            metrics.push(
                MetricResult::new("long_token_ratio", ratio)
                    .with_metadata("threshold", threshold.to_string()),
            );
        }

        Ok(metrics)
    }
}

/// Vocabulary richness.
///
/// Emits `type_token_ratio` and `hapax_ratio` (tokens seen once divided by
/// distinct tokens). With `window_size` set, also emits the moving-average
/// type-token ratio `mattr` over windows of that length.
#[derive(Debug, Default, Clone, Copy)]
pub struct VocabularyPlugin;

impl VocabularyPlugin {
    pub const NAME: &'static str = "vocabulary";
}

impl MetricPlugin for VocabularyPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> String {
        "Type-token ratio and hapax ratio".to_string()
    }

    fn validate_config(&self, config: &PluginConfig) -> Result<()> {
        if config.window_size == Some(0) {
            return Err(DriftError::invalid_config(
                "vocabulary window_size must be at least 1",
            ));
        }
        Ok(())
    }

    fn compute(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<MetricResult>> {
        let texts = ctx.tokenization.texts();

        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for &text in &texts {
            *counts.entry(text).or_insert(0) += 1;
        }

        let (ttr, hapax) = if texts.is_empty() {
            (0.0, 0.0)
        } else {
            let hapax = counts.values().filter(|&&c| c == 1).count();
            (
                counts.len() as f64 / texts.len() as f64,
                hapax as f64 / counts.len() as f64,
            )
        };

        let mut metrics = vec![
            MetricResult::new("type_token_ratio", ttr),
            MetricResult::new("hapax_ratio", hapax),
        ];

        if let Some(window) = ctx.config.window_size {
            if let Some(mattr) = moving_average_ttr(&texts, window) {
                metrics.push(
                    MetricResult::new("mattr", mattr).with_metadata("window_size", window.to_string()),
                );
            }
        }

        Ok(metrics)
    }
}

/// Mean type-token ratio over every window of `window` consecutive tokens.
fn moving_average_ttr(texts: &[&str], window: usize) -> Option<f64> {
    if window == 0 || window > texts.len() {
        return None;
    }

    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    for &text in &texts[..window] {
        *counts.entry(text).or_insert(0) += 1;
    }

    let mut sum = counts.len() as f64 / window as f64;
    for i in window..texts.len() {
        let outgoing = texts[i - window];
        if let Some(count) = counts.get_mut(outgoing) {
            *count -= 1;
            if *count == 0 {
                counts.remove(outgoing);
            }
        }
        *counts.entry(texts[i]).or_insert(0) += 1;
        sum += counts.len() as f64 / window as f64;
    }

    Some(sum / (texts.len() - window + 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::{Token, TokenizationResult};
    use crate::util::CancellationToken;

    fn tokenization(text: &str) -> TokenizationResult {
        TokenizationResult::new(
            "ws",
            text.split_whitespace()
                .enumerate()
                .map(|(i, w)| Token::new(w, i))
                .collect(),
        )
    }

    fn metric(results: &[MetricResult], name: &str) -> Option<f64> {
        results.iter().find(|m| m.name == name).map(|m| m.value)
    }

    #[test]
    fn test_token_length() {
        let tokens = tokenization("a bbb cc");
        let cancel = CancellationToken::new();
        let config = PluginConfig::default().with_threshold(1.5);
        let ctx = AnalysisContext::new("d", "a bbb cc", &tokens, "ws", &cancel);

        let results = TokenLengthPlugin.compute(&ctx.with_config(&config)).unwrap();
        assert_eq!(metric(&results, "mean"), Some(2.0));
        assert_eq!(metric(&results, "max"), Some(3.0));
        assert!((metric(&results, "long_token_ratio").unwrap() - 2.0 / 3.0).abs() < 1e-12);

        let plain = TokenLengthPlugin.compute(&ctx).unwrap();
        assert!(metric(&plain, "long_token_ratio").is_none());
    }

    #[test]
    fn test_vocabulary() {
        let tokens = tokenization("the cat the dog");
        let cancel = CancellationToken::new();
        let ctx = AnalysisContext::new("d", "the cat the dog", &tokens, "ws", &cancel);

        let results = VocabularyPlugin.compute(&ctx).unwrap();
        assert_eq!(metric(&results, "type_token_ratio"), Some(0.75));
        assert!((metric(&results, "hapax_ratio").unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_vocabulary_mattr() {
        let tokens = tokenization("a b a a");
        let cancel = CancellationToken::new();
        let config = PluginConfig::default().with_window_size(2);
        let ctx = AnalysisContext::new("d", "a b a a", &tokens, "ws", &cancel);

        // windows: (a b)=1.0, (b a)=1.0, (a a)=0.5
        let results = VocabularyPlugin.compute(&ctx.with_config(&config)).unwrap();
        assert!((metric(&results, "mattr").unwrap() - 2.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_tokenization() {
        let tokens = tokenization("");
        let cancel = CancellationToken::new();
        let ctx = AnalysisContext::new("d", "", &tokens, "ws", &cancel);

        assert_eq!(metric(&TokenLengthPlugin.compute(&ctx).unwrap(), "mean"), Some(0.0));
        assert_eq!(
            metric(&VocabularyPlugin.compute(&ctx).unwrap(), "type_token_ratio"),
            Some(0.0)
        );
    }

    #[test]
    fn test_builtin_lookup() {
        for name in BUILTIN_PLUGINS {
            assert_eq!(builtin(name).unwrap().name(), *name);
        }
        assert!(builtin("nope").is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(VocabularyPlugin
            .validate_config(&PluginConfig::default().with_window_size(0))
            .is_err());
        assert!(TokenLengthPlugin
            .validate_config(&PluginConfig::default().with_threshold(-1.0))
            .is_err());
    }
}
