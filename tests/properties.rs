use std::sync::Arc;

use proptest::prelude::*;

use tokdrift::analysis::registry::TokenizerHandle;
use tokdrift::analysis::tokenizer::Tokenizer;
use tokdrift::analysis::tokenizer::ngram::NgramTokenizer;
use tokdrift::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use tokdrift::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use tokdrift::document::Document;
use tokdrift::metrics::entropy::{rolling_entropy, token_entropy};
use tokdrift::metrics::{AnalysisOptions, MetricsEngine, compute_drift};
use tokdrift::util::CancellationToken;

fn handle(name: &str, tokenizer: Arc<dyn Tokenizer>) -> TokenizerHandle {
    TokenizerHandle {
        name: name.to_string(),
        tokenizer,
    }
}

proptest! {
    #[test]
    fn test_normalized_entropy_in_unit_interval(
        tokens in prop::collection::vec("[a-e]{1,3}", 0..200)
    ) {
        let stats = token_entropy(tokens.iter().map(String::as_str));
        prop_assert!(stats.entropy >= 0.0);
        prop_assert!((0.0..=1.0).contains(&stats.normalized));
        prop_assert!(stats.entropy <= (stats.unique_tokens.max(1) as f64).log2() + 1e-9);
    }

    #[test]
    fn test_single_repeated_token_has_zero_entropy(token in "[a-z]{1,8}", count in 1usize..100) {
        let tokens = vec![token.as_str(); count];
        let stats = token_entropy(tokens.iter().copied());
        prop_assert_eq!(stats.entropy, 0.0);
        prop_assert_eq!(stats.normalized, 0.0);
    }

    #[test]
    fn test_rolling_window_count(
        tokens in prop::collection::vec("[a-c]", 0..60),
        window in 0usize..70
    ) {
        let rolling = rolling_entropy(tokens.iter().map(String::as_str), window);
        if window == 0 || window > tokens.len() {
            prop_assert!(rolling.is_none());
        } else {
            let rolling = rolling.unwrap();
            prop_assert_eq!(rolling.window_count(), tokens.len() - window + 1);
            prop_assert!(rolling.variance >= 0.0);
        }
    }

    #[test]
    fn test_drift_is_antisymmetric(text in "[a-z ]{1,80}") {
        let engine = MetricsEngine::new(AnalysisOptions::default()).unwrap();
        let cancel = CancellationToken::new();
        let document = Arc::new(Document::new("doc", text));

        let a = engine
            .analyze_document(&cancel, Arc::clone(&document), &handle("words", Arc::new(UnicodeWordTokenizer::new())))
            .or_else(|_| engine.analyze_document(&cancel, Arc::clone(&document), &handle("words", Arc::new(WhitespaceTokenizer::new()))));
        let b = engine.analyze_document(&cancel, Arc::clone(&document), &handle("bigrams", Arc::new(NgramTokenizer::bigram())));

        if let (Ok(a), Ok(b)) = (a, b) {
            let ab = compute_drift(&a, &b).unwrap();
            let ba = compute_drift(&b, &a).unwrap();
            prop_assert_eq!(ab.token_count_delta, -ba.token_count_delta);
            prop_assert!((ab.entropy_delta + ba.entropy_delta).abs() < 1e-9);
            prop_assert_eq!(ab.alignment_score, ba.alignment_score);
            prop_assert!((0.0..=1.0).contains(&ab.alignment_score));
        }
    }
}
