//! Character n-gram tokenizer implementation.

use std::collections::BTreeMap;

use crate::analysis::token::Token;
use crate::analysis::tokenizer::Tokenizer;
use crate::error::{DriftError, Result};

/// A tokenizer that generates character n-grams.
///
/// # Examples
///
/// ```
/// use tokdrift::analysis::tokenizer::ngram::NgramTokenizer;
/// use tokdrift::analysis::tokenizer::Tokenizer;
///
/// let tokenizer = NgramTokenizer::new(2, 2).unwrap();
/// let grams: Vec<_> = tokenizer
///     .tokenize("hello")
///     .unwrap()
///     .into_iter()
///     .map(|t| t.text)
///     .collect();
/// assert_eq!(grams, vec!["he", "el", "ll", "lo"]);
/// ```
#[derive(Clone, Debug)]
pub struct NgramTokenizer {
    /// Minimum n-gram size
    min_gram: usize,
    /// Maximum n-gram size
    max_gram: usize,
}

impl NgramTokenizer {
    /// Create a new n-gram tokenizer.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_gram` is 0 or `max_gram < min_gram`.
    pub fn new(min_gram: usize, max_gram: usize) -> Result<Self> {
        if min_gram == 0 {
            return Err(DriftError::invalid_config("min_gram must be at least 1"));
        }
        if max_gram < min_gram {
            return Err(DriftError::invalid_config(format!(
                "max_gram ({max_gram}) must be >= min_gram ({min_gram})"
            )));
        }
        Ok(Self { min_gram, max_gram })
    }

    /// Create a bigram tokenizer (n=2).
    pub fn bigram() -> Self {
        Self {
            min_gram: 2,
            max_gram: 2,
        }
    }
}

impl Tokenizer for NgramTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        // Byte offset of every char boundary, including the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = offsets.len() - 1;
        let mut tokens = Vec::new();

        for start in 0..char_count {
            for gram_size in self.min_gram..=self.max_gram {
                let end = start + gram_size;
                if end > char_count {
                    break;
                }
                let (start_offset, end_offset) = (offsets[start], offsets[end]);
                let position = tokens.len();
                tokens.push(Token::with_offsets(
                    &text[start_offset..end_offset],
                    position,
                    start_offset,
                    end_offset,
                ));
            }
        }

        Ok(tokens)
    }

    fn name(&self) -> &str {
        "ngram"
    }

    fn config_snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("min_gram".to_string(), self.min_gram.to_string()),
            ("max_gram".to_string(), self.max_gram.to_string()),
        ])
    }
}
