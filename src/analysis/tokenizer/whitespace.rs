//! Whitespace tokenizer implementation.

use std::collections::BTreeMap;

use super::Tokenizer;

use crate::analysis::token::{Token, TokenType};
use crate::error::Result;

/// A tokenizer that splits text on whitespace.
///
/// With `lowercase` set, token texts are lowercased; offsets always refer to
/// the original text.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer {
    lowercase: bool,
}

impl WhitespaceTokenizer {
    /// Create a new whitespace tokenizer.
    pub fn new() -> Self {
        WhitespaceTokenizer { lowercase: false }
    }

    /// Lowercase token texts.
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut word_start: Option<usize> = None;

        let push = |start: usize, end: usize, tokens: &mut Vec<Token>| {
            let word = &text[start..end];
            let token_text = if self.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };
            let position = tokens.len();
            tokens.push(
                Token::with_offsets(token_text, position, start, end)
                    .with_token_type(TokenType::detect(word)),
            );
        };

        for (offset, c) in text.char_indices() {
            match (c.is_whitespace(), word_start) {
                (true, Some(start)) => {
                    push(start, offset, &mut tokens);
                    word_start = None;
                }
                (false, None) => word_start = Some(offset),
                _ => {}
            }
        }
        if let Some(start) = word_start {
            push(start, text.len(), &mut tokens);
        }

        Ok(tokens)
    }

    fn name(&self) -> &str {
        "whitespace"
    }

    fn config_snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("lowercase".to_string(), self.lowercase.to_string())])
    }
}
