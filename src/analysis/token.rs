//! Token types produced by tokenizers.
//!
//! # Core Types
//!
//! - [`Token`] - A single token: text span, byte offsets, position, optional id
//! - [`TokenType`] - Coarse classification of token content
//! - [`TokenizationResult`] - The ordered, immutable token list for one
//!   (document, tokenizer) pair
//!
//! # Examples
//!
//! ```
//! use tokdrift::analysis::token::{Token, TokenizationResult};
//!
//! let tokens = vec![
//!     Token::with_offsets("the", 0, 0, 3),
//!     Token::with_offsets("cat", 1, 4, 7),
//! ];
//! let result = TokenizationResult::new("whitespace", tokens);
//! assert_eq!(result.len(), 2);
//! assert_eq!(result.texts(), vec!["the", "cat"]);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::size::EstimateSize;

/// A token represents a single unit of text after tokenization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token
    pub text: String,

    /// The position of the token in the token sequence (0-based)
    pub position: usize,

    /// The byte offset where this token starts in the original text
    pub start_offset: usize,

    /// The byte offset where this token ends in the original text
    pub end_offset: usize,

    /// Vocabulary id, for tokenizers that have one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,

    /// Token type classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
}

/// Token type classification for different kinds of tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// Alphanumeric text (English, Latin scripts)
    Alphanum,
    /// Numeric values
    Num,
    /// CJK (Chinese, Japanese, Korean) characters
    Cjk,
    /// Punctuation marks
    Punctuation,
    /// Other/unknown token types
    Other,
}

impl TokenType {
    /// Classify a piece of text.
    pub fn detect(word: &str) -> TokenType {
        if word.is_empty() {
            return TokenType::Other;
        }

        if word.chars().all(|c| c.is_numeric()) {
            return TokenType::Num;
        }

        if word.chars().any(|c| {
            matches!(c,
                '\u{4E00}'..='\u{9FFF}' |  // CJK Unified Ideographs
                '\u{3400}'..='\u{4DBF}' |  // CJK Extension A
                '\u{3040}'..='\u{30FF}' |  // Hiragana and Katakana
                '\u{AC00}'..='\u{D7AF}'    // Hangul syllables
            )
        }) {
            return TokenType::Cjk;
        }

        if word
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return TokenType::Alphanum;
        }

        if word.chars().all(|c| c.is_ascii_punctuation()) {
            return TokenType::Punctuation;
        }

        TokenType::Other
    }
}

impl Token {
    /// Create a new token with the given text and position.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: 0,
            end_offset: 0,
            id: None,
            token_type: None,
        }
    }

    /// Create a new token with text, position, and byte offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
            id: None,
            token_type: None,
        }
    }

    /// Set the vocabulary id.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the token type.
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = Some(token_type);
        self
    }

    /// Get the length of the token text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the token is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl EstimateSize for Token {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Token>() + self.text.capacity()
    }
}

/// Ordered tokens for one (document, tokenizer) pair.
///
/// Fields are private: once built, a tokenization is never modified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenizationResult {
    tokenizer: String,
    tokens: Vec<Token>,
}

impl TokenizationResult {
    /// Wrap the tokens produced by `tokenizer`.
    pub fn new<S: Into<String>>(tokenizer: S, tokens: Vec<Token>) -> Self {
        TokenizationResult {
            tokenizer: tokenizer.into(),
            tokens,
        }
    }

    /// Name of the tokenizer that produced these tokens.
    pub fn tokenizer(&self) -> &str {
        &self.tokenizer
    }

    /// The tokens, in order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Token texts, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Byte offsets where a token starts or ends.
    pub fn boundaries(&self) -> BTreeSet<usize> {
        self.tokens
            .iter()
            .flat_map(|t| [t.start_offset, t.end_offset])
            .collect()
    }
}

impl EstimateSize for TokenizationResult {
    fn estimated_size(&self) -> usize {
        self.tokenizer.estimated_size() + self.tokens.estimated_size()
    }
}
