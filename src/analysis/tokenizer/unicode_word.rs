//! Unicode word tokenizer implementation.
//!
//! Splits text using Unicode word boundary rules (UAX #29) and drops
//! segments that contain no alphanumeric character (punctuation, spaces).
//!
//! ```
//! use tokdrift::analysis::tokenizer::Tokenizer;
//! use tokdrift::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
//!
//! let tokens = UnicodeWordTokenizer::new().tokenize("Hello, world!").unwrap();
//! assert_eq!(tokens[0].text, "Hello");
//! assert_eq!(tokens[1].text, "world");
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenType};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// A tokenizer that splits text on Unicode word boundaries.
#[derive(Clone, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    /// Create a new Unicode word tokenizer.
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let tokens = text
            .split_word_bound_indices()
            .filter(|(_, word)| word.chars().any(|c| c.is_alphanumeric()))
            .enumerate()
            .map(|(position, (start, word))| {
                Token::with_offsets(word, position, start, start + word.len())
                    .with_token_type(TokenType::detect(word))
            })
            .collect();

        Ok(tokens)
    }

    fn name(&self) -> &str {
        "unicode_word"
    }
}
