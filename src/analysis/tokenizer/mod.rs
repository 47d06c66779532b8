//! Tokenizer collaborator contract and reference implementations.
//!
//! The analysis core treats tokenizers as opaque collaborators: given text,
//! return the ordered token list or a classified error. Whether the tokenizer
//! runs in-process or in another process is invisible to callers.
//!
//! # Available Tokenizers
//!
//! - [`whitespace::WhitespaceTokenizer`] - Splits on whitespace characters
//! - [`unicode_word::UnicodeWordTokenizer`] - Uses Unicode word boundaries
//! - [`regex::RegexTokenizer`] - Custom regex-based tokenization
//! - [`ngram::NgramTokenizer`] - Character n-gram tokenization
//! - [`command::CommandTokenizer`] - Delegates to an external process
//!
//! # Examples
//!
//! ```
//! use tokdrift::analysis::tokenizer::Tokenizer;
//! use tokdrift::analysis::tokenizer::whitespace::WhitespaceTokenizer;
//!
//! let tokenizer = WhitespaceTokenizer::new();
//! let tokens = tokenizer.tokenize("Hello world").unwrap();
//! assert_eq!(tokens.len(), 2);
//! ```

use std::collections::BTreeMap;

use crate::analysis::token::Token;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
///
/// The trait requires `Send + Sync` so one instance can serve every worker of
/// the parallel processor.
///
/// # Examples
///
/// Implementing a custom tokenizer:
///
/// ```
/// use tokdrift::analysis::token::Token;
/// use tokdrift::analysis::tokenizer::Tokenizer;
/// use tokdrift::error::Result;
///
/// struct CommaTokenizer;
///
/// impl Tokenizer for CommaTokenizer {
///     fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
///         Ok(text
///             .split(',')
///             .enumerate()
///             .map(|(i, s)| Token::new(s.trim(), i))
///             .collect())
///     }
///
///     fn name(&self) -> &str {
///         "comma"
///     }
/// }
/// ```
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into an ordered list of tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;

    /// The tokenizer kind, e.g. `"whitespace"`.
    fn name(&self) -> &str;

    /// Configuration that influences the output of [`Tokenizer::tokenize`].
    ///
    /// Two tokenizers with equal names and snapshots must produce equal
    /// tokens for equal input; the result cache relies on it.
    fn config_snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

pub mod command;
pub mod ngram;
pub mod regex;
pub mod unicode_word;
pub mod whitespace;
