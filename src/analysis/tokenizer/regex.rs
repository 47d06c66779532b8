//! Regex-based tokenizer implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::Token;
use crate::error::{DriftError, Result};

/// A regex-based tokenizer that extracts tokens using regular expressions.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    /// The regex pattern used to extract tokens
    pattern: Arc<Regex>,
    /// Whether to extract gaps (text between matches) instead of matches
    gaps: bool,
}

impl RegexTokenizer {
    /// Create a new regex tokenizer with the default pattern `\w+`.
    pub fn new() -> Result<Self> {
        Self::with_pattern(r"\w+")
    }

    /// Create a new regex tokenizer with a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Ok(RegexTokenizer {
            pattern: Arc::new(Self::compile(pattern)?),
            gaps: false,
        })
    }

    /// Create a tokenizer that extracts gaps (text between matches) instead of matches.
    pub fn with_gaps(pattern: &str) -> Result<Self> {
        Ok(RegexTokenizer {
            pattern: Arc::new(Self::compile(pattern)?),
            gaps: true,
        })
    }

    fn compile(pattern: &str) -> Result<Regex> {
        Regex::new(pattern)
            .map_err(|e| DriftError::invalid_config(format!("Invalid regex pattern: {e}")))
    }

    /// Get the regex pattern used by this tokenizer.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Check if this tokenizer extracts gaps.
    pub fn gaps(&self) -> bool {
        self.gaps
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        if !self.gaps {
            return Ok(self
                .pattern
                .find_iter(text)
                .enumerate()
                .map(|(position, mat)| {
                    Token::with_offsets(mat.as_str(), position, mat.start(), mat.end())
                })
                .collect());
        }

        let mut gaps = Vec::new();
        let mut last_end = 0;
        for mat in self.pattern.find_iter(text) {
            gaps.push((last_end, mat.start()));
            last_end = mat.end();
        }
        gaps.push((last_end, text.len()));

        let tokens = gaps
            .into_iter()
            .filter(|(start, end)| end > start)
            .enumerate()
            .map(|(position, (start, end))| {
                Token::with_offsets(&text[start..end], position, start, end)
            })
            .collect();

        Ok(tokens)
    }

    fn name(&self) -> &str {
        "regex"
    }

    fn config_snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("pattern".to_string(), self.pattern.as_str().to_string()),
            ("gaps".to_string(), self.gaps.to_string()),
        ])
    }
}
