//! Name-based lookup of tokenizer collaborators.
//!
//! The registry is an explicit object owned by the
//! [`AdvancedManager`](crate::manager::AdvancedManager), so two managers (or
//! two tests) never share tokenizer state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::analysis::tokenizer::Tokenizer;
use crate::analysis::tokenizer::ngram::NgramTokenizer;
use crate::analysis::tokenizer::regex::RegexTokenizer;
use crate::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use crate::error::{DriftError, Result, TokenizerErrorKind};

/// A tokenizer registered under a name, plus what the cache needs to know
/// about it.
#[derive(Clone)]
pub struct TokenizerHandle {
    /// Registry name; this is the tokenizer identity in results.
    pub name: String,

    /// The tokenizer implementation.
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl TokenizerHandle {
    /// Configuration snapshot used in cache keys: the tokenizer kind plus its
    /// own reported options.
    pub fn config_snapshot(&self) -> BTreeMap<String, String> {
        let mut snapshot = self.tokenizer.config_snapshot();
        snapshot.insert("kind".to_string(), self.tokenizer.name().to_string());
        snapshot
    }
}

impl std::fmt::Debug for TokenizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerHandle")
            .field("name", &self.name)
            .field("kind", &self.tokenizer.name())
            .finish()
    }
}

/// Thread-safe registry of tokenizers keyed by name.
#[derive(Default)]
pub struct TokenizerRegistry {
    tokenizers: RwLock<HashMap<String, TokenizerHandle>>,
}

impl TokenizerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the in-process reference tokenizers:
    /// `whitespace`, `whitespace_lower`, `unicode_word`, `regex_word`,
    /// `char_bigram`.
    pub fn with_builtins() -> Result<Self> {
        let registry = Self::new();
        registry.register("whitespace", Arc::new(WhitespaceTokenizer::new()))?;
        registry.register(
            "whitespace_lower",
            Arc::new(WhitespaceTokenizer::new().with_lowercase(true)),
        )?;
        registry.register("unicode_word", Arc::new(UnicodeWordTokenizer::new()))?;
        registry.register("regex_word", Arc::new(RegexTokenizer::new()?))?;
        registry.register("char_bigram", Arc::new(NgramTokenizer::bigram()))?;
        Ok(registry)
    }

    /// Register a tokenizer under `name`.
    pub fn register<S: Into<String>>(&self, name: S, tokenizer: Arc<dyn Tokenizer>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DriftError::invalid_config("tokenizer name must not be empty"));
        }

        let mut tokenizers = self.tokenizers.write();
        if tokenizers.contains_key(&name) {
            return Err(DriftError::invalid_config(format!(
                "tokenizer '{name}' is already registered"
            )));
        }
        tokenizers.insert(name.clone(), TokenizerHandle { name, tokenizer });
        Ok(())
    }

    /// Remove a tokenizer, returning it if it was present.
    pub fn unregister(&self, name: &str) -> Option<TokenizerHandle> {
        self.tokenizers.write().remove(name)
    }

    /// Look up a tokenizer by name.
    pub fn get(&self, name: &str) -> Result<TokenizerHandle> {
        self.tokenizers.read().get(name).cloned().ok_or_else(|| {
            DriftError::tokenizer(
                TokenizerErrorKind::Unavailable,
                format!("no tokenizer registered as '{name}'"),
            )
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tokenizers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tokenizers.
    pub fn len(&self) -> usize {
        self.tokenizers.read().len()
    }

    /// Check if no tokenizer is registered.
    pub fn is_empty(&self) -> bool {
        self.tokenizers.read().is_empty()
    }
}
