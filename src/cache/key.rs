//! Content-addressed cache keys.
//!
//! A key is the BLAKE3 digest of the document text, the tokenizer name and
//! the tokenizer configuration snapshot. Every field is length-prefixed before
//! hashing so that adjacent fields cannot run into each other.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A 256-bit cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key for `text` analyzed by `tokenizer` configured as
    /// `config`.
    pub fn new(text: &str, tokenizer: &str, config: &BTreeMap<String, String>) -> Self {
        let mut hasher = blake3::Hasher::new();
        write_field(&mut hasher, text.as_bytes());
        write_field(&mut hasher, tokenizer.as_bytes());
        hasher.update(&(config.len() as u64).to_le_bytes());
        for (name, value) in config {
            write_field(&mut hasher, name.as_bytes());
            write_field(&mut hasher, value.as_bytes());
        }
        CacheKey(*hasher.finalize().as_bytes())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.to_hex()[..16])
    }
}
