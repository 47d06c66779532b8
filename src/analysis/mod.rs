//! Tokenization layer for tokdrift.
//!
//! This module defines the tokenizer collaborator contract, a handful of
//! in-process reference tokenizers, an adapter for external tokenizer
//! processes, and the [`registry::TokenizerRegistry`] the manager resolves
//! tokenizer names through.

pub mod registry;
pub mod token;
pub mod tokenizer;

// Re-export commonly used types
pub use registry::TokenizerRegistry;
pub use token::*;
pub use tokenizer::*;
