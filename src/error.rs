//! Error types for tokdrift.
//!
//! All fallible operations return [`Result`], whose error type is
//! [`DriftError`]. The variants follow the taxonomy the orchestration layer
//! uses to decide whether a run continues or aborts:
//!
//! - configuration errors abort the component being built,
//! - tokenizer (collaborator) errors are recorded per work item,
//! - timeouts and cancellations degrade to partial results,
//! - plugin errors abort the enclosing metric execution.
//!
//! # Examples
//!
//! ```
//! use tokdrift::error::{DriftError, Result};
//!
//! fn check_window(size: usize) -> Result<()> {
//!     if size == 0 {
//!         return Err(DriftError::invalid_config("entropy window must be positive"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_window(0).is_err());
//! ```

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a tokenizer collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenizerErrorKind {
    /// The tokenizer cannot be reached (missing binary, unknown name).
    Unavailable,
    /// The tokenizer is reachable but its configuration is invalid.
    Misconfigured,
    /// The tokenizer failed while processing input.
    Runtime,
}

impl fmt::Display for TokenizerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenizerErrorKind::Unavailable => "unavailable",
            TokenizerErrorKind::Misconfigured => "misconfigured",
            TokenizerErrorKind::Runtime => "runtime failure",
        };
        f.write_str(label)
    }
}

/// The main error type for tokdrift operations.
#[derive(Error, Debug)]
pub enum DriftError {
    /// I/O errors (corpus reading, subprocess pipes, plugin manifests).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration values or unknown component names.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The tokenizer collaborator failed.
    #[error("Tokenizer {kind}: {message}")]
    Tokenizer {
        kind: TokenizerErrorKind,
        message: String,
    },

    /// Metric computation errors.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Drift was requested over tokenizations that cannot be compared.
    #[error("Drift error: {0}")]
    Drift(String),

    /// A metric plugin failed.
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// An operation exceeded its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Operation cancelled.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Resource exhausted.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Invalid operation for the current component state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with DriftError.
pub type Result<T> = std::result::Result<T, DriftError>;

impl DriftError {
    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        DriftError::InvalidConfig(msg.into())
    }

    /// Create a new tokenizer error of the given kind.
    pub fn tokenizer<S: Into<String>>(kind: TokenizerErrorKind, msg: S) -> Self {
        DriftError::Tokenizer {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        DriftError::Analysis(msg.into())
    }

    /// Create a new drift error.
    pub fn drift<S: Into<String>>(msg: S) -> Self {
        DriftError::Drift(msg.into())
    }

    /// Create a new plugin error.
    pub fn plugin<S: Into<String>>(msg: S) -> Self {
        DriftError::Plugin(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        DriftError::Timeout(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        DriftError::Cancelled(msg.into())
    }

    /// Create a new resource exhausted error.
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        DriftError::ResourceExhausted(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        DriftError::InvalidOperation(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DriftError::Other(msg.into())
    }

    /// Whether this error came from the tokenizer collaborator.
    pub fn is_tokenizer_error(&self) -> bool {
        matches!(self, DriftError::Tokenizer { .. })
    }

    /// Whether this error represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriftError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = DriftError::invalid_config("window must be positive");
        assert_eq!(
            error.to_string(),
            "Invalid configuration: window must be positive"
        );

        let error = DriftError::plugin("vocabulary failed");
        assert_eq!(error.to_string(), "Plugin error: vocabulary failed");

        let error = DriftError::tokenizer(TokenizerErrorKind::Unavailable, "no such binary");
        assert_eq!(error.to_string(), "Tokenizer unavailable: no such binary");
        assert!(error.is_tokenizer_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let drift_error = DriftError::from(io_error);

        match drift_error {
            DriftError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_timeout_classification() {
        assert!(DriftError::timeout("slow").is_timeout());
        assert!(!DriftError::cancelled("stop").is_timeout());
    }
}
