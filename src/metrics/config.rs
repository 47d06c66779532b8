//! Options controlling which metrics the engine computes.

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Analysis options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Window length, in tokens, for rolling entropy.
    pub entropy_window_size: usize,

    /// Emit `normalized_entropy`.
    pub normalize_entropy: bool,

    /// Emit `compression_ratio` and `bytes_per_token`.
    pub compression_ratio: bool,

    /// Compute pairwise drift when comparing tokenizers.
    pub drift_detection: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            entropy_window_size: 100,
            normalize_entropy: true,
            compression_ratio: true,
            drift_detection: true,
        }
    }
}

impl AnalysisOptions {
    /// Set the rolling entropy window.
    pub fn with_entropy_window_size(mut self, size: usize) -> Self {
        self.entropy_window_size = size;
        self
    }

    /// Enable or disable normalized entropy.
    pub fn with_normalize_entropy(mut self, enabled: bool) -> Self {
        self.normalize_entropy = enabled;
        self
    }

    /// Enable or disable compression metrics.
    pub fn with_compression_ratio(mut self, enabled: bool) -> Self {
        self.compression_ratio = enabled;
        self
    }

    /// Enable or disable drift detection.
    pub fn with_drift_detection(mut self, enabled: bool) -> Self {
        self.drift_detection = enabled;
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.entropy_window_size == 0 {
            return Err(DriftError::invalid_config(
                "analysis.entropy_window_size must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let options = AnalysisOptions::default();
        assert_eq!(options.entropy_window_size, 100);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let options = AnalysisOptions::default().with_entropy_window_size(0);
        assert!(matches!(options.validate(), Err(DriftError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: AnalysisOptions =
            serde_json::from_str(r#"{"entropy_window_size": 2}"#).unwrap();
        assert_eq!(options.entropy_window_size, 2);
        assert!(options.compression_ratio);
    }
}
