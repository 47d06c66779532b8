//! Top-level configuration.
//!
//! [`DriftConfig`] groups the configuration of every orchestration component.
//! Each section can be enabled or disabled independently. Durations are
//! written in milliseconds.
//!
//! # Examples
//!
//! ```
//! use tokdrift::config::DriftConfig;
//!
//! let config = DriftConfig::from_json_str(
//!     r#"{ "cache": { "max_size": 10, "ttl": 60000 }, "parallel": { "enabled": false } }"#,
//! ).unwrap();
//! assert_eq!(config.cache.max_size, 10);
//! assert!(!config.parallel.enabled);
//! assert_eq!(config.streaming.chunk_size, 100);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::Result;
use crate::metrics::AnalysisOptions;
use crate::parallel::ParallelConfig;
use crate::plugin::PluginsConfig;
use crate::streaming::StreamingConfig;

/// Configuration of an [`AdvancedManager`](crate::manager::AdvancedManager).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Result cache.
    pub cache: CacheConfig,

    /// Parallel processor.
    pub parallel: ParallelConfig,

    /// Streaming analyzer.
    pub streaming: StreamingConfig,

    /// Plugin registry.
    pub plugins: PluginsConfig,

    /// Metric computation.
    pub analysis: AnalysisOptions,
}

impl DriftConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DriftConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the cache section.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the parallel section.
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the streaming section.
    pub fn with_streaming(mut self, streaming: StreamingConfig) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the plugins section.
    pub fn with_plugins(mut self, plugins: PluginsConfig) -> Self {
        self.plugins = plugins;
        self
    }

    /// Set the analysis section.
    pub fn with_analysis(mut self, analysis: AnalysisOptions) -> Self {
        self.analysis = analysis;
        self
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.parallel.validate()?;
        self.streaming.validate()?;
        self.plugins.validate()?;
        self.analysis.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::error::DriftError;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DriftConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_keeps_milliseconds() {
        let config = DriftConfig::default()
            .with_cache(CacheConfig::default().with_ttl(Duration::from_millis(1500)));
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"ttl\": 1500"));

        let parsed = DriftConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_section_is_rejected() {
        let result = DriftConfig::from_json_str(r#"{ "analysis": { "entropy_window_size": 0 } }"#);
        assert!(matches!(result, Err(DriftError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let file = NamedTempFile::new()?;
        fs::write(file.path(), r#"{ "streaming": { "chunk_size": 7 } }"#)?;

        let config = DriftConfig::from_json_file(file.path())?;
        assert_eq!(config.streaming.chunk_size, 7);
        Ok(())
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            DriftConfig::from_json_str("{ not json"),
            Err(DriftError::Json(_))
        ));
    }
}
