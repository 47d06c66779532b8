//! Configuration for the result cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Configuration for [`ResultCache`](super::ResultCache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,

    /// Maximum number of entries.
    pub max_size: usize,

    /// Lifetime of an entry from insertion.
    #[serde(with = "crate::util::duration_ms")]
    pub ttl: Duration,

    /// Period of the background expiry sweep.
    #[serde(with = "crate::util::duration_ms")]
    pub cleanup_interval: Duration,

    /// Whether hit/miss/eviction counters are maintained.
    pub enable_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            ttl: Duration::from_secs(60 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
            enable_stats: true,
        }
    }
}

impl CacheConfig {
    /// A configuration with caching turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the maximum entry count.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sweep period.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Enable or disable counters.
    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.enable_stats = enabled;
        self
    }

    /// Validate the configuration. A disabled cache is always valid.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_size == 0 {
            return Err(DriftError::invalid_config("cache.max_size must be at least 1"));
        }
        if self.ttl.is_zero() {
            return Err(DriftError::invalid_config("cache.ttl must be positive"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(DriftError::invalid_config(
                "cache.cleanup_interval must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(CacheConfig::default().validate().is_ok());
        assert!(CacheConfig::default().with_max_size(0).validate().is_err());
        assert!(CacheConfig::default().with_ttl(Duration::ZERO).validate().is_err());
        assert!(CacheConfig::disabled().with_max_size(0).validate().is_ok());
    }

    #[test]
    fn test_durations_in_millis() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"ttl": 1500, "cleanup_interval": 250}"#).unwrap();
        assert_eq!(config.ttl, Duration::from_millis(1500));
        assert_eq!(config.cleanup_interval, Duration::from_millis(250));
        assert_eq!(config.max_size, 1000);
    }
}
