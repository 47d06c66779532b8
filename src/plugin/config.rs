//! Plugin configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Configuration of a single plugin.
///
/// The typed fields cover what most metric plugins need; anything
/// plugin-specific goes into `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Disabled plugins are skipped by `execute_metrics`.
    pub enabled: bool,

    /// Ordering hint for listings; higher first.
    pub priority: i32,

    /// Window length for windowed metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,

    /// Threshold for threshold-based metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    /// Plugin-specific options.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl PluginConfig {
    /// The configuration a plugin receives on registration.
    pub const DEFAULT: PluginConfig = PluginConfig {
        enabled: true,
        priority: 0,
        window_size: None,
        threshold: None,
        options: BTreeMap::new(),
    };

    /// Enable or disable the plugin.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the window size.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    /// Set the threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set a plugin-specific option.
    pub fn with_option<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Look up a plugin-specific option.
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Plugin section of the top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Whether plugins run at all.
    pub enabled: bool,

    /// Register the built-in plugins.
    pub auto_load: bool,

    /// Directory of `*.json` plugin manifests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_directory: Option<PathBuf>,

    /// Per-plugin configuration, applied after loading.
    pub configs: BTreeMap<String, PluginConfig>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_load: true,
            plugin_directory: None,
            configs: BTreeMap::new(),
        }
    }
}

impl PluginsConfig {
    /// A configuration with plugins turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the manifest directory.
    pub fn with_plugin_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.plugin_directory = Some(dir.into());
        self
    }

    /// Enable or disable built-in registration.
    pub fn with_auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = auto_load;
        self
    }

    /// Set the configuration of one plugin.
    pub fn with_config<S: Into<String>>(mut self, plugin: S, config: PluginConfig) -> Self {
        self.configs.insert(plugin.into(), config);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        for (name, config) in &self.configs {
            if config.window_size == Some(0) {
                return Err(DriftError::invalid_config(format!(
                    "plugins.configs.{name}.window_size must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// A declarative plugin entry loaded from a manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Name of the plugin to load.
    pub plugin: String,

    /// Its configuration.
    #[serde(default)]
    pub config: PluginConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parsing() {
        let manifest: PluginManifest = serde_json::from_str(
            r#"{"plugin": "vocabulary", "config": {"window_size": 50, "options": {"label": "x"}}}"#,
        )
        .unwrap();
        assert_eq!(manifest.plugin, "vocabulary");
        assert_eq!(manifest.config.window_size, Some(50));
        assert!(manifest.config.enabled);
        assert_eq!(manifest.config.option("label"), Some(&serde_json::json!("x")));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config =
            PluginsConfig::default().with_config("vocabulary", PluginConfig::default().with_window_size(0));
        assert!(config.validate().is_err());
    }
}
