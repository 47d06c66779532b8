//! Metric plugins.
//!
//! A plugin computes extra metrics for a document after the core metrics
//! engine has tokenized it. Plugins receive a read-only [`AnalysisContext`]
//! and return zero or more [`MetricResult`]s; they are held as
//! `Arc<dyn MetricPlugin>` in a [`PluginRegistry`] owned by the manager.
//!
//! # Lifecycle
//!
//! 1. `register` calls [`MetricPlugin::initialize`] with the default config.
//! 2. `configure` calls [`MetricPlugin::validate_config`], then
//!    `initialize` again with the new config.
//! 3. `unregister` and `close` call [`MetricPlugin::cleanup`].
//!
//! ```
//! use tokdrift::plugin::{AnalysisContext, MetricPlugin, MetricResult, PluginRegistry};
//! use std::sync::Arc;
//!
//! struct CharCount;
//!
//! impl MetricPlugin for CharCount {
//!     fn name(&self) -> &str { "char_count" }
//!     fn version(&self) -> String { "1.0.0".to_string() }
//!     fn compute(&self, ctx: &AnalysisContext<'_>) -> tokdrift::Result<Vec<MetricResult>> {
//!         Ok(vec![MetricResult::new("chars", ctx.text.chars().count() as f64)])
//!     }
//! }
//!
//! let registry = PluginRegistry::new();
//! registry.register(Arc::new(CharCount)).unwrap();
//! assert_eq!(registry.names(), vec!["char_count"]);
//! ```

pub mod builtin;
pub mod config;
pub mod loader;
pub mod registry;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::token::TokenizationResult;
use crate::error::Result;
use crate::util::CancellationToken;

pub use config::{PluginConfig, PluginManifest, PluginsConfig};
pub use registry::PluginRegistry;

/// Identity metadata of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique name.
    pub name: String,

    /// Version string.
    pub version: String,

    /// Human-readable description.
    pub description: String,

    /// Whether the plugin currently runs.
    pub enabled: bool,

    /// Ordering hint from its configuration.
    pub priority: i32,
}

/// One named metric emitted by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric name, unique within one plugin invocation.
    pub name: String,

    /// Numeric value.
    pub value: f64,

    /// Unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// When the value was computed.
    pub timestamp: DateTime<Utc>,
}

impl MetricResult {
    /// A unitless metric stamped now.
    pub fn new<S: Into<String>>(name: S, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the unit.
    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

static DEFAULT_CONFIG: PluginConfig = PluginConfig::DEFAULT;

/// Read-only view of one analyzed document handed to plugins.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// Document id.
    pub document_id: &'a str,

    /// Document text.
    pub text: &'a str,

    /// Tokens produced for `text`.
    pub tokenization: &'a TokenizationResult,

    /// Registry name of the tokenizer.
    pub tokenizer: &'a str,

    /// Configuration of the plugin being run.
    pub config: &'a PluginConfig,

    /// Cancellation and deadline handle of the enclosing work item.
    pub cancel: &'a CancellationToken,
}

impl<'a> AnalysisContext<'a> {
    /// Build a context carrying the default plugin configuration.
    pub fn new(
        document_id: &'a str,
        text: &'a str,
        tokenization: &'a TokenizationResult,
        tokenizer: &'a str,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            document_id,
            text,
            tokenization,
            tokenizer,
            config: &DEFAULT_CONFIG,
            cancel,
        }
    }

    /// The same view with a plugin-specific configuration.
    pub fn with_config<'b>(&self, config: &'b PluginConfig) -> AnalysisContext<'b>
    where
        'a: 'b,
    {
        AnalysisContext {
            document_id: self.document_id,
            text: self.text,
            tokenization: self.tokenization,
            tokenizer: self.tokenizer,
            config,
            cancel: self.cancel,
        }
    }
}

/// A metric extension.
pub trait MetricPlugin: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Version string.
    fn version(&self) -> String;

    /// Short description.
    fn description(&self) -> String {
        String::new()
    }

    /// Reject configurations this plugin cannot use.
    fn validate_config(&self, _config: &PluginConfig) -> Result<()> {
        Ok(())
    }

    /// Prepare the plugin for `config`. Called on registration and after
    /// every successful reconfiguration.
    fn initialize(&self, _config: &PluginConfig) -> Result<()> {
        Ok(())
    }

    /// Compute metrics for one document.
    fn compute(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<MetricResult>>;

    /// Release resources. Called on unregistration and registry close.
    fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}
