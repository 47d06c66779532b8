//! Thread-safe plugin registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DriftError, Result};
use crate::plugin::{AnalysisContext, MetricPlugin, MetricResult, PluginConfig, PluginInfo};

struct Slot {
    plugin: Arc<dyn MetricPlugin>,
    config: PluginConfig,
}

#[derive(Default)]
struct State {
    plugins: BTreeMap<String, Slot>,
    closed: bool,
}

/// Registry of metric plugins keyed by name.
///
/// One lock guards all state: lookups and execution share it, registration,
/// reconfiguration and removal take it exclusively.
#[derive(Default)]
pub struct PluginRegistry {
    state: RwLock<State>,
}

fn plugin_error(name: &str, err: DriftError) -> DriftError {
    match err {
        DriftError::Plugin(_) => err,
        other => DriftError::plugin(format!("{name}: {other}")),
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` with the default configuration.
    pub fn register(&self, plugin: Arc<dyn MetricPlugin>) -> Result<()> {
        self.register_with_config(plugin, PluginConfig::default())
    }

    /// Register `plugin` with `config`.
    ///
    /// Fails if the name is empty or taken, if `config` is rejected, or if
    /// initialization fails; in every failure case nothing is registered.
    pub fn register_with_config(
        &self,
        plugin: Arc<dyn MetricPlugin>,
        config: PluginConfig,
    ) -> Result<()> {
        let name = plugin.name().to_string();
        if name.trim().is_empty() {
            return Err(DriftError::plugin("plugin name must not be empty"));
        }

        let mut state = self.state.write();
        if state.closed {
            return Err(DriftError::invalid_operation("plugin registry is closed"));
        }
        if state.plugins.contains_key(&name) {
            return Err(DriftError::plugin(format!(
                "plugin '{name}' is already registered"
            )));
        }

        plugin
            .validate_config(&config)
            .map_err(|e| plugin_error(&name, e))?;
        plugin.initialize(&config).map_err(|e| plugin_error(&name, e))?;

        log::debug!("registered plugin '{name}' v{}", plugin.version());
        state.plugins.insert(name, Slot { plugin, config });
        Ok(())
    }

    /// Remove a plugin and run its cleanup hook.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let slot = {
            let mut state = self.state.write();
            if state.closed {
                return Err(DriftError::invalid_operation("plugin registry is closed"));
            }
            state
                .plugins
                .remove(name)
                .ok_or_else(|| DriftError::plugin(format!("plugin '{name}' is not registered")))?
        };
        slot.plugin.cleanup().map_err(|e| plugin_error(name, e))
    }

    /// Replace the configuration of a registered plugin.
    ///
    /// The plugin validates `config` and is re-initialized with it. If either
    /// step fails the previous configuration stays in effect.
    pub fn configure(&self, name: &str, config: PluginConfig) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(DriftError::invalid_operation("plugin registry is closed"));
        }
        let slot = state
            .plugins
            .get_mut(name)
            .ok_or_else(|| DriftError::plugin(format!("plugin '{name}' is not registered")))?;

        slot.plugin
            .validate_config(&config)
            .map_err(|e| plugin_error(name, e))?;
        slot.plugin
            .initialize(&config)
            .map_err(|e| plugin_error(name, e))?;
        slot.config = config;
        Ok(())
    }

    /// Look up a plugin.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MetricPlugin>> {
        self.state
            .read()
            .plugins
            .get(name)
            .map(|slot| Arc::clone(&slot.plugin))
    }

    /// Current configuration of a plugin.
    pub fn config(&self, name: &str) -> Option<PluginConfig> {
        self.state.read().plugins.get(name).map(|slot| slot.config.clone())
    }

    /// Metadata of every plugin, highest priority first, then by name.
    pub fn list(&self) -> Vec<PluginInfo> {
        let state = self.state.read();
        let mut infos: Vec<PluginInfo> = state
            .plugins
            .iter()
            .map(|(name, slot)| PluginInfo {
                name: name.clone(),
                version: slot.plugin.version(),
                description: slot.plugin.description(),
                enabled: slot.config.enabled,
                priority: slot.config.priority,
            })
            .collect();
        infos.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        infos
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.state.read().plugins.keys().cloned().collect()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.state.read().plugins.len()
    }

    /// Check if no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().plugins.is_empty()
    }

    /// Run every enabled plugin against `ctx`, in name order.
    ///
    /// Any plugin error fails the whole call and no partial results are
    /// returned.
    pub fn execute_metrics(
        &self,
        ctx: &AnalysisContext<'_>,
    ) -> Result<BTreeMap<String, Vec<MetricResult>>> {
        let state = self.state.read();
        if state.closed {
            return Err(DriftError::invalid_operation("plugin registry is closed"));
        }

        let mut results = BTreeMap::new();
        for (name, slot) in &state.plugins {
            if !slot.config.enabled {
                continue;
            }
            ctx.cancel.check("plugin execution")?;
            let metrics = slot
                .plugin
                .compute(&ctx.with_config(&slot.config))
                .map_err(|e| plugin_error(name, e))?;
            results.insert(name.clone(), metrics);
        }
        Ok(results)
    }

    /// Run one plugin against `ctx`, even if it is disabled.
    pub fn execute_plugin(&self, name: &str, ctx: &AnalysisContext<'_>) -> Result<Vec<MetricResult>> {
        let state = self.state.read();
        if state.closed {
            return Err(DriftError::invalid_operation("plugin registry is closed"));
        }
        let slot = state
            .plugins
            .get(name)
            .ok_or_else(|| DriftError::plugin(format!("plugin '{name}' is not registered")))?;
        slot.plugin
            .compute(&ctx.with_config(&slot.config))
            .map_err(|e| plugin_error(name, e))
    }

    /// Stable digest of the enabled plugin set and its configuration.
    ///
    /// Two registries with the same fingerprint produce the same plugin
    /// metrics for the same input, so the digest is part of cache keys.
    pub fn fingerprint(&self) -> String {
        let state = self.state.read();
        let mut hasher = blake3::Hasher::new();
        for (name, slot) in state.plugins.iter().filter(|(_, s)| s.config.enabled) {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            hasher.update(slot.plugin.version().as_bytes());
            hasher.update(&[0]);
            let config = serde_json::to_vec(&slot.config).unwrap_or_default();
            hasher.update(&config);
            hasher.update(&[0xff]);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Run every plugin's cleanup hook and drop all plugins.
    ///
    /// Cleanup errors are collected into one combined error. After closing,
    /// mutation and execution fail. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let plugins = {
            let mut state = self.state.write();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.plugins)
        };

        let errors: Vec<String> = plugins
            .iter()
            .filter_map(|(name, slot)| slot.plugin.cleanup().err().map(|e| format!("{name}: {e}")))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DriftError::plugin(format!(
                "{} plugin(s) failed to clean up: {}",
                errors.len(),
                errors.join("; ")
            )))
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .field("closed", &self.is_closed())
            .finish()
    }
}
