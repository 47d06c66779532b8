//! Declarative plugin loading.
//!
//! A plugin directory holds `*.json` manifests, one plugin each:
//!
//! ```json
//! { "plugin": "vocabulary", "config": { "window_size": 50 } }
//! ```
//!
//! Manifests name built-in plugins; they are applied in file name order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DriftError, Result};
use crate::plugin::builtin::{BUILTIN_PLUGINS, builtin};
use crate::plugin::config::{PluginManifest, PluginsConfig};
use crate::plugin::registry::PluginRegistry;

/// Read every manifest in `dir`, sorted by file name.
pub fn read_manifests(dir: &Path) -> Result<Vec<(PathBuf, PluginManifest)>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let contents = fs::read_to_string(&path)?;
            let manifest: PluginManifest = serde_json::from_str(&contents).map_err(|e| {
                DriftError::invalid_config(format!("{}: {e}", path.display()))
            })?;
            Ok((path, manifest))
        })
        .collect()
}

/// Apply one manifest: configure the plugin if present, otherwise register it.
fn apply_manifest(registry: &PluginRegistry, path: &Path, manifest: PluginManifest) -> Result<()> {
    if registry.get(&manifest.plugin).is_some() {
        return registry.configure(&manifest.plugin, manifest.config);
    }

    let plugin = builtin(&manifest.plugin).ok_or_else(|| {
        DriftError::invalid_config(format!(
            "{}: unknown plugin '{}' (available: {})",
            path.display(),
            manifest.plugin,
            BUILTIN_PLUGINS.join(", ")
        ))
    })?;
    registry.register_with_config(plugin, manifest.config)
}

/// Load every manifest in `dir` into `registry`; returns how many were applied.
pub fn load_directory(registry: &PluginRegistry, dir: &Path) -> Result<usize> {
    let manifests = read_manifests(dir)?;
    let count = manifests.len();
    for (path, manifest) in manifests {
        log::debug!("loading plugin manifest {}", path.display());
        apply_manifest(registry, &path, manifest)?;
    }
    Ok(count)
}

impl PluginRegistry {
    /// Build a registry from configuration.
    ///
    /// Built-ins are registered when `auto_load` is set, then manifests from
    /// `plugin_directory` are applied, then `configs` overrides.
    pub fn from_config(config: &PluginsConfig) -> Result<Self> {
        config.validate()?;
        let registry = PluginRegistry::new();

        if config.auto_load {
            for name in BUILTIN_PLUGINS {
                if let Some(plugin) = builtin(name) {
                    registry.register(plugin)?;
                }
            }
        }

        if let Some(dir) = &config.plugin_directory {
            let loaded = load_directory(&registry, dir)?;
            log::info!("loaded {loaded} plugin manifest(s) from {}", dir.display());
        }

        for (name, plugin_config) in &config.configs {
            if registry.get(name).is_none() {
                return Err(DriftError::invalid_config(format!(
                    "configuration given for unregistered plugin '{name}'"
                )));
            }
            registry.configure(name, plugin_config.clone())?;
        }

        Ok(registry)
    }
}
