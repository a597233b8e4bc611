//! Plugin sources and normalization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::defaults::{DEFAULT_ORDER, SCRIPT_EXTENSION};
use super::script::ScriptPlugin;
use super::{LoadedPlugin, Plugin};
use crate::walk::walk;

/// A plugin as it comes out of a source, before normalization.
pub struct RawPlugin {
    /// Name of the unit the plugin was loaded from, if any.
    pub unit_name: Option<String>,
    pub plugin: Arc<dyn Plugin>,
}

/// Turn a raw plugin into a [`LoadedPlugin`].
///
/// The name is the plugin's explicit name, else the unit name, else the
/// concrete type name, else `"anonymous"`. The order defaults to
/// [`DEFAULT_ORDER`]. Never fails.
pub fn normalize(raw: RawPlugin) -> LoadedPlugin {
    let name = raw
        .plugin
        .name()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or(raw.unit_name)
        .or_else(|| short_type_name(raw.plugin.type_name()))
        .unwrap_or_else(|| "anonymous".to_string());

    let order = raw.plugin.order().unwrap_or(DEFAULT_ORDER);

    LoadedPlugin {
        name,
        order,
        plugin: raw.plugin,
    }
}

/// "cactus::plugin::builtin::ContextPlugin" -> "ContextPlugin"
fn short_type_name(full: &str) -> Option<String> {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::")
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Sources
// =============================================================================

/// Where plugins come from. Re-evaluated on every reload.
pub enum PluginSource {
    Objects(ObjectSource),
    Directory(DirectorySource),
}

impl PluginSource {
    pub fn objects(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self::Objects(ObjectSource::new(plugins))
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory(DirectorySource::new(path))
    }

    /// Load and normalize every plugin of this source.
    pub fn load(&self) -> Vec<LoadedPlugin> {
        match self {
            Self::Objects(source) => source.load(),
            Self::Directory(source) => source.load(),
        }
    }
}

/// A fixed list of compiled-in plugin instances.
pub struct ObjectSource {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl ObjectSource {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// The plugins in input order. Instances are shared between reloads.
    pub fn load(&self) -> Vec<LoadedPlugin> {
        self.plugins
            .iter()
            .map(|plugin| {
                normalize(RawPlugin {
                    unit_name: None,
                    plugin: Arc::clone(plugin),
                })
            })
            .collect()
    }
}

/// A directory scanned for plugin scripts.
pub struct DirectorySource {
    path: PathBuf,
}

impl DirectorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Eligible script paths relative to the directory, in walk order.
    ///
    /// A subdirectory that cannot be listed is logged and skipped; the scan
    /// carries on with the rest of the tree.
    fn scripts(&self) -> Vec<PathBuf> {
        let mut scripts = Vec::new();
        for entry in walk(&self.path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "could not scan plugin directory");
                    continue;
                }
            };
            scripts.extend(
                entry
                    .files
                    .iter()
                    .map(|file| entry.dir.join(file))
                    .filter(|rel| is_plugin_path(rel)),
            );
        }
        scripts
    }

    /// Load every eligible script, in walk order.
    ///
    /// A script that fails to load is logged and skipped.
    pub fn load(&self) -> Vec<LoadedPlugin> {
        let mut plugins = Vec::new();
        for relative in self.scripts() {
            let path = self.path.join(relative);
            let unit_name = unit_name(&path);

            match ScriptPlugin::load(&path, &unit_name) {
                Ok(script) => {
                    debug!(path = %path.display(), unit = %unit_name, "loaded plugin");
                    plugins.push(normalize(RawPlugin {
                        unit_name: Some(unit_name),
                        plugin: Arc::new(script),
                    }));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not load plugin");
                }
            }
        }

        plugins
    }
}

/// Whether a path (relative to the plugin directory) is an enabled plugin.
///
/// Literal rule: the extension must be `.rhai` and the path must not contain
/// `disabled` anywhere.
pub fn is_plugin_path(path: &Path) -> bool {
    if path.extension().is_none_or(|ext| ext != SCRIPT_EXTENSION) {
        return false;
    }
    !path.to_string_lossy().contains("disabled")
}

/// `plugins/seo.rhai` -> `plugin_seo`
fn unit_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("plugin_{stem}")
}
