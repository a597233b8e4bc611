//! Plugin system.
//!
//! A plugin is anything implementing [`Plugin`]. Every hook has a no-op
//! default, so a plugin overrides only the hooks it cares about and callers
//! never check whether a hook exists.
//!
//! Plugins come from [`PluginSource`]s: a fixed list of compiled-in objects,
//! or a directory of Rhai scripts. The [`PluginManager`] reloads every source
//! before each build and invokes hooks on the plugins in source order.

pub mod builtin;
mod defaults;
mod manager;
mod script;
mod source;

pub use manager::PluginManager;
pub use source::PluginSource;

use std::path::PathBuf;
use std::sync::Arc;

use crate::build::Page;
use crate::deploy::DeployFile;
use crate::site::Site;

/// Template context handed to page hooks.
pub type PageContext = serde_json::Map<String, serde_json::Value>;

/// Result of a single hook call.
pub type HookResult = Result<(), PluginError>;

#[derive(thiserror::Error, Debug)]
pub enum PluginError {
    #[error("could not load plugin at {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("plugin '{plugin}' failed in {hook}: {message}")]
    Hook {
        plugin: String,
        hook: &'static str,
        message: String,
    },
}

/// The lifecycle hooks a plugin can implement.
///
/// All hooks receive the [`Site`] being built and default to doing nothing.
pub trait Plugin: Send + Sync {
    /// Explicit plugin name. Falls back to the unit or type name.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Explicit order value. Falls back to the default order of 1000.
    fn order(&self) -> Option<i64> {
        None
    }

    /// Concrete type name, used as a naming fallback.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn pre_build(&self, _site: &Site) -> HookResult {
        Ok(())
    }

    fn post_build(&self, _site: &Site) -> HookResult {
        Ok(())
    }

    /// Called before a page is rendered; may add to its template context.
    fn pre_build_page(&self, _site: &Site, _page: &Page, _context: &mut PageContext) -> HookResult {
        Ok(())
    }

    fn post_build_page(&self, _site: &Site, _page: &Page) -> HookResult {
        Ok(())
    }

    fn pre_deploy(&self, _site: &Site) -> HookResult {
        Ok(())
    }

    fn post_deploy(&self, _site: &Site) -> HookResult {
        Ok(())
    }

    /// Called before a file is published; may adjust its headers.
    fn pre_deploy_file(&self, _site: &Site, _file: &mut DeployFile) -> HookResult {
        Ok(())
    }

    fn post_deploy_file(&self, _site: &Site, _file: &DeployFile) -> HookResult {
        Ok(())
    }
}

/// A normalized plugin: named, ordered, with every hook callable.
#[derive(Clone)]
pub struct LoadedPlugin {
    pub name: String,
    /// Reserved. Carried on every plugin but not used for sequencing.
    pub order: i64,
    pub plugin: Arc<dyn Plugin>,
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
