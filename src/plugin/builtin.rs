//! Plugins compiled into cactus.

mod cache;
mod compat;
mod context;
mod ignore;

pub use cache::CacheDurationPlugin;
pub use compat::PageContextCompatibilityPlugin;
pub use context::ContextPlugin;
pub use ignore::IgnorePatternsPlugin;

use std::sync::Arc;

use super::Plugin;

/// The built-in plugins, in the order they run.
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(ContextPlugin),
        Arc::new(CacheDurationPlugin),
        Arc::new(IgnorePatternsPlugin),
        Arc::new(PageContextCompatibilityPlugin),
    ]
}
