//! Building pages and static files.

mod external;
mod markdown;
mod page;
mod parallel;
mod render;
mod static_file;
mod urls;
mod watch;

use std::path::{Path, PathBuf};

pub use external::{ExternalError, ExternalManager};
pub use page::Page;
pub use parallel::{ParallelMode, try_for_each};
pub use render::{RenderError, Renderer, SiteUrls, Translations};
pub use static_file::StaticFile;
pub use urls::UrlMap;
pub use watch::{ChangeFilter, ChangeSet, FileWatcher, WatchError, WatchEvent};

use crate::plugin::PluginError;

/// Server-sent events endpoint the live reload client listens on.
pub const LIVE_RELOAD_PATH: &str = "/_cactus/live-reload";

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] RenderError),

    #[error("failed to render {page}: {source}")]
    Page {
        page: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("failed to run an external on {path}: {source}")]
    External {
        path: PathBuf,
        #[source]
        source: ExternalError,
    },
}

impl BuildError {
    pub(crate) fn external(path: &Path, source: ExternalError) -> Self {
        Self::External {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
