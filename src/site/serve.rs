//! Development server with rebuild on change and live reload.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use super::{Site, SiteError, SitePaths, Verb};
use crate::build::{ChangeFilter, ChangeSet, FileWatcher, LIVE_RELOAD_PATH, ParallelMode, WatchEvent};

/// Extensions whose changes can be applied without reloading the page.
const STYLESHEET_EXTENSIONS: &[&str] = &["css", "sass", "scss", "styl"];

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: String,
    pub port: u16,
    /// Open the site in the default browser once the server is up
    pub open: bool,
}

/// What connected browsers are told to do after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    Page,
    /// Only stylesheets changed; swap them in place.
    Css,
}

impl ReloadKind {
    /// A CSS-only reload when no file was added or removed and every
    /// changed file is a stylesheet.
    pub fn for_changes(changes: &ChangeSet) -> Self {
        let only_styles = changes.changed.iter().all(|path| is_stylesheet(path));
        if changes.added.is_empty() && changes.deleted.is_empty() && only_styles {
            Self::Css
        } else {
            Self::Page
        }
    }

    /// Name of the server-sent event.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Page => "reload",
            Self::Css => "reload-css",
        }
    }
}

fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| STYLESHEET_EXTENSIONS.contains(&e))
}

/// SSE handler for live reload notifications.
async fn live_reload_handler(
    State(tx): State<broadcast::Sender<ReloadKind>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = tx.subscribe();
    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(kind) => {
                    yield Ok(Event::default().event(kind.event_name()).data(kind.event_name()));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

impl Site {
    /// Which changed paths should trigger a rebuild.
    pub fn change_filter(&self) -> ChangeFilter {
        // Watcher events carry canonical paths.
        let root = self
            .paths
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.paths.root.clone());
        let paths = SitePaths::new(&root);
        ChangeFilter::new(root, paths.sources())
    }

    /// Rebuild after `changes`. Build errors are logged, not returned, so
    /// the server keeps running with the previous output.
    pub fn rebuild(&self, changes: &ChangeSet) -> ReloadKind {
        info!(changed = changes.len(), path = %self.paths.root.display(), "rebuilding");
        if let Err(e) = self.build() {
            error!(error = %e, "error while building");
        }
        ReloadKind::for_changes(changes)
    }

    /// Build, then serve the build directory until Ctrl-C, rebuilding
    /// whenever a source file changes.
    pub async fn serve(mut self, options: ServeOptions) -> Result<(), SiteError> {
        self.verb = Verb::Serve;
        self.parallel = ParallelMode::Disabled;
        self.live_reload = self.config.dev.live_reload;

        self.clean()?;
        if let Err(e) = self.build() {
            error!(error = %e, "error while building");
        }

        let site = Arc::new(self);
        let (reload_tx, _) = broadcast::channel::<ReloadKind>(16);

        // Held for the length of a rebuild; the watcher drops batches meanwhile.
        let pause = Arc::new(Mutex::new(()));
        let watcher = FileWatcher::new(&site.config.dev.watch, site.change_filter(), Arc::clone(&pause))?;

        let rebuild_site = Arc::clone(&site);
        let rebuild_tx = reload_tx.clone();
        std::thread::Builder::new()
            .name("cactus-rebuild".to_string())
            .spawn(move || {
                while let Some(event) = watcher.recv() {
                    match event {
                        WatchEvent::FilesChanged(changes) => {
                            let kind = {
                                let _paused = pause.lock().unwrap_or_else(PoisonError::into_inner);
                                rebuild_site.rebuild(&changes)
                            };
                            let _ = rebuild_tx.send(kind);
                        }
                        WatchEvent::Error(e) => warn!(error = %e, "watch error"),
                    }
                }
            })
            .map_err(|e| SiteError::io(&site.paths.root, e))?;

        let build_root = site.build_root();
        let serve_dir = ServeDir::new(&build_root).append_index_html_on_directories(true);
        let app = Router::new()
            .route(LIVE_RELOAD_PATH, get(live_reload_handler))
            .with_state(reload_tx)
            .fallback_service(serve_dir);

        let addr: SocketAddr = format!("{}:{}", options.bind, options.port).parse()?;
        let display_host = if options.bind == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &options.bind
        };
        let url = format!("http://{}:{}", display_host, options.port);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| SiteError::io(&build_root, e))?;

        info!(%url, path = %build_root.display(), "running webserver");
        info!("type control-c to exit");

        if options.open
            && let Err(e) = open::that(&url)
        {
            warn!(error = %e, "failed to open browser");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| SiteError::io(&build_root, e))?;

        info!("Bye");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }
}
