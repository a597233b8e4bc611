//! File watching for automatic rebuilds.
//!
//! Uses `notify-debouncer-full` to watch the project directory. Batches are
//! dropped while the watcher is paused, so a rebuild does not react to the
//! files it writes itself.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{
    DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache, new_debouncer,
    new_debouncer_opt,
};
use tracing::debug;

use crate::config::WatchConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

// =============================================================================
// Watch events
// =============================================================================

/// Files touched in one debounced batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<PathBuf>,
    pub changed: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.deleted.len()
    }

    fn record(&mut self, event: &DebouncedEvent, filter: &ChangeFilter) {
        let bucket = match event.kind {
            EventKind::Create(_) => &mut self.added,
            EventKind::Remove(_) => &mut self.deleted,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => &mut self.deleted,
            EventKind::Modify(ModifyKind::Name(_)) => &mut self.added,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => &mut self.changed,
            _ => return,
        };

        for path in &event.paths {
            if filter.accepts(path) && !bucket.contains(path) {
                bucket.push(path.clone());
            }
        }
    }
}

/// Events sent from the file watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// Files changed, rebuild needed.
    FilesChanged(ChangeSet),
    /// Watcher error occurred.
    Error(String),
}

// =============================================================================
// Path filtering
// =============================================================================

/// Decides which changed paths trigger a rebuild.
///
/// Anything with a hidden component below the project root (`.git`,
/// `.build`) is ignored, as is anything outside the watched subfolders.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    watched: Vec<PathBuf>,
}

impl ChangeFilter {
    pub fn new(root: impl Into<PathBuf>, watched: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watched,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn accepts(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return false;
        }

        self.watched.iter().any(|dir| path.starts_with(dir))
    }
}

// =============================================================================
// File watcher
// =============================================================================

/// A file watcher that can use either native or polling backend.
pub enum FileWatcher {
    /// Native file system watcher (recommended for local development).
    Native {
        _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
    /// Polling-based watcher (for network filesystems, Docker, etc.).
    Polling {
        _debouncer: Debouncer<PollWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
}

impl FileWatcher {
    /// Watch the filter's root recursively.
    ///
    /// While `pause` is locked elsewhere, incoming batches are dropped.
    pub fn new(
        config: &WatchConfig,
        filter: ChangeFilter,
        pause: Arc<Mutex<()>>,
    ) -> Result<Self, WatchError> {
        let debounce_timeout = Duration::from_millis(config.debounce_ms);
        let root = filter.root().to_path_buf();

        let (tx, rx) = mpsc::channel();

        let callback = move |result: DebounceEventResult| {
            deliver_unless_paused(&pause, || match result {
                Ok(events) => {
                    let mut changes = ChangeSet::default();
                    for event in &events {
                        changes.record(event, &filter);
                    }
                    if !changes.is_empty() {
                        let _ = tx.send(WatchEvent::FilesChanged(changes));
                    }
                }
                Err(errors) => {
                    for e in errors {
                        let _ = tx.send(WatchEvent::Error(e.to_string()));
                    }
                }
            });
        };

        if config.poll {
            let poll_interval = Duration::from_millis(config.poll_interval_ms);
            let notify_config = NotifyConfig::default().with_poll_interval(poll_interval);

            let mut debouncer = new_debouncer_opt::<_, PollWatcher, RecommendedCache>(
                debounce_timeout,
                None,
                callback,
                RecommendedCache::default(),
                notify_config,
            )?;
            debouncer.watch(&root, RecursiveMode::Recursive)?;

            Ok(FileWatcher::Polling {
                _debouncer: debouncer,
                rx,
            })
        } else {
            let mut debouncer = new_debouncer(debounce_timeout, None, callback)?;
            debouncer.watch(&root, RecursiveMode::Recursive)?;

            Ok(FileWatcher::Native {
                _debouncer: debouncer,
                rx,
            })
        }
    }

    /// Receive the next watch event (blocking).
    pub fn recv(&self) -> Option<WatchEvent> {
        match self {
            FileWatcher::Native { rx, .. } => rx.recv().ok(),
            FileWatcher::Polling { rx, .. } => rx.recv().ok(),
        }
    }
}

/// Run `deliver` unless `pause` is held elsewhere. Returns whether it ran.
fn deliver_unless_paused(pause: &Mutex<()>, deliver: impl FnOnce()) -> bool {
    let _gate = match pause.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            debug!("rebuild in progress, dropping file events");
            return false;
        }
    };
    deliver();
    true
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use notify::event::{CreateKind, DataChange, RemoveKind};
    use notify::Event;

    use super::*;

    fn filter() -> ChangeFilter {
        let root = PathBuf::from("/site");
        ChangeFilter::new(
            &root,
            vec![root.join("pages"), root.join("templates"), root.join("static")],
        )
    }

    fn event(kind: EventKind, path: &str) -> DebouncedEvent {
        DebouncedEvent::new(Event::new(kind).add_path(PathBuf::from(path)), Instant::now())
    }

    #[test]
    fn test_filter() {
        let filter = filter();
        assert!(filter.accepts(Path::new("/site/pages/index.html")));
        assert!(filter.accepts(Path::new("/site/static/css/site.css")));
        assert!(!filter.accepts(Path::new("/site/.build/index.html")));
        assert!(!filter.accepts(Path::new("/site/pages/.index.html.swp")));
        assert!(!filter.accepts(Path::new("/site/cactus.yaml")));
        assert!(!filter.accepts(Path::new("/elsewhere/pages/index.html")));
    }

    #[test]
    fn test_change_set_buckets() {
        let filter = filter();
        let mut changes = ChangeSet::default();

        changes.record(&event(EventKind::Create(CreateKind::File), "/site/pages/new.html"), &filter);
        changes.record(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/site/static/site.css"),
            &filter,
        );
        changes.record(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/site/static/site.css"),
            &filter,
        );
        changes.record(&event(EventKind::Remove(RemoveKind::File), "/site/pages/old.html"), &filter);
        changes.record(&event(EventKind::Create(CreateKind::File), "/site/.build/x.html"), &filter);

        assert_eq!(changes.added, vec![PathBuf::from("/site/pages/new.html")]);
        assert_eq!(changes.changed, vec![PathBuf::from("/site/static/site.css")]);
        assert_eq!(changes.deleted, vec![PathBuf::from("/site/pages/old.html")]);
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_batches_are_dropped_while_paused() {
        let pause = Mutex::new(());
        let mut delivered = Vec::new();

        {
            let _rebuilding = pause.lock().unwrap();
            assert!(!deliver_unless_paused(&pause, || delivered.push("during")));
        }
        assert!(deliver_unless_paused(&pause, || delivered.push("after")));

        assert_eq!(delivered, vec!["after"]);
    }

    #[test]
    fn test_poisoned_pause_still_delivers() {
        let pause = Arc::new(Mutex::new(()));
        let poisoner = Arc::clone(&pause);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("rebuild panicked");
        })
        .join();

        assert!(pause.is_poisoned());
        assert!(deliver_unless_paused(&pause, || {}));
    }
}
