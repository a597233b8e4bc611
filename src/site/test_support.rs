//! Throw-away projects for tests.

use std::path::Path;

use tempfile::TempDir;

use super::{NetworkProbe, Site, SiteBuilder};

/// A project in a temporary directory, removed on drop.
pub struct Project {
    dir: TempDir,
}

/// Create an empty project with the required subfolders.
pub fn scaffold() -> Project {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["pages", "static", "templates", "plugins"] {
        std::fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    Project { dir }
}

impl Project {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// A builder for this project that never touches the network.
    pub fn builder(&self) -> SiteBuilder {
        Site::builder(self.path()).with_network_probe(Box::new(StaticProbe(true)))
    }

    pub fn site(&self) -> Site {
        self.builder().build().unwrap()
    }
}

/// A probe with a fixed answer.
pub struct StaticProbe(pub bool);

impl NetworkProbe for StaticProbe {
    fn is_online(&self) -> bool {
        self.0
    }
}
