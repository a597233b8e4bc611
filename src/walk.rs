//! Recursive directory listing.
//!
//! A single top-down walker used for plugin discovery, page and static
//! discovery, and deployment. Every directory is reported as a
//! [`WalkEntry`] holding its path relative to the walk root, the names of
//! its subdirectories and the names of its files.
//!
//! Order is deterministic: directories are visited pre-order, and names
//! inside a directory are sorted bytewise. Callers may rely on this order.

use std::path::{Path, PathBuf};

/// One directory visited by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the walk root (empty for the root itself).
    pub dir: PathBuf,
    /// Names of subdirectories, sorted.
    pub subdirs: Vec<String>,
    /// Names of files, sorted.
    pub files: Vec<String>,
}

/// Lazy iterator over a directory tree. See [`walk`].
pub struct Walk {
    root: PathBuf,
    pending: Vec<PathBuf>,
}

/// Walk `root` top-down.
///
/// A missing root yields nothing. Symlinks to directories are listed in
/// `subdirs` but never descended into.
pub fn walk(root: impl Into<PathBuf>) -> Walk {
    let root = root.into();
    let pending = if root.is_dir() {
        vec![PathBuf::new()]
    } else {
        Vec::new()
    };
    Walk { root, pending }
}

impl Iterator for Walk {
    type Item = std::io::Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let dir = self.pending.pop()?;
        let entry = match read_entry(&self.root, &dir) {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };

        // Push in reverse so the first subdirectory is visited next.
        for (name, descend) in entry.1.iter().rev() {
            if *descend {
                self.pending.push(dir.join(name));
            }
        }

        Some(Ok(WalkEntry {
            dir,
            subdirs: entry.1.into_iter().map(|(name, _)| name).collect(),
            files: entry.0,
        }))
    }
}

/// Read one directory, returning (files, [(subdir, descend)]).
fn read_entry(root: &Path, dir: &Path) -> std::io::Result<(Vec<String>, Vec<(String, bool)>)> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in std::fs::read_dir(root.join(dir))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            subdirs.push((name, true));
        } else if file_type.is_symlink() && entry.path().is_dir() {
            subdirs.push((name, false));
        } else {
            files.push(name);
        }
    }

    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}

/// List every file below `root` in walk order.
///
/// With `relative` the paths are relative to `root`, otherwise they are
/// joined onto it.
pub fn file_list(root: &Path, relative: bool) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walk(root) {
        let entry = entry?;
        for file in &entry.files {
            let rel = entry.dir.join(file);
            out.push(if relative { rel } else { root.join(rel) });
        }
    }
    Ok(out)
}
