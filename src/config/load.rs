//! Configuration loading from files.
//!
//! A site may be configured by several files. They are layered with the
//! `config` crate so that a key set in an earlier file wins over the same key
//! in a later one. Missing files are skipped.

use std::path::{Path, PathBuf};

use config::{Config as Layered, File};

use super::{ConfigError, SiteConfig};

/// The config file looked up in the project when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "cactus.yaml";

impl SiteConfig {
    /// Resolve command line config paths against the project directory,
    /// defaulting to `cactus.yaml`.
    pub fn resolve_paths(project: &Path, config_files: &[PathBuf]) -> Vec<PathBuf> {
        if config_files.is_empty() {
            return vec![project.join(DEFAULT_CONFIG_FILE)];
        }

        config_files
            .iter()
            .map(|file| {
                if file.is_relative() {
                    project.join(file)
                } else {
                    file.clone()
                }
            })
            .collect()
    }

    /// Load and merge the given config files.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut builder = Layered::builder();

        // Later sources override earlier ones, so add them back to front.
        for path in paths.iter().rev() {
            if path.extension().is_none() {
                return Err(ConfigError::UnknownFormat(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}
