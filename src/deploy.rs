//! Publishing a built site.
//!
//! A [`DeploymentEngine`] takes the deploy build of a [`Site`] and publishes
//! it somewhere. Engines are picked by the configured `provider` name.

mod local;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use local::LocalEngine;

use crate::plugin::PluginError;
use crate::site::Site;
use crate::util::file_size;

#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    #[error("could not load a deployment engine for provider '{0}'")]
    UnknownProvider(String),

    #[error("no domain configured (set deploy.domain)")]
    MissingDomain,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl DeployError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Publishes the files of a deploy build.
pub trait DeploymentEngine: Send + Sync {
    /// The provider name this engine serves.
    fn provider(&self) -> &'static str;

    /// Publish every file below the site's current output path.
    ///
    /// Engines run the `pre_deploy_file` and `post_deploy_file` hooks
    /// around each file.
    fn deploy(&self, site: &Site) -> Result<Vec<DeployRecord>, DeployError>;

    /// Point the configured domain at the published site.
    fn domain_setup(&self, site: &Site) -> Result<(), DeployError>;

    /// Domains currently pointing at the published site.
    fn domain_list(&self, site: &Site) -> Result<Vec<String>, DeployError>;
}

/// Resolve the engine for a provider name.
pub fn engine_for_provider(provider: &str) -> Result<Box<dyn DeploymentEngine>, DeployError> {
    match provider {
        local::PROVIDER => Ok(Box::new(LocalEngine)),
        other => Err(DeployError::UnknownProvider(other.to_string())),
    }
}

/// Outcome of publishing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployRecord {
    /// Path relative to the deploy build
    pub path: PathBuf,
    pub size: u64,
    /// Whether the published copy differed and was replaced
    pub changed: bool,
}

/// A file about to be published, as seen by deploy hooks.
#[derive(Debug, Clone, Serialize)]
pub struct DeployFile {
    /// URL the file is published at
    pub url: String,
    /// The built file
    pub path: PathBuf,
    pub size: u64,
    pub changed: bool,
    /// `Cache-Control` value to publish the file with
    pub cache_control: Option<String>,
    /// Whether a gzip copy is published next to the file
    pub compress: bool,
}

impl DeployFile {
    pub fn new(url: &str, path: PathBuf, size: u64) -> Self {
        Self {
            url: url.to_string(),
            path,
            size,
            changed: true,
            cache_control: None,
            compress: false,
        }
    }
}

/// Totals reported after an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub changed_files: usize,
    pub changed_size: u64,
}

impl UploadSummary {
    pub fn from_records(records: &[DeployRecord]) -> Self {
        records.iter().fold(Self::default(), |mut summary, record| {
            summary.total_files += 1;
            summary.total_size += record.size;
            if record.changed {
                summary.changed_files += 1;
                summary.changed_size += record.size;
            }
            summary
        })
    }
}

impl fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} total files with a size of {}",
            self.total_files,
            file_size(self.total_size)
        )?;
        write!(
            f,
            "{} changed files with a size of {}",
            self.changed_files,
            file_size(self.changed_size)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_for_provider() {
        assert_eq!(engine_for_provider("local").unwrap().provider(), "local");
        assert!(matches!(
            engine_for_provider("aws"),
            Err(DeployError::UnknownProvider(p)) if p == "aws"
        ));
    }

    #[test]
    fn test_upload_summary() {
        let records = vec![
            DeployRecord {
                path: "index.html".into(),
                size: 1024,
                changed: true,
            },
            DeployRecord {
                path: "static/site.css".into(),
                size: 2048,
                changed: false,
            },
        ];

        let summary = UploadSummary::from_records(&records);

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.changed_files, 1);
        assert_eq!(
            summary.to_string(),
            "2 total files with a size of 3.0KB\n1 changed files with a size of 1.0KB"
        );
    }
}
