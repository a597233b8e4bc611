//! One module per subcommand.

pub mod build;
pub mod clean;
pub mod deploy;
pub mod domain;
pub mod init;
pub mod serve;

use std::path::{Path, PathBuf};

use crate::ProjectArgs;
use crate::site::{Site, SiteBuilder, Verb};

/// Absolute form of a path given on the command line.
fn absolute(path: &Path) -> Result<PathBuf, anyhow::Error> {
    Ok(if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    })
}

/// Builder for the project named by the common `--path` and `--config` options.
fn site_builder(project: &ProjectArgs, verb: Verb) -> Result<SiteBuilder, anyhow::Error> {
    let path = absolute(&project.path)?;
    Ok(Site::builder(path)
        .with_config_files(project.config.clone())
        .with_verb(verb))
}

fn open_site(project: &ProjectArgs, verb: Verb) -> Result<Site, anyhow::Error> {
    Ok(site_builder(project, verb)?.build()?)
}
