//! Configuration loading and types for cactus.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Loading and layering config files (`load`)

mod load;
mod types;

use std::path::PathBuf;

pub use load::DEFAULT_CONFIG_FILE;
pub use types::{ExternalConfig, ExternalsConfig, SiteConfig, WatchConfig};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("cannot tell the format of config file {0} (use .yaml, .json or .toml)")]
    UnknownFormat(PathBuf),
}
