//! Configuration type definitions.
//!
//! This module contains the data structures read from a site's config files.
//! These types are pure data - no I/O or complex logic.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The hosting provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "local";

// =============================================================================
// Site configuration
// =============================================================================

/// Site configuration, merged from every config file given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Public URL of the site
    #[serde(rename = "site-url")]
    pub site_url: Option<String>,
    /// Write `page.html` as `page/index.html` and link to `/page/`
    pub prettify: bool,
    /// Static file extensions that get a content hash in their file name
    pub fingerprint: Vec<String>,
    /// Build one extra copy of the pages per configured language
    pub use_translate: bool,
    pub default_language: String,
    pub other_languages: Vec<String>,
    /// Hosting provider name, resolved to a deployment engine
    pub provider: String,
    /// Glob patterns for pages and static files to leave out of the build
    pub ignore: Vec<String>,
    /// Cache lifetime in seconds for files without a fingerprint
    #[serde(rename = "cache-duration")]
    pub cache_duration: u64,
    /// Extensions of published files that also get a gzip copy
    pub compress: Vec<String>,
    /// Command line tools run over static files and pages
    pub externals: ExternalsConfig,
    pub deploy: DeployConfig,
    /// Development-specific settings (watch mode, etc.)
    pub dev: DevConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: None,
            prettify: false,
            fingerprint: Vec::new(),
            use_translate: false,
            default_language: "en".to_string(),
            other_languages: Vec::new(),
            provider: DEFAULT_PROVIDER.to_string(),
            ignore: Vec::new(),
            cache_duration: 3600,
            compress: ["html", "css", "js", "txt", "xml"].map(String::from).to_vec(),
            externals: ExternalsConfig::default(),
            deploy: DeployConfig::default(),
            dev: DevConfig::default(),
        }
    }
}

impl SiteConfig {
    /// The locales built when translation is enabled, default language first.
    pub fn locales(&self) -> Vec<String> {
        if !self.use_translate {
            return Vec::new();
        }

        let mut locales = vec![self.default_language.clone()];
        locales.extend(self.other_languages.iter().cloned());
        locales
    }
}

// =============================================================================
// External tools
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalsConfig {
    /// Run on static files of every build, may change their extension
    pub processors: Vec<ExternalConfig>,
    /// Run on static files and pages of deploy builds only
    pub optimizers: Vec<ExternalConfig>,
}

/// A command that reads a file on stdin and writes the result to stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub name: String,
    /// Extensions (without the dot) the command is run on
    pub extensions: Vec<String>,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Extension the output is published with, e.g. `css` for a Sass compiler
    pub output_extension: Option<String>,
}

// =============================================================================
// Deployment configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Where the `local` provider publishes to (relative to the project)
    pub target: Option<PathBuf>,
    /// Custom domain for the published site
    pub domain: Option<String>,
}

// =============================================================================
// Development configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// File watching configuration
    pub watch: WatchConfig,
    /// Enable live reload in the browser when files change (default: true)
    pub live_reload: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            live_reload: true,
        }
    }
}

/// Configuration for file watching during development.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Use polling-based watcher instead of native file system events.
    /// Useful for network filesystems, Docker volumes, or other situations
    /// where native events are unreliable.
    pub poll: bool,
    /// Poll interval in milliseconds (only used if poll=true).
    pub poll_interval_ms: u64,
    /// Debounce timeout in milliseconds.
    /// Changes within this window are batched together.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: 500,
            debounce_ms: 100,
        }
    }
}
