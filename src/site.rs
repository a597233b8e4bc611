//! The site: configuration, layout, plugins and the build lifecycle.
//!
//! A [`Site`] is opened once per command. Page and static file lists are
//! cached and dropped at the start of every build pass.

mod lifecycle;
mod paths;
mod serve;
mod upload;

#[cfg(test)]
pub mod test_support;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

pub use paths::SitePaths;
pub use serve::ServeOptions;
pub use upload::{NetworkProbe, Outcome, TcpProbe};

use crate::build::{BuildError, ExternalManager, Page, ParallelMode, StaticFile, UrlMap, WatchError};
use crate::config::{ConfigError, SiteConfig};
use crate::deploy::{DeployError, DeploymentEngine, engine_for_provider};
use crate::plugin::builtin::builtin_plugins;
use crate::plugin::{PageContext, PluginError, PluginManager, PluginSource};
use crate::util::{is_external, strip_url_suffix};
use crate::walk::file_list;

#[derive(thiserror::Error, Debug)]
pub enum SiteError {
    #[error("this does not look like a (complete) cactus project (missing \"{0}\" subfolder)")]
    MissingSubfolder(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("failed to build the template context: {0}")]
    Context(#[from] serde_json::Error),

    #[error("invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SiteError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the site was opened for. Exposed to templates and plugins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    #[default]
    Unknown,
    Serve,
    Build,
}

/// Where the current build pass writes and which language it renders.
#[derive(Debug, Clone)]
struct Pass {
    /// `.build` or `.deploy`
    root: PathBuf,
    /// The root, or `<root>/<locale>` during a translation pass
    output: PathBuf,
    language: String,
}

/// A pass and the page and static file lists filtered during it.
pub(crate) struct SavedPass {
    pass: Pass,
    pages: Option<Arc<Vec<Page>>>,
    static_files: Option<Arc<Vec<StaticFile>>>,
}

pub struct Site {
    paths: SitePaths,
    config: SiteConfig,
    verb: Verb,
    parallel: ParallelMode,
    live_reload: bool,
    plugins: RwLock<PluginManager>,
    externals: ExternalManager,
    engine: Box<dyn DeploymentEngine>,
    network: Box<dyn NetworkProbe>,
    pass: RwLock<Pass>,
    pages: RwLock<Option<Arc<Vec<Page>>>>,
    static_files: RwLock<Option<Arc<Vec<StaticFile>>>>,
}

/// Builder for [`Site`], allowing collaborators to be swapped out.
pub struct SiteBuilder {
    path: PathBuf,
    config_files: Vec<PathBuf>,
    config: Option<SiteConfig>,
    verb: Verb,
    parallel: ParallelMode,
    plugin_sources: Option<Vec<PluginSource>>,
    engine: Option<Box<dyn DeploymentEngine>>,
    network: Option<Box<dyn NetworkProbe>>,
}

impl SiteBuilder {
    /// Config files to layer, earliest first. Defaults to `cactus.yaml`.
    pub fn with_config_files(mut self, files: Vec<PathBuf>) -> Self {
        self.config_files = files;
        self
    }

    /// Use this configuration instead of reading config files.
    #[cfg(test)]
    pub fn with_config(mut self, config: SiteConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = verb;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelMode) -> Self {
        self.parallel = parallel;
        self
    }

    /// Replace the default plugin sources (user scripts, then builtins).
    #[cfg(test)]
    pub fn with_plugin_sources(mut self, sources: Vec<PluginSource>) -> Self {
        self.plugin_sources = Some(sources);
        self
    }

    /// Use this engine instead of the one for the configured provider.
    #[cfg(test)]
    pub fn with_deployment_engine(mut self, engine: Box<dyn DeploymentEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    #[cfg(test)]
    pub fn with_network_probe(mut self, network: Box<dyn NetworkProbe>) -> Self {
        self.network = Some(network);
        self
    }

    /// Load the config, check the project layout and resolve the
    /// deployment engine.
    pub fn build(self) -> Result<Site, SiteError> {
        let config = match self.config {
            Some(config) => config,
            None => SiteConfig::load(&SiteConfig::resolve_paths(&self.path, &self.config_files))?,
        };

        let paths = SitePaths::new(self.path);
        paths.verify(config.use_translate)?;

        let engine = match self.engine {
            Some(engine) => engine,
            None => engine_for_provider(&config.provider)?,
        };
        let network = self
            .network
            .unwrap_or_else(|| Box::new(TcpProbe::default()));

        let sources = self.plugin_sources.unwrap_or_else(|| {
            vec![
                PluginSource::directory(&paths.plugins),
                PluginSource::objects(builtin_plugins()),
            ]
        });

        let externals = ExternalManager::from_config(&config.externals);

        let pass = Pass {
            root: paths.build.clone(),
            output: paths.build.clone(),
            language: config.default_language.clone(),
        };

        Ok(Site {
            paths,
            config,
            verb: self.verb,
            parallel: self.parallel,
            live_reload: false,
            plugins: RwLock::new(PluginManager::new(sources)),
            externals,
            engine,
            network,
            pass: RwLock::new(pass),
            pages: RwLock::new(None),
            static_files: RwLock::new(None),
        })
    }
}

/// What script plugins see as `site`.
#[derive(Debug, Serialize)]
pub struct SiteSummary {
    pub path: PathBuf,
    pub build_path: PathBuf,
    pub url: Option<String>,
    pub language: String,
    pub locales: Vec<String>,
    pub verb: Verb,
    pub pages: Vec<Page>,
    #[serde(rename = "static")]
    pub static_files: Vec<StaticFile>,
}

impl Site {
    pub fn builder(path: impl Into<PathBuf>) -> SiteBuilder {
        SiteBuilder {
            path: path.into(),
            config_files: Vec::new(),
            config: None,
            verb: Verb::Unknown,
            parallel: ParallelMode::default(),
            plugin_sources: None,
            engine: None,
            network: None,
        }
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn url(&self) -> Option<&str> {
        self.config.site_url.as_deref()
    }

    /// Check that `site-url` is an absolute http(s) URL, warning if not.
    ///
    /// Builds go ahead either way; only plugins that need absolute links,
    /// like sitemaps, suffer.
    pub fn verify_url(&self) -> bool {
        match self.url() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => true,
            Some(url) => {
                warn!(url, "site-url should start with http:// or https://");
                false
            }
            None => {
                warn!("no site-url configured, absolute links cannot be generated");
                false
            }
        }
    }

    pub fn externals(&self) -> &ExternalManager {
        &self.externals
    }

    /// Whether optimizers run: only for builds into the deploy directory.
    pub fn optimizing(&self) -> bool {
        self.build_root() == self.paths.deploy
    }

    /// Whether built HTML pages get the live reload client.
    pub fn live_reload(&self) -> bool {
        self.live_reload
    }

    pub fn plugin_manager(&self) -> RwLockReadGuard<'_, PluginManager> {
        read(&self.plugins)
    }

    pub(crate) fn plugin_manager_mut(&self) -> RwLockWriteGuard<'_, PluginManager> {
        write(&self.plugins)
    }

    /// Root of the current build (`.build`, or `.deploy` while uploading).
    pub fn build_root(&self) -> PathBuf {
        read(&self.pass).root.clone()
    }

    /// Where the current build pass writes.
    pub fn output_path(&self) -> PathBuf {
        read(&self.pass).output.clone()
    }

    /// Language of the current build pass.
    pub fn language(&self) -> String {
        read(&self.pass).language.clone()
    }

    pub(crate) fn set_build_root(&self, root: PathBuf) {
        let mut pass = write(&self.pass);
        pass.output = root.clone();
        pass.root = root;
    }

    /// Start a build pass writing to `output` in `language`.
    pub(crate) fn begin_pass(&self, output: PathBuf, language: &str) {
        {
            let mut pass = write(&self.pass);
            pass.output = output;
            pass.language = language.to_string();
        }
        *write(&self.pages) = None;
        *write(&self.static_files) = None;
    }

    /// The current pass with its page and static file lists.
    pub(crate) fn save_pass(&self) -> SavedPass {
        SavedPass {
            pass: read(&self.pass).clone(),
            pages: read(&self.pages).clone(),
            static_files: read(&self.static_files).clone(),
        }
    }

    /// Go back to a pass saved earlier, lists included.
    pub(crate) fn restore_pass(&self, saved: SavedPass) {
        *write(&self.pass) = saved.pass;
        *write(&self.pages) = saved.pages;
        *write(&self.static_files) = saved.static_files;
    }

    // =========================================================================
    // Pages and static files
    // =========================================================================

    /// Every page below `pages/`, except editor backups ending in `~`.
    pub fn pages(&self) -> Result<Arc<Vec<Page>>, SiteError> {
        cached(&self.pages, || {
            let files = file_list(&self.paths.pages, true).map_err(|e| SiteError::io(&self.paths.pages, e))?;
            Ok(files
                .into_iter()
                .filter(|rel| !rel.to_string_lossy().ends_with('~'))
                .map(|rel| {
                    debug!(path = %rel.display(), "found page");
                    Page::new(self, &rel)
                })
                .collect())
        })
    }

    /// Every file below `static/`, except symlinks to missing files.
    pub fn static_files(&self) -> Result<Arc<Vec<StaticFile>>, SiteError> {
        cached(&self.static_files, || {
            let dir = &self.paths.static_dir;
            let files = file_list(dir, true).map_err(|e| SiteError::io(dir, e))?;

            let mut statics = Vec::with_capacity(files.len());
            for rel in files {
                let full = dir.join(&rel);
                if full.is_symlink() && !full.exists() {
                    warn!(path = %full.display(), "skipping symlink that points to a missing file");
                    continue;
                }
                statics.push(StaticFile::new(dir, &rel, &self.config.fingerprint, &self.externals)?);
            }
            Ok(statics)
        })
    }

    /// Keep only the pages for which `keep` returns true, for this pass.
    pub fn retain_pages(&self, keep: impl Fn(&Page) -> bool) {
        match self.pages() {
            Ok(pages) => {
                let kept = pages.iter().filter(|p| keep(p)).cloned().collect();
                *write(&self.pages) = Some(Arc::new(kept));
            }
            Err(e) => warn!(error = %e, "could not list pages"),
        }
    }

    /// Keep only the static files for which `keep` returns true, for this pass.
    pub fn retain_static_files(&self, keep: impl Fn(&StaticFile) -> bool) {
        match self.static_files() {
            Ok(files) => {
                let kept = files.iter().filter(|f| keep(f)).cloned().collect();
                *write(&self.static_files) = Some(Arc::new(kept));
            }
            Err(e) => warn!(error = %e, "could not list static files"),
        }
    }

    // =========================================================================
    // URLs
    // =========================================================================

    pub fn static_urls(&self) -> Result<UrlMap, SiteError> {
        let files = self.static_files()?;
        Ok(UrlMap::new(
            files.iter().map(|f| (f.link_url.clone(), f.final_url.clone())),
        ))
    }

    pub fn page_urls(&self) -> Result<UrlMap, SiteError> {
        let pages = self.pages()?;
        Ok(UrlMap::new(
            pages.iter().map(|p| (p.link_url.clone(), p.final_url.clone())),
        ))
    }

    /// Published URL of the static file linked as `url`.
    pub fn get_url_for_static(&self, url: &str) -> Option<String> {
        let files = self.static_files().ok()?;
        lookup_url(url, files.iter().map(|f| (&f.link_url, &f.final_url)))
    }

    /// Published URL of the page linked as `url`.
    pub fn get_url_for_page(&self, url: &str) -> Option<String> {
        let pages = self.pages().ok()?;
        lookup_url(url, pages.iter().map(|p| (&p.link_url, &p.final_url)))
    }

    /// Whether `url` is a published static file with a content hash.
    pub fn is_fingerprinted(&self, url: &str) -> bool {
        let url = strip_url_suffix(url);
        self.static_files()
            .map(|files| files.iter().any(|f| f.fingerprinted && f.final_url == url))
            .unwrap_or(false)
    }

    // =========================================================================
    // Contexts
    // =========================================================================

    /// Template context shared by every page of the current pass.
    pub fn context(&self) -> Result<PageContext, SiteError> {
        let pages = self.pages()?;
        let html_pages: Vec<&Page> = pages.iter().filter(|p| p.is_html()).collect();
        let statics = self.static_files()?;

        let mut cactus = serde_json::Map::new();
        cactus.insert("pages".to_string(), serde_json::to_value(&html_pages)?);
        cactus.insert("static".to_string(), serde_json::to_value(&*statics)?);
        let cactus = Value::Object(cactus);

        let mut site = serde_json::Map::new();
        site.insert("url".to_string(), serde_json::to_value(self.url())?);
        site.insert("language".to_string(), Value::String(self.language()));
        site.insert("verb".to_string(), serde_json::to_value(self.verb)?);

        let mut context = PageContext::new();
        context.insert("CACTUS".to_string(), cactus.clone());
        context.insert("cactus".to_string(), cactus);
        context.insert("site".to_string(), Value::Object(site));
        Ok(context)
    }

    pub fn summary(&self) -> SiteSummary {
        SiteSummary {
            path: self.paths.root.clone(),
            build_path: self.output_path(),
            url: self.config.site_url.clone(),
            language: self.language(),
            locales: self.config.locales(),
            verb: self.verb,
            pages: self.pages().map(|p| p.to_vec()).unwrap_or_default(),
            static_files: self.static_files().map(|s| s.to_vec()).unwrap_or_default(),
        }
    }
}

/// External URLs pass through; others are matched on their link URL,
/// ignoring any `#fragment` or `?query`.
fn lookup_url<'a>(url: &str, mut entries: impl Iterator<Item = (&'a String, &'a String)>) -> Option<String> {
    if is_external(url) {
        return Some(url.to_string());
    }
    let url = strip_url_suffix(url);
    entries
        .find(|(link_url, _)| link_url.as_str() == url)
        .map(|(_, final_url)| final_url.clone())
}

// =============================================================================
// Lock helpers
// =============================================================================

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Return the cached value, loading it first if the slot is empty.
fn cached<T>(
    slot: &RwLock<Option<Arc<T>>>,
    load: impl FnOnce() -> Result<T, SiteError>,
) -> Result<Arc<T>, SiteError> {
    if let Some(value) = read(slot).as_ref() {
        return Ok(Arc::clone(value));
    }

    let value = Arc::new(load()?);
    *write(slot) = Some(Arc::clone(&value));
    Ok(value)
}
