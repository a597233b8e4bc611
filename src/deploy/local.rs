//! Publishing to a directory on this machine.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};

use super::{DeployError, DeployFile, DeployRecord, DeploymentEngine};
use crate::site::Site;
use crate::util::extension;
use crate::walk::file_list;

pub(super) const PROVIDER: &str = "local";

/// Written next to the published files with one block per file.
const HEADERS_FILE: &str = "_headers";
const CNAME_FILE: &str = "CNAME";

/// Mirrors the deploy build into `deploy.target` (default `public/`).
///
/// Only files whose bytes differ are rewritten. Files whose extension is
/// listed in `compress` also get a gzip copy with a `.gz` suffix. Files no
/// longer in the build are removed, and so are directories left empty.
/// Cache policies set by deploy hooks are written to a `_headers` file.
pub struct LocalEngine;

impl LocalEngine {
    pub fn target(site: &Site) -> PathBuf {
        match &site.config().deploy.target {
            Some(target) if target.is_absolute() => target.clone(),
            Some(target) => site.paths().root.join(target),
            None => site.paths().root.join("public"),
        }
    }
}

impl DeploymentEngine for LocalEngine {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn deploy(&self, site: &Site) -> Result<Vec<DeployRecord>, DeployError> {
        let source = site.output_path();
        let target = Self::target(site);
        info!(target = %target.display(), "publishing");

        let files = file_list(&source, true).map_err(|e| DeployError::io(&source, e))?;
        let compress = &site.config().compress;
        let plugins = site.plugin_manager();
        let mut records = Vec::with_capacity(files.len());
        let mut published = HashSet::with_capacity(files.len());
        let mut headers = String::new();

        for rel in &files {
            let from = source.join(rel);
            let to = target.join(rel);

            let bytes = std::fs::read(&from).map_err(|e| DeployError::io(&from, e))?;
            let changed = std::fs::read(&to).map_or(true, |published| published != bytes);

            let mut file = DeployFile::new(&url_for(rel), from.clone(), bytes.len() as u64);
            file.changed = changed;
            file.compress = compress.iter().any(|e| e.eq_ignore_ascii_case(&extension(rel)));
            plugins.pre_deploy_file(site, &mut file)?;

            if changed {
                debug!(path = %rel.display(), "uploading");
                if let Some(parent) = to.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
                }
                std::fs::write(&to, &bytes).map_err(|e| DeployError::io(&to, e))?;
            }
            published.insert(rel.clone());

            if file.compress {
                let gz_rel = gz_path(rel);
                let gz = target.join(&gz_rel);
                if changed || !gz.exists() {
                    let compressed = gzip(&bytes).map_err(|e| DeployError::io(&gz, e))?;
                    std::fs::write(&gz, compressed).map_err(|e| DeployError::io(&gz, e))?;
                }
                published.insert(gz_rel);
            }

            plugins.post_deploy_file(site, &file)?;

            if let Some(cache_control) = &file.cache_control {
                headers.push_str(&format!("{}\n  Cache-Control: {cache_control}\n", file.url));
            }
            records.push(DeployRecord {
                path: rel.clone(),
                size: file.size,
                changed,
            });
        }

        remove_stale(&target, &published)?;

        let headers_path = target.join(HEADERS_FILE);
        std::fs::create_dir_all(&target).map_err(|e| DeployError::io(&target, e))?;
        std::fs::write(&headers_path, headers).map_err(|e| DeployError::io(&headers_path, e))?;

        Ok(records)
    }

    fn domain_setup(&self, site: &Site) -> Result<(), DeployError> {
        let domain = site
            .config()
            .deploy
            .domain
            .clone()
            .ok_or(DeployError::MissingDomain)?;

        let target = Self::target(site);
        std::fs::create_dir_all(&target).map_err(|e| DeployError::io(&target, e))?;
        let cname = target.join(CNAME_FILE);
        std::fs::write(&cname, format!("{domain}\n")).map_err(|e| DeployError::io(&cname, e))?;
        info!(%domain, "domain configured");
        Ok(())
    }

    fn domain_list(&self, site: &Site) -> Result<Vec<String>, DeployError> {
        let cname = Self::target(site).join(CNAME_FILE);
        if !cname.exists() {
            return Ok(Vec::new());
        }

        let text = std::fs::read_to_string(&cname).map_err(|e| DeployError::io(&cname, e))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Delete files below `target` that were not `published` by this deploy,
/// then any directories left empty.
fn remove_stale(target: &Path, published: &HashSet<PathBuf>) -> Result<(), DeployError> {
    if !target.is_dir() {
        return Ok(());
    }

    let existing = file_list(target, true).map_err(|e| DeployError::io(target, e))?;
    for rel in existing {
        let reserved = rel == Path::new(HEADERS_FILE) || rel == Path::new(CNAME_FILE);
        if reserved || published.contains(&rel) {
            continue;
        }
        let path = target.join(&rel);
        debug!(path = %rel.display(), "removing");
        std::fs::remove_file(&path).map_err(|e| DeployError::io(&path, e))?;
    }

    prune_empty_dirs(target)?;
    Ok(())
}

/// Remove the empty directories below `dir`. Returns whether `dir` itself
/// ended up empty.
fn prune_empty_dirs(dir: &Path) -> Result<bool, DeployError> {
    let mut empty = true;
    for entry in std::fs::read_dir(dir).map_err(|e| DeployError::io(dir, e))? {
        let entry = entry.map_err(|e| DeployError::io(dir, e))?;
        let path = entry.path();
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir && prune_empty_dirs(&path)? {
            debug!(path = %path.display(), "removing empty directory");
            std::fs::remove_dir(&path).map_err(|e| DeployError::io(&path, e))?;
        } else {
            empty = false;
        }
    }
    Ok(empty)
}

/// "css/site.css" -> "css/site.css.gz"
fn gz_path(rel: &Path) -> PathBuf {
    let mut name = rel.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn url_for(rel: &Path) -> String {
    format!("/{}", rel.to_string_lossy().replace('\\', "/"))
}
