//! Static assets.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{BuildError, ExternalManager};
use crate::util::extension;

/// Hex digits of the content hash put into fingerprinted file names.
const FINGERPRINT_LEN: usize = 12;

/// A file below `static/`, copied into `<output>/static/`.
#[derive(Debug, Clone, Serialize)]
pub struct StaticFile {
    /// Path relative to `static/`
    pub path: PathBuf,
    /// URL the file is referred to by in templates
    pub link_url: String,
    /// URL the file is published at
    pub final_url: String,
    /// Whether `final_url` carries a content hash
    pub fingerprinted: bool,
    #[serde(skip)]
    source: PathBuf,
    /// Output path relative to the build output
    #[serde(skip)]
    output: PathBuf,
}

impl StaticFile {
    /// Describe the static file at `static_dir/rel`.
    ///
    /// Files a processor turns into another format are published with the
    /// processor's extension. Files whose published extension is listed in
    /// `fingerprint` get a hash of their source in their name.
    pub fn new(
        static_dir: &Path,
        rel: &Path,
        fingerprint: &[String],
        externals: &ExternalManager,
    ) -> Result<Self, BuildError> {
        let source = static_dir.join(rel);

        let processed = match externals.processed_extension(&extension(rel)) {
            Some(ext) => rel.with_extension(ext),
            None => rel.to_path_buf(),
        };

        let published_ext = extension(&processed);
        let fingerprinted = fingerprint.iter().any(|f| f.eq_ignore_ascii_case(&published_ext));

        let published = if fingerprinted {
            let bytes = std::fs::read(&source).map_err(|e| BuildError::io(&source, e))?;
            fingerprint_path(&processed, &content_hash(&bytes))
        } else {
            processed
        };

        let output = Path::new("static").join(&published);

        Ok(Self {
            path: rel.to_path_buf(),
            link_url: url_for(&Path::new("static").join(rel)),
            final_url: url_for(&output),
            fingerprinted,
            source,
            output,
        })
    }

    /// Write the file into `output_dir`, through its processors and, when
    /// `optimize` is set, its optimizers. Untouched files are copied.
    pub fn build(&self, output_dir: &Path, externals: &ExternalManager, optimize: bool) -> Result<(), BuildError> {
        let target = output_dir.join(&self.output);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }

        let source_ext = extension(&self.path);
        let output_ext = extension(&self.output);
        let process = externals.processes(&source_ext);
        let optimize = optimize && externals.optimizes(&output_ext);
        if !process && !optimize {
            std::fs::copy(&self.source, &target).map_err(|e| BuildError::io(&self.source, e))?;
            return Ok(());
        }

        let mut bytes = std::fs::read(&self.source).map_err(|e| BuildError::io(&self.source, e))?;
        if process {
            bytes = externals
                .process(&source_ext, bytes)
                .map_err(|e| BuildError::external(&self.source, e))?;
        }
        if optimize {
            bytes = externals
                .optimize(&output_ext, bytes)
                .map_err(|e| BuildError::external(&self.source, e))?;
        }
        std::fs::write(&target, bytes).map_err(|e| BuildError::io(&target, e))?;
        Ok(())
    }
}

fn url_for(rel: &Path) -> String {
    format!("/{}", rel.to_string_lossy().replace('\\', "/"))
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

/// "css/site.css" + "abc" -> "css/site.abc.css"
fn fingerprint_path(rel: &Path, hash: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match rel.extension() {
        Some(ext) => format!("{stem}.{hash}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{hash}"),
    };
    rel.with_file_name(name)
}
