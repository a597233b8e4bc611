//! Pages: everything below `pages/`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::markdown::{parse_front_matter, render_markdown};
use super::render::Renderer;
use super::{BuildError, LIVE_RELOAD_PATH};
use crate::plugin::PageContext;
use crate::site::Site;
use crate::util::extension;

/// How a page's source becomes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Rendered as a Tera template (`.html`, `.htm`, `.xml`, `.txt`)
    Template,
    /// Rendered as a Tera template, then as Markdown, written as `.html`
    Markdown,
    /// Copied verbatim
    Raw,
}

impl PageKind {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("html" | "htm" | "xml" | "txt") => Self::Template,
            Some("md" | "markdown") => Self::Markdown,
            _ => Self::Raw,
        }
    }
}

/// A single page of the site.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Path relative to `pages/`
    pub path: PathBuf,
    /// URL the page is referred to by: `/` + its source path
    pub link_url: String,
    /// URL the page is published at
    pub final_url: String,
    pub kind: PageKind,
    #[serde(skip)]
    source: PathBuf,
    /// Output path relative to the build output
    #[serde(skip)]
    output: PathBuf,
}

impl Page {
    /// The page at `rel` below the site's `pages/` directory.
    pub fn new(site: &Site, rel: &Path) -> Self {
        Self::at(&site.paths().pages, rel, site.config().prettify)
    }

    pub fn at(pages_dir: &Path, rel: &Path, prettify: bool) -> Self {
        let kind = PageKind::for_path(rel);
        let location = locate(rel, kind, prettify);

        Self {
            path: rel.to_path_buf(),
            link_url: location.link_url,
            final_url: location.final_url,
            kind,
            source: pages_dir.join(rel),
            output: location.output,
        }
    }

    /// Whether the page is published as HTML.
    pub fn is_html(&self) -> bool {
        self.output
            .extension()
            .is_some_and(|e| e == "html" || e == "htm")
    }

    /// Render the page and write it below the site's current output path.
    ///
    /// `base` is the site-wide template context; `pre_build_page` hooks
    /// extend a copy of it for this page.
    pub fn build(&self, site: &Site, renderer: &Renderer, base: &PageContext) -> Result<(), BuildError> {
        let mut context = base.clone();
        site.plugin_manager()
            .pre_build_page(site, self, &mut context)?;

        let mut bytes = match self.kind {
            PageKind::Raw => std::fs::read(&self.source).map_err(|e| BuildError::io(&self.source, e))?,
            PageKind::Template => self.render(renderer, None, &context)?.into_bytes(),
            PageKind::Markdown => self.render_markdown(site, renderer, context)?.into_bytes(),
        };

        if site.optimizing() {
            bytes = site
                .externals()
                .optimize(&extension(&self.output), bytes)
                .map_err(|e| BuildError::external(&self.source, e))?;
        }

        if site.live_reload() && self.is_html() {
            bytes = inject_live_reload(&String::from_utf8_lossy(&bytes)).into_bytes();
        }

        let target = site.output_path().join(&self.output);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        std::fs::write(&target, bytes).map_err(|e| BuildError::io(&target, e))?;

        site.plugin_manager().post_build_page(site, self)?;
        Ok(())
    }

    /// Render the page itself, or the layout `template` around it.
    fn render(&self, renderer: &Renderer, template: Option<&str>, context: &PageContext) -> Result<String, BuildError> {
        let rendered = match template {
            Some(name) => renderer.render(name, context),
            None => renderer.render_page(&self.path, context),
        };
        rendered.map_err(|source| BuildError::Page {
                page: self.path.clone(),
                source,
            })
    }

    /// Expand template syntax, convert to HTML and wrap in the front
    /// matter's layout, if it names one.
    fn render_markdown(&self, site: &Site, renderer: &Renderer, mut context: PageContext) -> Result<String, BuildError> {
        let expanded = self.render(renderer, None, &context)?;
        let parsed = parse_front_matter(&expanded);
        let html = render_markdown(&parsed.content, |url| {
            site.get_url_for_page(url).or_else(|| site.get_url_for_static(url))
        });

        let Some(layout) = parsed.front_matter.template.clone() else {
            return Ok(html);
        };

        let mut meta = PageContext::new();
        meta.extend(parsed.front_matter.extra);
        if let Some(title) = parsed.front_matter.title {
            meta.insert("title".to_string(), Value::String(title));
        }
        context.insert("meta".to_string(), Value::Object(meta));
        context.insert("content".to_string(), Value::String(html));

        self.render(renderer, Some(&layout), &context)
    }
}

struct Location {
    link_url: String,
    final_url: String,
    output: PathBuf,
}

/// Work out where a page is published.
///
/// Markdown pages are written as `.html`. With `prettify`, `about.html` is
/// written to `about/index.html` and linked as `/about/`, and any
/// `index.html` is linked by its directory.
fn locate(rel: &Path, kind: PageKind, prettify: bool) -> Location {
    let link_url = url_for(rel);
    let output = match kind {
        PageKind::Markdown => rel.with_extension("html"),
        _ => rel.to_path_buf(),
    };

    let is_html = output.extension().is_some_and(|e| e == "html");
    if !prettify || !is_html {
        return Location {
            link_url,
            final_url: url_for(&output),
            output,
        };
    }

    if output.file_name().is_some_and(|n| n == "index.html") {
        let dir = output.parent().unwrap_or(Path::new(""));
        return Location {
            link_url,
            final_url: dir_url(dir),
            output,
        };
    }

    let dir = output.with_extension("");
    Location {
        link_url,
        final_url: dir_url(&dir),
        output: dir.join("index.html"),
    }
}

fn url_for(rel: &Path) -> String {
    format!("/{}", rel.to_string_lossy().replace('\\', "/"))
}

fn dir_url(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        "/".to_string()
    } else {
        format!("{}/", url_for(dir))
    }
}

/// Append the live reload client to an HTML document.
fn inject_live_reload(html: &str) -> String {
    let script = format!(
        r#"<script>(function () {{
  var source = new EventSource("{LIVE_RELOAD_PATH}");
  source.addEventListener("reload", function () {{ window.location.reload(); }});
  source.addEventListener("reload-css", function () {{
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {{
      var url = new URL(link.href);
      url.searchParams.set("_cactus", Date.now());
      link.href = url.toString();
    }});
  }});
}})();</script>"#
    );

    match html.rfind("</body>") {
        Some(at) => format!("{}{script}\n{}", &html[..at], &html[at..]),
        None => format!("{html}\n{script}"),
    }
}
