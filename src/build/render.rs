//! Template rendering with Tera.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::{Context, Tera, Value};
use tracing::{debug, warn};

use super::page::{Page, PageKind};
use super::urls::UrlMap;
use crate::plugin::PageContext;
use crate::walk::file_list;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read translations {path}: {source}")]
    Translations {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Extensions of files in `templates/` that are parsed as templates.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["html", "htm", "xml", "txt", "md", "markdown"];

/// Prefix of the names pages are rendered under.
const PAGE_PREFIX: &str = "__page__/";

/// The template renderer, wrapping Tera.
///
/// Every renderable page is compiled from its own source under a reserved
/// name, so a template can never stand in for a page. For `extends` and
/// `include`, files in `templates/` are found first, then pages by their
/// path relative to `pages/`.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new(
        templates_dir: &Path,
        pages_dir: &Path,
        pages: &[Page],
        urls: SiteUrls,
        translations: Translations,
    ) -> Result<Self, RenderError> {
        let mut sources: HashMap<String, String> = read_templates(templates_dir)?.into_iter().collect();

        for page in pages.iter().filter(|p| p.kind != PageKind::Raw) {
            let path = pages_dir.join(&page.path);
            let content = std::fs::read_to_string(&path)
                .map_err(|source| RenderError::Read { path, source })?;
            let name = template_name(&page.path);
            sources.insert(page_template(&page.path), content.clone());
            sources.entry(name).or_insert(content);
        }
        debug!(count = sources.len(), "loading templates");

        let mut tera = Tera::default();
        // Output is written verbatim; templates opt in with `| escape`.
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(sources)?;
        register_functions(&mut tera, urls, translations);

        Ok(Self { tera })
    }

    /// Render the page at `rel` (relative to `pages/`) from its own source.
    pub fn render_page(&self, rel: &Path, context: &PageContext) -> Result<String, RenderError> {
        self.render(&page_template(rel), context)
    }

    /// Render the template `name` with the given context.
    pub fn render(&self, name: &str, context: &PageContext) -> Result<String, RenderError> {
        let context = Context::from_serialize(context)?;
        Ok(self.tera.render(name, &context)?)
    }
}

fn page_template(rel: &Path) -> String {
    format!("{PAGE_PREFIX}{}", template_name(rel))
}

/// Read every template file below `dir` as (name, content).
fn read_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    let files = file_list(dir, true).map_err(|source| RenderError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut templates = Vec::new();
    for rel in files {
        if !is_template(&rel) {
            continue;
        }
        let path = dir.join(&rel);
        let content = std::fs::read_to_string(&path)
            .map_err(|source| RenderError::Read { path, source })?;
        templates.push((template_name(&rel), content));
    }
    Ok(templates)
}

/// Whether the file at `path` is parsed as a template.
fn is_template(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Template name for a relative path: forward slashes on every platform.
fn template_name(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

// =============================================================================
// Template functions
// =============================================================================

/// URL lookups available to templates as `static()` and `url()`.
#[derive(Debug, Clone, Default)]
pub struct SiteUrls {
    pub static_files: UrlMap,
    pub pages: UrlMap,
}

fn register_functions(tera: &mut Tera, urls: SiteUrls, translations: Translations) {
    let statics = urls.static_files;
    tera.register_function("static", move |args: &HashMap<String, Value>| {
        let path = path_arg("static", args)?;
        let url = if path.starts_with('/') {
            path.clone()
        } else {
            format!("/static/{path}")
        };
        Ok(Value::String(resolve_or_warn(&statics, &url, &path)))
    });

    let pages = urls.pages;
    tera.register_function("url", move |args: &HashMap<String, Value>| {
        let path = path_arg("url", args)?;
        let url = if path.starts_with('/') {
            path.clone()
        } else {
            format!("/{path}")
        };
        Ok(Value::String(resolve_or_warn(&pages, &url, &path)))
    });

    tera.register_function("trans", move |args: &HashMap<String, Value>| {
        let key = args
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("trans() requires a `key` argument"))?;
        Ok(Value::String(translations.get(key).to_string()))
    });
}

fn path_arg(function: &str, args: &HashMap<String, Value>) -> tera::Result<String> {
    args.get("path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| tera::Error::msg(format!("{function}() requires a `path` argument")))
}

fn resolve_or_warn(map: &UrlMap, url: &str, original: &str) -> String {
    match map.resolve(url) {
        Some(resolved) => resolved,
        None => {
            warn!(url = %original, "unknown url in template");
            original.to_string()
        }
    }
}

// =============================================================================
// Translations
// =============================================================================

/// String table for one language, read from `locale/<lang>.yaml`.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    strings: HashMap<String, String>,
}

impl Translations {
    /// Load the table for `language`. A missing file gives an empty table.
    pub fn load(locale_dir: &Path, language: &str) -> Result<Self, RenderError> {
        let path = locale_dir.join(format!("{language}.yaml"));
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Ok(Self::default());
        };

        let strings = serde_yaml::from_str::<Option<HashMap<String, String>>>(&text)
            .map_err(|source| RenderError::Translations { path, source })?
            .unwrap_or_default();
        Ok(Self { strings })
    }

    /// The translation of `key`, or `key` itself.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.strings.get(key).map(String::as_str).unwrap_or(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn context(value: serde_json::Value) -> PageContext {
        value.as_object().unwrap().clone()
    }

    fn renderer(root: &Path, pages: &[&str], urls: SiteUrls, translations: Translations) -> Renderer {
        let pages_dir = root.join("pages");
        let pages: Vec<Page> = pages
            .iter()
            .map(|rel| Page::at(&pages_dir, Path::new(rel), false))
            .collect();
        Renderer::new(&root.join("templates"), &pages_dir, &pages, urls, translations).unwrap()
    }

    #[test]
    fn test_templates_win_for_inheritance() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "pages/base.html", "from pages");
        write(tmp.path(), "templates/base.html", "from templates");
        write(tmp.path(), "pages/index.html", "{% extends \"base.html\" %}");

        let renderer = renderer(
            tmp.path(),
            &["base.html", "index.html"],
            SiteUrls::default(),
            Translations::default(),
        );

        assert_eq!(
            renderer.render_page(Path::new("index.html"), &PageContext::new()).unwrap(),
            "from templates"
        );
        assert_eq!(
            renderer.render_page(Path::new("base.html"), &PageContext::new()).unwrap(),
            "from pages"
        );
    }

    #[test]
    fn test_pages_are_found_by_includes() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "pages/parts/nav.html", "<nav></nav>");
        write(tmp.path(), "pages/index.html", "{% include \"parts/nav.html\" %}!");

        let renderer = renderer(
            tmp.path(),
            &["parts/nav.html", "index.html"],
            SiteUrls::default(),
            Translations::default(),
        );

        assert_eq!(
            renderer.render_page(Path::new("index.html"), &PageContext::new()).unwrap(),
            "<nav></nav>!"
        );
    }

    #[test]
    fn test_unlisted_and_binary_pages_are_not_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "pages/index.html", "ok");
        write(tmp.path(), "pages/drafts/wip.html", "{% if %}");
        std::fs::write(tmp.path().join("pages/logo.png"), [0xff, 0xfe, 0x00]).unwrap();

        let renderer = renderer(
            tmp.path(),
            &["index.html", "logo.png"],
            SiteUrls::default(),
            Translations::default(),
        );

        assert_eq!(
            renderer.render_page(Path::new("index.html"), &PageContext::new()).unwrap(),
            "ok"
        );
        assert!(renderer.render_page(Path::new("logo.png"), &PageContext::new()).is_err());
    }

    #[test]
    fn test_url_functions() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "pages/index.html",
            "{{ static(path=\"site.css\") }} {{ url(path=\"/about.html\") }} {{ url(path=\"gone.html\") }}",
        );
        let urls = SiteUrls {
            static_files: UrlMap::new([(
                "/static/site.css".to_string(),
                "/static/site.abc.css".to_string(),
            )]),
            pages: UrlMap::new([("/about.html".to_string(), "/about/".to_string())]),
        };

        let renderer = renderer(tmp.path(), &["index.html"], urls, Translations::default());

        assert_eq!(
            renderer.render_page(Path::new("index.html"), &PageContext::new()).unwrap(),
            "/static/site.abc.css /about/ gone.html"
        );
    }

    #[test]
    fn test_trans_function() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "locale/nl.yaml", "Hello: Hallo\n");
        write(
            tmp.path(),
            "pages/index.html",
            "{{ trans(key=\"Hello\") }} {{ trans(key=\"Bye\") }} {{ name }}",
        );

        let translations = Translations::load(&tmp.path().join("locale"), "nl").unwrap();
        let renderer = renderer(tmp.path(), &["index.html"], SiteUrls::default(), translations);

        assert_eq!(
            renderer
                .render_page(Path::new("index.html"), &context(json!({ "name": "Ada" })))
                .unwrap(),
            "Hallo Bye Ada"
        );
    }

    #[test]
    fn test_missing_translations_are_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let translations = Translations::load(tmp.path(), "fr").unwrap();
        assert_eq!(translations.get("Hello"), "Hello");
    }
}
