//! Building and cleaning.

use std::path::Path;

use tracing::{debug, info};

use super::{Site, SiteError};
use crate::build::{BuildError, Page, Renderer, SiteUrls, Translations, try_for_each};

impl Site {
    /// Build the site into the current build root.
    ///
    /// Runs one pass for the default language, then one pass per
    /// configured locale into `<root>/<locale>`. Afterwards the site is
    /// back on the default pass, with the lists its plugins filtered.
    pub fn build(&self) -> Result<(), SiteError> {
        info!(path = %self.paths.root.display(), "building");
        let root = self.build_root();

        self.build_pass(&root, &self.config.default_language)?;

        let locales = self.config.locales();
        if locales.is_empty() {
            return Ok(());
        }

        let default_pass = self.save_pass();
        let result = locales
            .iter()
            .try_for_each(|locale| self.build_pass(&root.join(locale), locale));
        self.restore_pass(default_pass);
        result
    }

    fn build_pass(&self, output: &Path, language: &str) -> Result<(), SiteError> {
        debug!(output = %output.display(), language, "build pass");
        self.begin_pass(output.to_path_buf(), language);
        self.verify_url();

        self.plugin_manager_mut().reload();
        self.plugin_manager().pre_build(self)?;
        debug!(
            plugins = ?self.plugin_manager().plugin_names(),
            processors = ?self.externals().processor_names(),
            optimizers = ?self.externals().optimizer_names(),
            "plugins"
        );

        std::fs::create_dir_all(output).map_err(|e| SiteError::io(output, e))?;

        let statics = self.static_files()?;
        let pages = self.pages()?;
        let renderer = self.renderer(&pages, language)?;
        let context = self.context()?;

        let optimize = self.optimizing();
        try_for_each(self.parallel.static_files(), &statics, |file| {
            file.build(output, self.externals(), optimize)
        })?;

        clean_except_static(output)?;

        try_for_each(self.parallel.pages(), &pages, |page| {
            page.build(self, &renderer, &context)
        })?;

        self.plugin_manager().post_build(self)?;
        info!(
            pages = pages.len(),
            static_files = statics.len(),
            output = %output.display(),
            "built"
        );
        Ok(())
    }

    /// A renderer knowing the templates and the pages left after `pre_build`.
    fn renderer(&self, pages: &[Page], language: &str) -> Result<Renderer, SiteError> {
        let urls = SiteUrls {
            static_files: self.static_urls()?,
            pages: self.page_urls()?,
        };
        let translations = Translations::load(&self.paths.locale, language).map_err(BuildError::from)?;
        Ok(Renderer::new(&self.paths.templates, &self.paths.pages, pages, urls, translations)
            .map_err(BuildError::from)?)
    }

    /// Remove the current build root.
    pub fn clean(&self) -> Result<(), SiteError> {
        let root = self.build_root();
        debug!(path = %root.display(), "clean");
        if root.is_dir() {
            std::fs::remove_dir_all(&root).map_err(|e| SiteError::io(&root, e))?;
        }
        Ok(())
    }
}

/// Empty `output`, keeping the freshly built `static/` subtree.
fn clean_except_static(output: &Path) -> Result<(), SiteError> {
    let entries = std::fs::read_dir(output).map_err(|e| SiteError::io(output, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SiteError::io(output, e))?;
        if entry.file_name() == "static" {
            continue;
        }

        let path = entry.path();
        let removed = if entry.file_type().is_ok_and(|t| t.is_dir()) {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(|e| SiteError::io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::build::ParallelMode;
    use crate::plugin::{HookResult, Plugin, PluginSource};
    use crate::site::test_support::scaffold;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Plugin for Recorder {
        fn pre_build(&self, site: &Site) -> HookResult {
            self.0.lock().unwrap().push(format!("pre_build:{}", site.language()));
            Ok(())
        }

        fn post_build_page(&self, _site: &Site, page: &Page) -> HookResult {
            self.0.lock().unwrap().push(format!("page:{}", page.link_url));
            Ok(())
        }

        fn post_build(&self, _site: &Site) -> HookResult {
            self.0.lock().unwrap().push("post_build".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_build_writes_pages_and_static() {
        let project = scaffold();
        project.write("templates/base.html", "<title>{% block title %}{% endblock %}</title>");
        project.write(
            "pages/index.html",
            "{% extends \"base.html\" %}{% block title %}{{ page.final_url }}{% endblock %}",
        );
        project.write("pages/robots.txt", "User-agent: *");
        project.write("pages/img/photo.jpg", "jpg");
        project.write("static/css/site.css", "body {}");
        let site = project.site();

        site.build().unwrap();

        let out = project.path().join(".build");
        assert_eq!(
            std::fs::read_to_string(out.join("index.html")).unwrap(),
            "<title>/index.html</title>"
        );
        assert_eq!(std::fs::read_to_string(out.join("robots.txt")).unwrap(), "User-agent: *");
        assert_eq!(std::fs::read_to_string(out.join("img/photo.jpg")).unwrap(), "jpg");
        assert!(out.join("static/css/site.css").exists());
    }

    #[test]
    fn test_build_removes_stale_pages_but_keeps_static() {
        let project = scaffold();
        project.write("pages/old.html", "old");
        project.write("static/site.css", "x");
        let site = project.site();
        site.build().unwrap();

        std::fs::remove_file(project.path().join("pages/old.html")).unwrap();
        project.write("pages/new.html", "new");
        site.build().unwrap();

        let out = project.path().join(".build");
        assert!(!out.join("old.html").exists());
        assert!(out.join("new.html").exists());
        assert!(out.join("static/site.css").exists());
    }

    #[test]
    fn test_build_runs_hooks_in_lifecycle_order() {
        let project = scaffold();
        project.write("pages/index.html", "x");
        let log = Arc::new(Mutex::new(Vec::new()));
        let site = project
            .builder()
            .with_plugin_sources(vec![PluginSource::objects(vec![
                Arc::new(Recorder(Arc::clone(&log))) as Arc<dyn Plugin>,
            ])])
            .build()
            .unwrap();

        site.build().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre_build:en", "page:/index.html", "post_build"]
        );
    }

    #[test]
    fn test_translation_passes() {
        let project = scaffold();
        project.write(
            "cactus.yaml",
            "use_translate: true\ndefault_language: en\nother_languages: [nl]\n",
        );
        project.write("locale/nl.yaml", "Hello: Hallo\n");
        project.write("pages/index.html", "{{ trans(key=\"Hello\") }} {{ LANGUAGE_CODE }}");
        let site = project.site();

        site.build().unwrap();

        let out = project.path().join(".build");
        assert_eq!(std::fs::read_to_string(out.join("index.html")).unwrap(), "Hello en");
        assert_eq!(std::fs::read_to_string(out.join("en/index.html")).unwrap(), "Hello en");
        assert_eq!(std::fs::read_to_string(out.join("nl/index.html")).unwrap(), "Hallo nl");
        assert_eq!(site.output_path(), out);
        assert_eq!(site.language(), "en");
    }

    #[test]
    fn test_script_plugin_runs_during_build() {
        let project = scaffold();
        project.write("pages/index.html", "x");
        project.write("pages/about.html", "x");
        project.write(
            "plugins/sitemap.rhai",
            r#"
            fn post_build(site) {
                let urls = site.pages.map(|p| p.final_url);
                urls.sort();
                write_output(site, "sitemap.txt", urls.reduce(|all, u| all + u + "\n", ""));
            }
            "#,
        );
        let site = project.site();

        site.build().unwrap();

        let sitemap = std::fs::read_to_string(project.path().join(".build/sitemap.txt")).unwrap();
        assert_eq!(sitemap, "/about.html\n/index.html\n");
    }

    #[test]
    fn test_ignore_patterns_leave_files_out() {
        let project = scaffold();
        project.write("cactus.yaml", "ignore: ['*.psd', 'drafts/*']\n");
        project.write("pages/index.html", "x");
        project.write("pages/drafts/wip.html", "x");
        project.write("static/logo.psd", "x");
        let site = project.site();

        site.build().unwrap();

        let out = project.path().join(".build");
        assert!(out.join("index.html").exists());
        assert!(!out.join("drafts/wip.html").exists());
        assert!(!out.join("static/logo.psd").exists());
    }

    #[test]
    fn test_ignored_pages_are_not_parsed() {
        let project = scaffold();
        project.write("cactus.yaml", "ignore: ['drafts/*']\n");
        project.write("pages/index.html", "x");
        project.write("pages/drafts/broken.html", "{% if %}");
        let site = project.site();

        site.build().unwrap();

        assert!(project.path().join(".build/index.html").exists());
    }

    #[test]
    fn test_page_named_like_a_template_renders_itself() {
        let project = scaffold();
        project.write("templates/about.html", "TEMPLATE");
        project.write("pages/about.html", "PAGE");
        let site = project.site();

        site.build().unwrap();

        let about = std::fs::read_to_string(project.path().join(".build/about.html")).unwrap();
        assert_eq!(about, "PAGE");
    }

    #[test]
    fn test_filtered_lists_survive_translation_passes() {
        let project = scaffold();
        project.write(
            "cactus.yaml",
            "ignore: ['drafts/*']\nuse_translate: true\nother_languages: [nl]\n",
        );
        project.write("pages/index.html", "x");
        project.write("pages/drafts/wip.html", "x");
        let site = project.site();

        site.build().unwrap();

        let pages: Vec<String> = site.pages().unwrap().iter().map(|p| p.link_url.clone()).collect();
        assert_eq!(pages, vec!["/index.html"]);
        assert_eq!(site.output_path(), project.path().join(".build"));
        assert_eq!(site.language(), "en");
    }

    #[test]
    fn test_filtered_lists_survive_single_pass() {
        let project = scaffold();
        project.write("cactus.yaml", "ignore: ['drafts/*']\n");
        project.write("pages/index.html", "x");
        project.write("pages/drafts/wip.html", "x");
        let site = project.site();

        site.build().unwrap();

        assert_eq!(site.pages().unwrap().len(), 1);
    }

    #[test]
    fn test_aggressive_parallel_build() {
        let project = scaffold();
        for i in 0..20 {
            project.write(&format!("pages/p{i}.html"), "{{ page.link_url }}");
        }
        let site = project
            .builder()
            .with_parallel(ParallelMode::Aggressive)
            .build()
            .unwrap();

        site.build().unwrap();

        let page = std::fs::read_to_string(project.path().join(".build/p7.html")).unwrap();
        assert_eq!(page, "/p7.html");
    }

    #[test]
    fn test_clean_removes_build_root() {
        let project = scaffold();
        project.write("pages/index.html", "x");
        let site = project.site();
        site.build().unwrap();

        site.clean().unwrap();
        assert!(!project.path().join(".build").exists());
        site.clean().unwrap();
    }

    #[test]
    fn test_template_error_fails_build() {
        let project = scaffold();
        project.write("pages/index.html", "{{ missing_variable }}");
        let site = project.site();

        assert!(matches!(site.build(), Err(SiteError::Build(_))));
    }
}
