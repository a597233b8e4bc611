//! Context keys kept for templates written against older cactus versions.

use serde_json::json;

use crate::build::Page;
use crate::plugin::{HookResult, PageContext, Plugin};
use crate::site::Site;

/// Adds `__CACTUS_CURRENT_PAGE__` and `__CACTUS_SITE__` to every page's
/// template context.
pub struct PageContextCompatibilityPlugin;

impl Plugin for PageContextCompatibilityPlugin {
    fn pre_build_page(&self, site: &Site, page: &Page, context: &mut PageContext) -> HookResult {
        context.insert(
            "__CACTUS_CURRENT_PAGE__".to_string(),
            json!({
                "path": page.path,
                "link_url": page.link_url,
                "final_url": page.final_url,
            }),
        );
        context.insert(
            "__CACTUS_SITE__".to_string(),
            json!({
                "url": site.url(),
                "language": site.language(),
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::site::test_support::scaffold;

    #[test]
    fn test_adds_legacy_keys() {
        let project = scaffold();
        project.write("cactus.yaml", "site-url: https://example.com\n");
        let site = project.site();
        let page = Page::new(&site, Path::new("about.html"));
        let mut context = PageContext::new();

        PageContextCompatibilityPlugin
            .pre_build_page(&site, &page, &mut context)
            .unwrap();

        assert_eq!(context["__CACTUS_CURRENT_PAGE__"]["final_url"], "/about.html");
        assert_eq!(context["__CACTUS_SITE__"]["url"], "https://example.com");
        assert_eq!(context["__CACTUS_SITE__"]["language"], "en");
    }

    #[test]
    fn test_legacy_keys_reach_templates() {
        let project = scaffold();
        project.write("pages/index.html", "{{ __CACTUS_CURRENT_PAGE__.link_url }}");
        let site = project.site();

        site.build().unwrap();

        let index = std::fs::read_to_string(project.path().join(".build/index.html")).unwrap();
        assert_eq!(index, "/index.html");
    }
}
