//! Adds per-page values to the template context.

use serde_json::{Value, json};

use crate::build::Page;
use crate::plugin::{HookResult, PageContext, Plugin};
use crate::site::Site;

/// Exposes the current page and language to templates.
///
/// Templates can use `{{ page.final_url }}` and `{{ LANGUAGE_CODE }}`.
pub struct ContextPlugin;

impl Plugin for ContextPlugin {
    fn pre_build_page(&self, site: &Site, page: &Page, context: &mut PageContext) -> HookResult {
        context.insert(
            "page".to_string(),
            json!({
                "path": page.path,
                "link_url": page.link_url,
                "final_url": page.final_url,
            }),
        );
        context.insert(
            "LANGUAGE_CODE".to_string(),
            Value::String(site.language().to_string()),
        );
        Ok(())
    }
}
