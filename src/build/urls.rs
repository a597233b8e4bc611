//! Mapping source URLs to the URLs files are published at.

use std::collections::HashMap;

use crate::util::{is_external, strip_url_suffix};

/// Maps `link_url` (where a file lives in the source tree) to `final_url`
/// (where it ends up after prettifying or fingerprinting).
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
    urls: HashMap<String, String>,
}

impl UrlMap {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            urls: entries.into_iter().collect(),
        }
    }

    /// Resolve a URL.
    ///
    /// External URLs are returned unchanged. A `#fragment` or `?query` is
    /// dropped before lookup. Unknown URLs give `None`.
    pub fn resolve(&self, url: &str) -> Option<String> {
        if is_external(url) {
            return Some(url.to_string());
        }
        self.urls.get(strip_url_suffix(url)).cloned()
    }
}
