//! Shared utility functions.

use std::path::Path;

/// Format a byte count for humans.
///
/// 512 -> "512.0B", 2048 -> "2.0KB", 5_242_880 -> "5.0MB"
pub fn file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{size:.1}{}", UNITS[unit])
}

/// Lowercase extension of `path`, empty when it has none.
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether a URL points outside the site.
pub fn is_external(url: &str) -> bool {
    ["http://", "https://", "//", "mailto:", "data:"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// Strip a `#fragment` or `?query` from a site-relative URL.
pub fn strip_url_suffix(url: &str) -> &str {
    url.split(['#', '?']).next().unwrap_or(url)
}
