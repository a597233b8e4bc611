//! Leaves files matching the `ignore` patterns out of the build.

use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use crate::plugin::{HookResult, Plugin};
use crate::site::Site;

/// Drops pages and static files matching any configured `ignore` glob.
///
/// A pattern matches either the path relative to `pages/` or `static/`, or
/// the bare file name, so `*.psd` and `drafts/*` both work.
pub struct IgnorePatternsPlugin;

impl Plugin for IgnorePatternsPlugin {
    fn pre_build(&self, site: &Site) -> HookResult {
        let patterns = compile_patterns(&site.config().ignore);
        if patterns.is_empty() {
            return Ok(());
        }

        let keep = |path: &Path| {
            let ignored = is_ignored(&patterns, path);
            if ignored {
                debug!(path = %path.display(), "ignoring");
            }
            !ignored
        };

        site.retain_pages(|page| keep(&page.path));
        site.retain_static_files(|file| keep(&file.path));
        Ok(())
    }
}

fn compile_patterns(globs: &[String]) -> Vec<Regex> {
    globs
        .iter()
        .filter_map(|glob| match Regex::new(&glob_to_regex(glob)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %glob, error = %e, "invalid ignore pattern");
                None
            }
        })
        .collect()
}

fn is_ignored(patterns: &[Regex], path: &Path) -> bool {
    let full = path.to_string_lossy().replace('\\', "/");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    patterns
        .iter()
        .any(|re| re.is_match(&full) || re.is_match(&name))
}

/// Translate a shell glob (`*`, `?`, `[...]`) into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    if inner == '\\' {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}
