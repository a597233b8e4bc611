//! Markdown pages: front matter parsing and HTML rendering.

use std::collections::HashMap;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Front matter metadata at the top of a markdown page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontMatter {
    /// Template that wraps the rendered markdown as `content`
    pub template: Option<String>,
    pub title: Option<String>,
    /// Additional arbitrary metadata (available in templates as `meta.*`)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Result of parsing front matter from markdown content.
#[derive(Debug)]
pub struct ParsedContent {
    /// The parsed front matter (empty if none found)
    pub front_matter: FrontMatter,
    /// The markdown content without the front matter block
    pub content: String,
}

/// Parse front matter from markdown content.
///
/// Front matter is a YAML block delimited by `---` at the start of the file:
///
/// ```markdown
/// ---
/// title: My Page
/// template: post.html
/// ---
///
/// # Content starts here
/// ```
pub fn parse_front_matter(content: &str) -> ParsedContent {
    let trimmed = content.trim_start();

    let Some(after_opening) = trimmed.strip_prefix("---") else {
        return ParsedContent {
            front_matter: FrontMatter::default(),
            content: trimmed.to_string(),
        };
    };

    let Some((yaml, rest)) = after_opening.split_once("\n---") else {
        // No closing delimiter found, treat entire content as markdown
        return ParsedContent {
            front_matter: FrontMatter::default(),
            content: trimmed.to_string(),
        };
    };

    let front_matter = match serde_yaml::from_str(yaml.trim_start_matches('\n')) {
        Ok(fm) => fm,
        Err(e) => {
            warn!(error = %e, "failed to parse front matter");
            FrontMatter::default()
        }
    };

    ParsedContent {
        front_matter,
        content: rest.trim_start_matches('\n').to_string(),
    }
}

/// Render markdown to HTML with the common extensions enabled.
///
/// Site-absolute link and image targets are passed through `resolve`
/// (without their `#fragment` or `?query`); a target it does not know is
/// left alone.
pub fn render_markdown(markdown: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;

    let rewrite = |dest: CowStr<'_>| -> Option<String> {
        if !dest.starts_with('/') {
            return None;
        }
        let split = dest.find(['#', '?']).unwrap_or(dest.len());
        let (path, suffix) = dest.split_at(split);
        resolve(path).map(|url| format!("{url}{suffix}"))
    };

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: rewrite(dest_url.clone()).map_or(dest_url, CowStr::from),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: rewrite(dest_url.clone()).map_or(dest_url, CowStr::from),
            title,
            id,
        }),
        other => other,
    });
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}
