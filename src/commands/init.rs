use std::path::Path;

use crate::{
    InitArgs,
    config::{DEFAULT_CONFIG_FILE, SiteConfig},
};

const INDEX_PAGE: &str = r#"{% extends "base.html" %}

{% block content %}
<h1>Welcome to cactus</h1>
<p>Edit <code>pages/index.html</code> to get started.</p>
{% endblock %}
"#;

const BASE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ LANGUAGE_CODE }}">
<head>
    <meta charset="utf-8">
    <title>{% block title %}My cactus site{% endblock %}</title>
    <link rel="stylesheet" href="{{ static(path='css/style.css') }}">
</head>
<body>
{% block content %}{% endblock %}
</body>
</html>
"#;

const STYLESHEET: &str = "body {\n    font-family: sans-serif;\n    margin: 2em auto;\n    max-width: 40em;\n}\n";

const EXAMPLE_PLUGIN: &str = r#"// Rename to example.rhai to enable.
let plugin_name = "example";

fn post_build(site) {
    let urls = site.pages.map(|p| p.final_url);
    write_output(site, "sitemap.txt", urls.reduce(|all, u| all + u + "\n", ""));
}
"#;

const LOCALE: &str = "# Strings for trans(key=...), keyed by their English text.\n{}\n";

/// Files of a fresh project, relative to its root.
fn skeleton() -> Result<Vec<(&'static str, String)>, anyhow::Error> {
    let config = serde_yaml::to_string(&SiteConfig::default())?;
    Ok(vec![
        ("pages/index.html", INDEX_PAGE.to_string()),
        ("templates/base.html", BASE_TEMPLATE.to_string()),
        ("static/css/style.css", STYLESHEET.to_string()),
        ("plugins/example.disabled.rhai", EXAMPLE_PLUGIN.to_string()),
        ("locale/en.yaml", LOCALE.to_string()),
        (DEFAULT_CONFIG_FILE, config),
    ])
}

/// Write the skeleton below `path`, touching nothing if any file exists.
async fn write_skeleton(path: &Path) -> Result<(), anyhow::Error> {
    let files = skeleton()?;

    if let Some((existing, _)) = files.iter().find(|(rel, _)| path.join(rel).exists()) {
        return Err(anyhow::anyhow!(
            "Refusing to overwrite {existing}",
            existing = path.join(existing).display()
        ));
    }

    for (rel, content) in files {
        let target = path.join(rel);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;
        println!("Created {}", target.display());
    }

    Ok(())
}

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = super::absolute(&args.path)?;

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            println!("Created directory {path}", path = path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    println!("Initializing project in {}", path.display());
    write_skeleton(&path).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{Site, Verb};

    #[tokio::test]
    async fn test_skeleton_builds() {
        let dir = tempfile::tempdir().unwrap();
        write_skeleton(dir.path()).await.unwrap();

        let site = Site::builder(dir.path()).with_verb(Verb::Build).build().unwrap();
        site.build().unwrap();

        let index = std::fs::read_to_string(dir.path().join(".build/index.html")).unwrap();
        assert!(index.contains("<h1>Welcome to cactus</h1>"));
        assert!(index.contains("href=\"/static/css/style.css\""));
        assert!(!dir.path().join(".build/sitemap.txt").exists());
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pages")).unwrap();
        std::fs::write(dir.path().join("pages/index.html"), "mine").unwrap();

        assert!(write_skeleton(dir.path()).await.is_err());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pages/index.html")).unwrap(),
            "mine"
        );
        assert!(!dir.path().join("templates/base.html").exists());
    }
}
