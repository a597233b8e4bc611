//! Project directory layout.

use std::path::{Path, PathBuf};

use super::SiteError;

/// Every directory a project uses, derived from its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub root: PathBuf,
    /// Output of `build` and `serve`
    pub build: PathBuf,
    /// Output of `deploy`
    pub deploy: PathBuf,
    pub templates: PathBuf,
    pub pages: PathBuf,
    pub plugins: PathBuf,
    pub static_dir: PathBuf,
    pub locale: PathBuf,
}

impl SitePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            build: root.join(".build"),
            deploy: root.join(".deploy"),
            templates: root.join("templates"),
            pages: root.join("pages"),
            plugins: root.join("plugins"),
            static_dir: root.join("static"),
            locale: root.join("locale"),
            root,
        }
    }

    /// The source directories a rebuild reacts to.
    pub fn sources(&self) -> Vec<PathBuf> {
        vec![
            self.pages.clone(),
            self.templates.clone(),
            self.static_dir.clone(),
            self.plugins.clone(),
        ]
    }

    /// Check that this looks like a cactus project.
    pub fn verify(&self, use_translate: bool) -> Result<(), SiteError> {
        let mut required: Vec<(&'static str, &Path)> = vec![
            ("pages", &self.pages),
            ("static", &self.static_dir),
            ("templates", &self.templates),
            ("plugins", &self.plugins),
        ];
        if use_translate {
            required.push(("locale", &self.locale));
        }

        match required.into_iter().find(|(_, path)| !path.is_dir()) {
            Some((name, _)) => Err(SiteError::MissingSubfolder(name)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = SitePaths::new("/site");
        assert_eq!(paths.build, PathBuf::from("/site/.build"));
        assert_eq!(paths.deploy, PathBuf::from("/site/.deploy"));
        assert_eq!(paths.static_dir, PathBuf::from("/site/static"));
        assert_eq!(paths.sources().len(), 4);
    }

    #[test]
    fn test_verify() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SitePaths::new(tmp.path());
        for dir in ["pages", "static", "templates"] {
            std::fs::create_dir(tmp.path().join(dir)).unwrap();
        }

        assert!(matches!(
            paths.verify(false),
            Err(SiteError::MissingSubfolder("plugins"))
        ));

        std::fs::create_dir(tmp.path().join("plugins")).unwrap();
        assert!(paths.verify(false).is_ok());
        assert!(matches!(
            paths.verify(true),
            Err(SiteError::MissingSubfolder("locale"))
        ));
    }
}
