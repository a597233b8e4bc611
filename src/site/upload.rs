//! Uploading and domain management.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use super::{Site, SiteError};
use crate::deploy::UploadSummary;

/// Checks whether the network is reachable before anything is uploaded.
pub trait NetworkProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Probes reachability by opening a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub address: SocketAddr,
    pub timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([8, 8, 8, 8], 53)),
            timeout: Duration::from_secs(3),
        }
    }
}

impl NetworkProbe for TcpProbe {
    fn is_online(&self) -> bool {
        TcpStream::connect_timeout(&self.address, self.timeout).is_ok()
    }
}

/// Result of an operation that needs the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Nothing was attempted, the network is unreachable.
    Offline,
    Done(T),
}

const OFFLINE_MESSAGE: &str = "network unreachable";

impl Site {
    /// Build into the deploy directory and publish it.
    pub fn upload(&self) -> Result<Outcome<UploadSummary>, SiteError> {
        if !self.network.is_online() {
            info!("{OFFLINE_MESSAGE}");
            return Ok(Outcome::Offline);
        }

        debug!(provider = self.engine.provider(), "start upload");
        self.set_build_root(self.paths.deploy.clone());
        self.clean()?;
        self.build()?;

        self.plugin_manager().pre_deploy(self)?;
        let records = self.engine.deploy(self)?;
        self.plugin_manager().post_deploy(self)?;

        let summary = UploadSummary::from_records(&records);
        debug!(files = summary.total_files, changed = summary.changed_files, "upload done");
        Ok(Outcome::Done(summary))
    }

    /// Point the configured domain at the site, then list its domains.
    pub fn domain_setup(&self) -> Result<Outcome<Vec<String>>, SiteError> {
        if !self.network.is_online() {
            info!("{OFFLINE_MESSAGE}");
            return Ok(Outcome::Offline);
        }

        self.engine.domain_setup(self)?;
        Ok(Outcome::Done(self.domain_list()?))
    }

    pub fn domain_list(&self) -> Result<Vec<String>, SiteError> {
        Ok(self.engine.domain_list(self)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::deploy::{DeployError, DeployRecord, DeploymentEngine};
    use crate::plugin::{HookResult, Plugin, PluginSource};
    use crate::site::test_support::{StaticProbe, scaffold};

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }
    }

    impl Plugin for Recorder {
        fn pre_deploy(&self, _site: &Site) -> HookResult {
            self.push("pre_deploy");
            Ok(())
        }

        fn post_deploy(&self, _site: &Site) -> HookResult {
            self.push("post_deploy");
            Ok(())
        }
    }

    /// Engine that reports a fixed set of files.
    struct FakeEngine(Arc<Mutex<Vec<String>>>);

    impl DeploymentEngine for FakeEngine {
        fn provider(&self) -> &'static str {
            "fake"
        }

        fn deploy(&self, site: &Site) -> Result<Vec<DeployRecord>, DeployError> {
            self.0
                .lock()
                .unwrap()
                .push(format!("deploy:{}", site.output_path().display()));
            Ok(vec![
                DeployRecord {
                    path: "index.html".into(),
                    size: 100,
                    changed: true,
                },
                DeployRecord {
                    path: "about.html".into(),
                    size: 50,
                    changed: false,
                },
            ])
        }

        fn domain_setup(&self, _site: &Site) -> Result<(), DeployError> {
            self.0.lock().unwrap().push("domain_setup".to_string());
            Ok(())
        }

        fn domain_list(&self, _site: &Site) -> Result<Vec<String>, DeployError> {
            Ok(vec!["example.com".to_string()])
        }
    }

    #[test]
    fn test_upload_offline_does_nothing() {
        let project = scaffold();
        let log = Arc::new(Mutex::new(Vec::new()));
        let site = project
            .builder()
            .with_network_probe(Box::new(StaticProbe(false)))
            .with_deployment_engine(Box::new(FakeEngine(Arc::clone(&log))))
            .build()
            .unwrap();

        assert_eq!(site.upload().unwrap(), Outcome::Offline);
        assert_eq!(site.domain_setup().unwrap(), Outcome::Offline);
        assert!(log.lock().unwrap().is_empty());
        assert!(!project.path().join(".deploy").exists());
    }

    #[test]
    fn test_upload_builds_into_deploy_dir_and_reports() {
        let project = scaffold();
        project.write("pages/index.html", "x");
        let log = Arc::new(Mutex::new(Vec::new()));
        let site = project
            .builder()
            .with_deployment_engine(Box::new(FakeEngine(Arc::clone(&log))))
            .with_plugin_sources(vec![PluginSource::objects(vec![
                Arc::new(Recorder(Arc::clone(&log))) as Arc<dyn Plugin>,
            ])])
            .build()
            .unwrap();

        let Outcome::Done(summary) = site.upload().unwrap() else {
            panic!("expected an upload");
        };

        let deploy = project.path().join(".deploy");
        assert!(deploy.join("index.html").exists());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "pre_deploy".to_string(),
                format!("deploy:{}", deploy.display()),
                "post_deploy".to_string(),
            ]
        );
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_size, 150);
        assert_eq!(summary.changed_files, 1);
        assert_eq!(summary.changed_size, 100);
    }

    #[test]
    fn test_upload_with_local_engine() {
        let project = scaffold();
        project.write("cactus.yaml", "fingerprint: [css]\n");
        project.write("pages/index.html", "<link href=\"{{ static(path='site.css') }}\">");
        project.write("static/site.css", "body {}");
        let site = project.site();

        let Outcome::Done(summary) = site.upload().unwrap() else {
            panic!("expected an upload");
        };

        assert_eq!(summary.total_files, 2);
        let index = std::fs::read_to_string(project.path().join("public/index.html")).unwrap();
        let css_url = index
            .trim_start_matches("<link href=\"")
            .trim_end_matches("\">");
        assert!(project.path().join("public").join(css_url.trim_start_matches('/')).exists());

        let headers = std::fs::read_to_string(project.path().join("public/_headers")).unwrap();
        assert!(headers.contains(&format!("{css_url}\n  Cache-Control: max-age=31536000\n")));
        assert!(headers.contains("/index.html\n  Cache-Control: max-age=3600\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_optimizers_run_for_uploads_only() {
        let project = scaffold();
        project.write(
            "cactus.yaml",
            "externals:\n  optimizers:\n    - name: upper\n      extensions: [html, css]\n      command: [tr, a-z, A-Z]\n",
        );
        project.write("pages/index.html", "home");
        project.write("static/site.css", "body {}");
        let site = project.site();

        site.build().unwrap();
        let build = project.path().join(".build");
        assert_eq!(std::fs::read_to_string(build.join("index.html")).unwrap(), "home");
        assert_eq!(std::fs::read_to_string(build.join("static/site.css")).unwrap(), "body {}");

        assert!(matches!(site.upload().unwrap(), Outcome::Done(_)));
        let public = project.path().join("public");
        assert_eq!(std::fs::read_to_string(public.join("index.html")).unwrap(), "HOME");
        assert_eq!(std::fs::read_to_string(public.join("static/site.css")).unwrap(), "BODY {}");
    }

    #[test]
    fn test_domain_setup_lists_domains() {
        let project = scaffold();
        let log = Arc::new(Mutex::new(Vec::new()));
        let site = project
            .builder()
            .with_deployment_engine(Box::new(FakeEngine(Arc::clone(&log))))
            .build()
            .unwrap();

        assert_eq!(
            site.domain_setup().unwrap(),
            Outcome::Done(vec!["example.com".to_string()])
        );
        assert_eq!(*log.lock().unwrap(), vec!["domain_setup"]);
    }
}
