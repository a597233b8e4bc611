//! The plugin manager.

use tracing::debug;

use super::{HookResult, LoadedPlugin, PageContext, PluginSource};
use crate::build::Page;
use crate::deploy::DeployFile;
use crate::site::Site;

/// Owns the plugin sources and the plugins loaded from them.
///
/// Plugins run in source order: every plugin of the first source in
/// discovery order, then the second source, and so on. The `order` value
/// carried by each plugin is not used for sequencing.
pub struct PluginManager {
    sources: Vec<PluginSource>,
    plugins: Vec<LoadedPlugin>,
}

impl PluginManager {
    /// Create a manager. Nothing is loaded until [`reload`](Self::reload).
    pub fn new(sources: Vec<PluginSource>) -> Self {
        Self {
            sources,
            plugins: Vec::new(),
        }
    }

    /// Re-load every source and replace the plugin list wholesale.
    pub fn reload(&mut self) {
        let plugins: Vec<LoadedPlugin> = self.sources.iter().flat_map(PluginSource::load).collect();
        debug!(count = plugins.len(), "reloaded plugins");
        self.plugins = plugins;
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Call `hook` on every plugin in order, stopping at the first error.
    fn each(&self, hook: &str, mut call: impl FnMut(&LoadedPlugin) -> HookResult) -> HookResult {
        for plugin in &self.plugins {
            debug!(plugin = %plugin.name, hook, "running hook");
            call(plugin)?;
        }
        Ok(())
    }

    pub fn pre_build(&self, site: &Site) -> HookResult {
        self.each("pre_build", |p| p.plugin.pre_build(site))
    }

    pub fn post_build(&self, site: &Site) -> HookResult {
        self.each("post_build", |p| p.plugin.post_build(site))
    }

    pub fn pre_build_page(&self, site: &Site, page: &Page, context: &mut PageContext) -> HookResult {
        self.each("pre_build_page", |p| p.plugin.pre_build_page(site, page, context))
    }

    pub fn post_build_page(&self, site: &Site, page: &Page) -> HookResult {
        self.each("post_build_page", |p| p.plugin.post_build_page(site, page))
    }

    pub fn pre_deploy(&self, site: &Site) -> HookResult {
        self.each("pre_deploy", |p| p.plugin.pre_deploy(site))
    }

    pub fn post_deploy(&self, site: &Site) -> HookResult {
        self.each("post_deploy", |p| p.plugin.post_deploy(site))
    }

    pub fn pre_deploy_file(&self, site: &Site, file: &mut DeployFile) -> HookResult {
        self.each("pre_deploy_file", |p| p.plugin.pre_deploy_file(site, file))
    }

    pub fn post_deploy_file(&self, site: &Site, file: &DeployFile) -> HookResult {
        self.each("post_deploy_file", |p| p.plugin.post_deploy_file(site, file))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::plugin::{Plugin, PluginError};
    use crate::site::test_support::scaffold;

    /// Records every hook call into a shared log.
    struct Recorder {
        name: &'static str,
        order: i64,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &'static str, order: i64, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Plugin> {
            Arc::new(Self {
                name,
                order,
                log: Arc::clone(log),
            })
        }

        fn record(&self, hook: &str) -> HookResult {
            self.log.lock().unwrap().push(format!("{}:{hook}", self.name));
            Ok(())
        }
    }

    impl Plugin for Recorder {
        fn name(&self) -> Option<&str> {
            Some(self.name)
        }

        fn order(&self) -> Option<i64> {
            Some(self.order)
        }

        fn pre_build(&self, _site: &Site) -> HookResult {
            self.record("pre_build")
        }

        fn post_deploy(&self, _site: &Site) -> HookResult {
            self.record("post_deploy")
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn pre_build(&self, _site: &Site) -> HookResult {
            Err(PluginError::Hook {
                plugin: "Failing".to_string(),
                hook: "pre_build",
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_reload_is_idempotent_in_membership() {
        let project = scaffold();
        project.write("plugins/a.rhai", "fn pre_build(site) { }");
        project.write("plugins/nested/b.rhai", "fn post_build(site) { }");

        let mut manager = PluginManager::new(vec![PluginSource::directory(project.path().join("plugins"))]);
        manager.reload();
        let first: Vec<String> = manager.plugin_names().iter().map(|s| s.to_string()).collect();
        manager.reload();
        let second: Vec<String> = manager.plugin_names().iter().map(|s| s.to_string()).collect();

        assert_eq!(first, vec!["plugin_a", "plugin_b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_reload_replaces_plugin_list() {
        let project = scaffold();
        project.write("plugins/a.rhai", "");

        let mut manager = PluginManager::new(vec![PluginSource::directory(project.path().join("plugins"))]);
        manager.reload();
        assert_eq!(manager.plugin_names(), vec!["plugin_a"]);

        std::fs::remove_file(project.path().join("plugins/a.rhai")).unwrap();
        manager.reload();
        assert!(manager.plugin_names().is_empty());
    }

    #[test]
    fn test_failing_script_is_excluded() {
        let project = scaffold();
        project.write("plugins/good.rhai", "fn pre_build(site) { }");
        project.write("plugins/bad.rhai", "this is not rhai (");
        project.write("plugins/zeta.rhai", "");

        let mut manager = PluginManager::new(vec![PluginSource::directory(project.path().join("plugins"))]);
        manager.reload();

        assert_eq!(manager.plugin_names(), vec!["plugin_good", "plugin_zeta"]);
    }

    #[test]
    fn test_builtins_present_without_plugin_dir() {
        let project = scaffold();
        std::fs::remove_dir_all(project.path().join("plugins")).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut manager = PluginManager::new(vec![
            PluginSource::directory(project.path().join("plugins")),
            PluginSource::objects(vec![Recorder::new("builtin", 1, &log)]),
        ]);
        manager.reload();

        assert_eq!(manager.plugin_names(), vec!["builtin"]);
    }

    #[test]
    fn test_user_plugins_run_before_builtins() {
        let project = scaffold();
        project.write("plugins/custom.rhai", "");
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut manager = PluginManager::new(vec![
            PluginSource::directory(project.path().join("plugins")),
            PluginSource::objects(vec![Recorder::new("builtin", 1, &log)]),
        ]);
        manager.reload();

        assert_eq!(manager.plugin_names(), vec!["plugin_custom", "builtin"]);
    }

    #[test]
    fn test_order_value_does_not_resort() {
        let project = scaffold();
        let site = project.site();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut manager = PluginManager::new(vec![PluginSource::objects(vec![
            Recorder::new("late", 900, &log),
            Recorder::new("early", 1, &log),
        ])]);
        manager.reload();
        manager.pre_build(&site).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["late:pre_build", "early:pre_build"]);
    }

    #[test]
    fn test_post_deploy_runs_builtins_in_construction_order() {
        let project = scaffold();
        let site = project.site();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut manager = PluginManager::new(vec![
            PluginSource::directory(project.path().join("plugins")),
            PluginSource::objects(vec![
                Recorder::new("one", 1, &log),
                Recorder::new("two", 2, &log),
                Recorder::new("three", 3, &log),
            ]),
        ]);
        manager.reload();
        manager.post_deploy(&site).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["one:post_deploy", "two:post_deploy", "three:post_deploy"]
        );
    }

    #[test]
    fn test_hook_error_propagates_and_stops() {
        let project = scaffold();
        let site = project.site();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut manager = PluginManager::new(vec![PluginSource::objects(vec![
            Arc::new(Failing) as Arc<dyn Plugin>,
            Recorder::new("after", 1, &log),
        ])]);
        manager.reload();

        let err = manager.pre_build(&site).err().unwrap();
        assert!(matches!(err, PluginError::Hook { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_script_never_runs() {
        let project = scaffold();
        let site = project.site();
        project.write(
            "plugins/a.rhai",
            r#"fn pre_build(site) { append_output(site, "calls.txt", "a;"); }"#,
        );
        project.write(
            "plugins/b.rhai.disabled",
            r#"fn post_build(site) { append_output(site, "calls.txt", "b;"); }"#,
        );

        let mut manager = PluginManager::new(vec![PluginSource::directory(project.path().join("plugins"))]);
        manager.reload();
        manager.pre_build(&site).unwrap();
        manager.post_build(&site).unwrap();

        assert_eq!(manager.plugin_names(), vec!["plugin_a"]);
        let calls = std::fs::read_to_string(site.output_path().join("calls.txt")).unwrap();
        assert_eq!(calls, "a;");
    }
}
