//! Rhai script plugins.
//!
//! Each script is compiled and evaluated in its own engine and scope, so
//! scripts cannot see each other. Hooks are plain script functions:
//!
//! ```rhai
//! let plugin_name = "sitemap";
//!
//! fn post_build(site) {
//!     let urls = site.pages.map(|p| p.final_url);
//!     write_output(site, "sitemap.txt", urls.reduce(|all, u| all + u + "\n", ""));
//! }
//! ```
//!
//! Hooks the script does not define are no-ops. Scripts cannot import
//! modules, and a hook call is cut off after [`MAX_OPERATIONS`].

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, ImmutableString, Map, Scope, AST, INT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::defaults::hook_arity;
use super::{HookResult, PageContext, Plugin, PluginError};
use crate::build::Page;
use crate::deploy::DeployFile;
use crate::site::Site;

/// Operations one script evaluation or hook call may run.
const MAX_OPERATIONS: u64 = 5_000_000;

/// A plugin backed by a Rhai script.
pub struct ScriptPlugin {
    unit_name: String,
    plugin_name: Option<String>,
    order: Option<i64>,
    hooks: BTreeSet<String>,
    /// Where `write_output` writes; the site's output path of the last hook call
    output_root: Arc<RwLock<PathBuf>>,
    engine: Engine,
    ast: AST,
    /// Top-level scope after evaluation; cloned for every hook call.
    scope: Scope<'static>,
}

/// Fields a `pre_deploy_file` hook may hand back.
#[derive(Debug, Default, Deserialize)]
struct DeployFileUpdate {
    cache_control: Option<String>,
    compress: Option<bool>,
}

impl ScriptPlugin {
    /// Compile and evaluate the script at `path`.
    pub fn load(path: &Path, unit_name: &str) -> Result<Self, PluginError> {
        let fail = |message: String| PluginError::Load {
            path: path.to_path_buf(),
            message,
        };

        let output_root = Arc::new(RwLock::new(PathBuf::new()));
        let engine = script_engine(unit_name, Arc::clone(&output_root));
        let ast = engine
            .compile_file(path.to_path_buf())
            .map_err(|e| fail(e.to_string()))?;

        let mut hooks = BTreeSet::new();
        for function in ast.iter_functions() {
            let Some(arity) = hook_arity(function.name) else {
                continue;
            };
            if function.params.len() != arity {
                return Err(fail(format!(
                    "hook '{}' takes {} argument(s), the script declares {}",
                    function.name,
                    arity,
                    function.params.len()
                )));
            }
            hooks.insert(function.name.to_string());
        }

        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| fail(e.to_string()))?;

        let plugin_name = scope
            .get_value::<ImmutableString>("plugin_name")
            .map(|s| s.to_string());
        let order = scope.get_value::<INT>("order");

        Ok(Self {
            unit_name: unit_name.to_string(),
            plugin_name,
            order,
            hooks,
            output_root,
            engine,
            ast,
            scope,
        })
    }

    /// Whether the script defines the hook `name`.
    pub fn defines(&self, name: &str) -> bool {
        self.hooks.contains(name)
    }

    fn display_name(&self) -> &str {
        self.plugin_name.as_deref().unwrap_or(&self.unit_name)
    }

    fn hook_error(&self, hook: &'static str, message: impl Into<String>) -> PluginError {
        PluginError::Hook {
            plugin: self.display_name().to_string(),
            hook,
            message: message.into(),
        }
    }

    fn to_script<T: Serialize + ?Sized>(
        &self,
        hook: &'static str,
        value: &T,
    ) -> Result<Dynamic, PluginError> {
        rhai::serde::to_dynamic(value).map_err(|e| self.hook_error(hook, e.to_string()))
    }

    fn call(&self, hook: &'static str, site: &Site, args: impl FuncArgs) -> Result<Dynamic, PluginError> {
        *self
            .output_root
            .write()
            .unwrap_or_else(PoisonError::into_inner) = site.output_path();

        let mut scope = self.scope.clone();
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, hook, args)
            .map_err(|e| self.hook_error(hook, e.to_string()))
    }

    fn site_hook(&self, hook: &'static str, site: &Site) -> HookResult {
        if !self.defines(hook) {
            return Ok(());
        }
        let summary = self.to_script(hook, &site.summary())?;
        self.call(hook, site, (summary,)).map(|_| ())
    }
}

impl Plugin for ScriptPlugin {
    fn name(&self) -> Option<&str> {
        self.plugin_name.as_deref()
    }

    fn order(&self) -> Option<i64> {
        self.order
    }

    fn pre_build(&self, site: &Site) -> HookResult {
        self.site_hook("pre_build", site)
    }

    fn post_build(&self, site: &Site) -> HookResult {
        self.site_hook("post_build", site)
    }

    fn pre_build_page(&self, site: &Site, page: &Page, context: &mut PageContext) -> HookResult {
        const HOOK: &str = "pre_build_page";
        if !self.defines(HOOK) {
            return Ok(());
        }

        let args = (
            self.to_script(HOOK, &site.summary())?,
            self.to_script(HOOK, page)?,
            self.to_script(HOOK, &*context)?,
        );
        let result = self.call(HOOK, site, args)?;

        // A returned map is merged into the template context.
        if result.is_map() {
            let extra: PageContext = rhai::serde::from_dynamic(&result)
                .map_err(|e| self.hook_error(HOOK, e.to_string()))?;
            context.extend(extra);
        }
        Ok(())
    }

    fn post_build_page(&self, site: &Site, page: &Page) -> HookResult {
        const HOOK: &str = "post_build_page";
        if !self.defines(HOOK) {
            return Ok(());
        }

        let args = (
            self.to_script(HOOK, &site.summary())?,
            self.to_script(HOOK, page)?,
        );
        self.call(HOOK, site, args).map(|_| ())
    }

    fn pre_deploy(&self, site: &Site) -> HookResult {
        self.site_hook("pre_deploy", site)
    }

    fn post_deploy(&self, site: &Site) -> HookResult {
        self.site_hook("post_deploy", site)
    }

    fn pre_deploy_file(&self, site: &Site, file: &mut DeployFile) -> HookResult {
        const HOOK: &str = "pre_deploy_file";
        if !self.defines(HOOK) {
            return Ok(());
        }

        let args = (
            self.to_script(HOOK, &site.summary())?,
            self.to_script(HOOK, &*file)?,
        );
        let result = self.call(HOOK, site, args)?;

        if result.is_map() {
            let update: DeployFileUpdate = rhai::serde::from_dynamic(&result)
                .map_err(|e| self.hook_error(HOOK, e.to_string()))?;
            if let Some(cache_control) = update.cache_control {
                file.cache_control = Some(cache_control);
            }
            if let Some(compress) = update.compress {
                file.compress = compress;
            }
        }
        Ok(())
    }

    fn post_deploy_file(&self, site: &Site, file: &DeployFile) -> HookResult {
        const HOOK: &str = "post_deploy_file";
        if !self.defines(HOOK) {
            return Ok(());
        }

        let args = (
            self.to_script(HOOK, &site.summary())?,
            self.to_script(HOOK, file)?,
        );
        self.call(HOOK, site, args).map(|_| ())
    }
}

// =============================================================================
// Engine setup
// =============================================================================

/// A fresh engine for one script, with output routed to tracing.
///
/// `write_output` and `append_output` write below `output_root`; the
/// `site` a script passes them only names the call, its `build_path` is
/// not trusted.
fn script_engine(unit_name: &str, output_root: Arc<RwLock<PathBuf>>) -> Engine {
    let mut engine = Engine::new();
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.set_max_operations(MAX_OPERATIONS);

    let unit = unit_name.to_string();
    engine.on_print(move |text| info!(plugin = %unit, "{text}"));

    let unit = unit_name.to_string();
    engine.on_debug(move |text, _source, pos| debug!(plugin = %unit, %pos, "{text}"));

    let root = Arc::clone(&output_root);
    engine.register_fn("write_output", move |_site: Map, path: &str, text: &str| {
        output_file(&current_root(&root), path, text, false)
    });
    let root = output_root;
    engine.register_fn("append_output", move |_site: Map, path: &str, text: &str| {
        output_file(&current_root(&root), path, text, true)
    });

    engine
}

fn current_root(root: &RwLock<PathBuf>) -> PathBuf {
    root.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Write `text` to `path` below `root`, the site's current build output.
fn output_file(root: &Path, path: &str, text: &str, append: bool) -> Result<(), Box<EvalAltResult>> {
    if root.as_os_str().is_empty() {
        return Err("no build in progress".into());
    }

    let relative = Path::new(path);
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(format!("refusing to write outside the build directory: {path}").into());
    }

    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    if append {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .map_err(|e| e.to_string())?;
        file.write_all(text.as_bytes()).map_err(|e| e.to_string())?;
    } else {
        std::fs::write(&target, text).map_err(|e| e.to_string())?;
    }

    Ok(())
}
