//! Canonical hook names and plugin defaults.

/// Order value given to plugins that do not set one.
pub const DEFAULT_ORDER: i64 = 1000;

/// Extension of user plugin scripts.
pub const SCRIPT_EXTENSION: &str = "rhai";

/// Every hook a plugin can implement, in lifecycle order, with the number
/// of arguments a script function for it takes.
pub const HOOKS: &[(&str, usize)] = &[
    ("pre_build", 1),
    ("pre_build_page", 3),
    ("post_build_page", 2),
    ("post_build", 1),
    ("pre_deploy", 1),
    ("pre_deploy_file", 2),
    ("post_deploy_file", 2),
    ("post_deploy", 1),
];

/// Argument count of the hook called `name`, if it is one.
pub fn hook_arity(name: &str) -> Option<usize> {
    HOOKS
        .iter()
        .find(|(hook, _)| *hook == name)
        .map(|(_, arity)| *arity)
}
