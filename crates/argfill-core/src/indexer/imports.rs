//! Resolution of import module paths to absolute dotted names.

/// Resolve a possibly relative module reference against the importing
/// module. `from . import x` inside `pkg/mod.py` resolves to `pkg`.
///
/// Returns `None` when the relative reference climbs above the root.
pub fn absolute_module(current: &str, is_package: bool, module_name: &str) -> Option<String> {
    if module_name.is_empty() {
        return None;
    }
    if !module_name.starts_with('.') {
        return Some(module_name.to_string());
    }
    let levels = module_name.chars().take_while(|&c| c == '.').count();
    let suffix = &module_name[levels..];

    let mut base: Vec<&str> = if current.is_empty() {
        Vec::new()
    } else {
        current.split('.').collect()
    };
    // A package's own name is the first level; a plain module starts from its parent.
    let climbs = if is_package { levels - 1 } else { levels };
    if climbs > base.len() {
        return None;
    }
    base.truncate(base.len() - climbs);
    if !suffix.is_empty() {
        base.extend(suffix.split('.'));
    }
    if base.is_empty() {
        return None;
    }
    Some(base.join("."))
}

/// Split `pkg.mod.Name` into (`pkg.mod`, `Name`).
pub fn split_qualified(qualified: &str) -> (&str, &str) {
    match qualified.rsplit_once('.') {
        Some((module, name)) => (module, name),
        None => ("", qualified),
    }
}
