//! Bounds and fixed texts shared by the population engine.

/// Deepest nesting level at which a value is still synthesized.
pub const MAX_RECURSION_DEPTH: usize = 5;

/// Value used in local-scope mode wherever synthesis fell back to the
/// sentinel.
pub const LOCAL_SCOPE_FALLBACK: &str = "None";

pub const UNION_PROMPT_PREFIX: &str = "Select union type for";

/// Rendered name of the `None` type.
pub const NONE_NAME: &str = "None";

/// Separator used when joining union member names into a signature.
pub const SIGNATURE_SEPARATOR: &str = "|";

pub fn union_prompt(param_name: &str) -> String {
    format!("{UNION_PROMPT_PREFIX} {param_name}")
}

/// Text of an alias wrapped around the sentinel, e.g. `UserId(...)`.
pub fn alias_placeholder(name: &str) -> String {
    format!("{name}({})", crate::models::SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_prompt() {
        assert_eq!(union_prompt("v"), "Select union type for v");
    }

    #[test]
    fn test_alias_placeholder() {
        assert_eq!(alias_placeholder("MyStr"), "MyStr(...)");
    }
}
