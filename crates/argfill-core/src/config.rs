//! Engine configuration: builtin-name tables, record markers and the
//! recursion bound.
//!
//! Values come from [`EngineConfig::default`], optionally overlaid by a JSON
//! file and by environment variables (`ARGFILL_CONFIG_FILE`,
//! `ARGFILL_MAX_DEPTH`).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ArgfillError, ArgfillResult};
use crate::populate::guards::MAX_RECURSION_DEPTH;

pub const CONFIG_FILE_ENV: &str = "ARGFILL_CONFIG_FILE";
pub const MAX_DEPTH_ENV: &str = "ARGFILL_MAX_DEPTH";

const BUILTIN_NAMES: &[&str] = &[
    "object", "int", "float", "complex", "bool", "str", "bytes", "bytearray", "memoryview",
    "list", "tuple", "set", "frozenset", "dict", "range", "slice", "type", "property",
    "Exception", "BaseException", "ValueError", "TypeError", "KeyError", "RuntimeError",
];

const PRIMITIVE_NAMES: &[&str] = &["str", "int", "float", "bool", "bytes", "complex"];

const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "array", "asyncio", "base64", "collections", "contextlib", "copy",
    "csv", "dataclasses", "datetime", "decimal", "enum", "fractions", "functools", "hashlib",
    "http", "io", "ipaddress", "itertools", "json", "logging", "math", "numbers", "operator",
    "os", "pathlib", "pickle", "queue", "random", "re", "socket", "sqlite3", "statistics",
    "string", "subprocess", "sys", "tempfile", "threading", "time", "types", "typing",
    "typing_extensions", "unittest", "urllib", "uuid", "weakref", "xml", "zoneinfo",
];

const RECORD_DECORATORS: &[&str] = &[
    "dataclass",
    "dataclasses.dataclass",
    "pydantic.dataclasses.dataclass",
    "attr.s",
    "attr.attrs",
    "attr.define",
    "attr.frozen",
    "attrs.define",
    "attrs.frozen",
    "attrs.mutable",
];

const RECORD_BASES: &[&str] = &[
    "BaseModel",
    "pydantic.BaseModel",
    "pydantic.main.BaseModel",
    "NamedTuple",
    "typing.NamedTuple",
    "TypedDict",
    "typing.TypedDict",
    "typing_extensions.TypedDict",
    "msgspec.Struct",
];

const CONFIG_MARKERS: &[&str] = &["model_config"];

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deepest nesting level at which a value is still synthesized.
    pub max_depth: usize,
    pub builtin_names: HashSet<String>,
    pub primitive_names: HashSet<String>,
    /// Top-level package names classified as the standard library.
    pub stdlib_modules: HashSet<String>,
    /// Decorators (short or qualified) that turn a class into a record.
    pub record_decorators: HashSet<String>,
    /// Bases (short or qualified) whose subclasses are records.
    pub record_bases: HashSet<String>,
    /// Class attributes that configure a record rather than declare a field.
    pub config_markers: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_RECURSION_DEPTH,
            builtin_names: to_set(BUILTIN_NAMES),
            primitive_names: to_set(PRIMITIVE_NAMES),
            stdlib_modules: to_set(STDLIB_MODULES),
            record_decorators: to_set(RECORD_DECORATORS),
            record_bases: to_set(RECORD_BASES),
            config_markers: to_set(CONFIG_MARKERS),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> ArgfillResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Defaults overlaid with `ARGFILL_CONFIG_FILE` and `ARGFILL_MAX_DEPTH`.
    pub fn from_env() -> ArgfillResult<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        let depth = std::env::var(MAX_DEPTH_ENV).ok();
        Self::with_overrides(file.as_deref(), depth.as_deref())
    }

    pub fn with_overrides(file: Option<&str>, max_depth: Option<&str>) -> ArgfillResult<Self> {
        let mut config = match file.map(str::trim).filter(|f| !f.is_empty()) {
            Some(path) => Self::from_json_file(Path::new(path))?,
            None => Self::default(),
        };
        if let Some(raw) = max_depth.map(str::trim).filter(|d| !d.is_empty()) {
            config.max_depth = raw.parse().map_err(|_| {
                ArgfillError::Config(format!("{MAX_DEPTH_ENV} must be a non-negative integer, got {raw:?}"))
            })?;
        }
        Ok(config)
    }

    pub fn is_builtin_name(&self, name: &str) -> bool {
        self.builtin_names.contains(name)
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.primitive_names.contains(name)
    }

    /// Whether a dotted module path belongs to the standard library.
    pub fn is_stdlib_module(&self, module: &str) -> bool {
        let top = module.split('.').next().unwrap_or(module);
        self.stdlib_modules.contains(top)
    }

    pub fn is_record_decorator(&self, raw: &str, qualified: Option<&str>) -> bool {
        self.record_decorators.contains(raw)
            || qualified.is_some_and(|q| self.record_decorators.contains(q))
    }

    pub fn is_record_base(&self, raw: &str, qualified: Option<&str>) -> bool {
        self.record_bases.contains(raw) || qualified.is_some_and(|q| self.record_bases.contains(q))
    }

    pub fn is_config_marker(&self, name: &str) -> bool {
        self.config_markers.contains(name)
    }
}
