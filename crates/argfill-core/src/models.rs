//! Shared typed models used across the source model, the host adapters and
//! the population engine.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

define_id!(
    /// A symbol known to the type model (class, alias, builtin, external name).
    SymbolId,
    "sym"
);
define_id!(
    /// An interned type handle.
    TypeId,
    "type"
);
define_id!(
    /// A call expression in some source file.
    CallId,
    "call"
);
define_id!(
    /// A source file.
    FileId,
    "file"
);
define_id!(
    /// A lexical scope (module body or function body).
    ScopeId,
    "scope"
);

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Function,
    Alias,
    Variable,
    Builtin,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub qualified_name: String,
    pub module: String,
    pub kind: SymbolKind,
}

impl Symbol {
    /// Label shown to a human choosing between types: `Name (pkg.mod.Name)`
    /// when the qualified name adds information, otherwise just the name.
    pub fn label(&self) -> String {
        if self.name == self.qualified_name {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.qualified_name)
        }
    }
}

// ---------------------------------------------------------------------------
// Type shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    List,
    Set,
    Tuple,
    Dict,
    Other,
}

impl CollectionKind {
    /// Map a container name (builtin or `typing` spelling) to its kind.
    pub fn from_name(name: &str) -> Self {
        match name {
            "list" | "List" => CollectionKind::List,
            "set" | "Set" => CollectionKind::Set,
            "tuple" | "Tuple" => CollectionKind::Tuple,
            "dict" | "Dict" => CollectionKind::Dict,
            _ => CollectionKind::Other,
        }
    }
}

/// Structural view of a type, as far as value synthesis is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    /// Structured value type with a named field list, inherited fields first.
    Record {
        symbol: SymbolId,
        fields: Vec<FieldDescriptor>,
    },
    Union {
        members: Vec<TypeId>,
    },
    Collection {
        kind: CollectionKind,
        elements: Vec<TypeId>,
    },
    /// Named wrapper around another type (`NewType` and friends).
    Alias {
        symbol: Option<SymbolId>,
        name: String,
    },
    /// A builtin scalar or container type, or a class deriving from one.
    Builtin {
        symbol: Option<SymbolId>,
        name: String,
    },
    Plain {
        symbol: SymbolId,
    },
    Literal {
        text: String,
    },
    AnyLike {
        name: String,
    },
    NoneType,
    Unknown,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub declared_type: Option<TypeId>,
    pub has_default: bool,
    /// True for positional-only parameters.
    pub is_positional: bool,
    pub is_keyword_only: bool,
    pub is_variadic: bool,
    /// Set when the callee is a record and this field is annotated with a
    /// named alias.
    pub annotation_alias: Option<SymbolId>,
    pub default_text: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, declared_type: Option<TypeId>) -> Self {
        Self {
            name: name.into(),
            declared_type,
            has_default: false,
            is_positional: false,
            is_keyword_only: false,
            is_variadic: false,
            annotation_alias: None,
            default_text: None,
        }
    }

    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.has_default = true;
        self.default_text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Keyword the record constructor accepts for this field.
    pub name: String,
    pub declared_type: TypeId,
    pub alias_symbol: Option<SymbolId>,
    pub default_text: Option<String>,
    pub is_keyword_only: bool,
}

impl FieldDescriptor {
    pub fn to_parameter(&self, annotation_alias: Option<SymbolId>) -> ParameterDescriptor {
        ParameterDescriptor {
            name: self.name.clone(),
            declared_type: Some(self.declared_type),
            has_default: self.default_text.is_some(),
            is_positional: false,
            is_keyword_only: self.is_keyword_only,
            is_variadic: false,
            annotation_alias,
            default_text: self.default_text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation results
// ---------------------------------------------------------------------------

/// Placeholder emitted when nothing better can be synthesized.
pub const SENTINEL: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
    pub required_symbols: IndexSet<SymbolId>,
}

impl GenerationResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            required_symbols: IndexSet::new(),
        }
    }

    pub fn sentinel() -> Self {
        Self::new(SENTINEL)
    }

    pub fn requiring(text: impl Into<String>, symbol: SymbolId) -> Self {
        let mut result = Self::new(text);
        result.required_symbols.insert(symbol);
        result
    }

    pub fn is_sentinel(&self) -> bool {
        self.text == SENTINEL
    }

    pub fn contains_sentinel(&self) -> bool {
        self.text.contains(SENTINEL)
    }

    /// Merge another result's required symbols into this one.
    pub fn absorb(&mut self, other: &GenerationResult) {
        self.required_symbols
            .extend(other.required_symbols.iter().copied());
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Provenance bucket, highest priority first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TypeBucket {
    Own,
    ThirdParty,
    StandardLibrary,
    Builtin,
}

/// Structural preference among union members, most preferred first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Record,
    Collection,
    Class,
    Primitive,
    Literal,
    AnyLike,
    None,
}

// ---------------------------------------------------------------------------
// Options and requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulateMode {
    #[default]
    All,
    RequiredOnly,
}

impl std::str::FromStr for PopulateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(PopulateMode::All),
            "required" | "required_only" => Ok(PopulateMode::RequiredOnly),
            other => Err(format!("unknown populate mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulateOptions {
    pub mode: PopulateMode,
    pub recursive: bool,
    pub use_local_scope: bool,
    pub use_constructors: bool,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            mode: PopulateMode::All,
            recursive: true,
            use_local_scope: false,
            use_constructors: false,
        }
    }
}

impl PopulateOptions {
    pub fn required_only() -> Self {
        Self {
            mode: PopulateMode::RequiredOnly,
            ..Self::default()
        }
    }

    pub fn with_local_scope(mut self) -> Self {
        self.use_local_scope = true;
        self
    }

    pub fn with_constructors(mut self) -> Self {
        self.use_constructors = true;
        self
    }

    pub fn flat(mut self) -> Self {
        self.recursive = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionChoiceRequest {
    pub param_name: String,
    /// Sorted member names joined by `|`.
    pub signature: String,
    pub options: Vec<TypeId>,
}

/// Union signature -> rendered name of the chosen member.
pub type UnionSelections = IndexMap<String, String>;

// ---------------------------------------------------------------------------
// Call sites and bindings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub id: CallId,
    pub file: FileId,
    pub scope: ScopeId,
    pub callee_text: String,
    pub positional_args: usize,
    pub keyword_args: Vec<String>,
    pub unpacking_args: usize,
}

impl CallSite {
    pub fn has_unpacking(&self) -> bool {
        self.unpacking_args > 0
    }

    pub fn argument_count(&self) -> usize {
        self.positional_args + self.keyword_args.len() + self.unpacking_args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Parameter,
    Local,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
}
