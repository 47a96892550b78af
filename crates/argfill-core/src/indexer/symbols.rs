//! Definition, import, scope and call extraction from Python source.
//!
//! Two passes run over each tree. The definition pass collects what a module
//! exports: classes with their annotated fields and methods, functions,
//! module-level assignments and imports. The scope pass walks every statement
//! to record lexical bindings and every call expression together with the
//! byte offsets an editor needs.

use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tree_sitter::Node;

use crate::errors::ArgfillResult;
use crate::indexer::annotation::type_expr;
use crate::indexer::parser::{named_children, parse_python, ParsedSource};
use crate::models::BindingKind;

// ---------------------------------------------------------------------------
// Extracted types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedParameter {
    pub name: String,
    pub annotation: Option<String>,
    pub default: Option<String>,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFunction {
    pub name: String,
    pub parameters: Vec<ExtractedParameter>,
    /// Decorator callee names, e.g. `staticmethod` or `dataclasses.dataclass`.
    pub decorators: Vec<String>,
}

impl ExtractedFunction {
    pub fn has_decorator(&self, short: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| d.rsplit('.').next() == Some(short))
    }
}

/// An annotated class attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedField {
    pub name: String,
    pub annotation: String,
    pub default: Option<String>,
    /// Constructor keyword declared through `Field(alias=...)`.
    pub alias: Option<String>,
    pub kw_only: bool,
    /// False for `field(init=False)`: not a constructor keyword.
    pub init: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedClass {
    /// Dotted path inside the module, e.g. `Outer.Inner`.
    pub name: String,
    pub bases: Vec<String>,
    /// Class keywords such as `metaclass=...` or `total=False`.
    pub keywords: Vec<(String, String)>,
    pub decorators: Vec<String>,
    pub fields: Vec<ExtractedField>,
    pub methods: Vec<ExtractedFunction>,
}

impl ExtractedClass {
    pub fn method(&self, name: &str) -> Option<&ExtractedFunction> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn keyword(&self, name: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_decorator(&self, short: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| d.rsplit('.').next() == Some(short))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignedValue {
    /// `Name = NewType("Name", target)`
    NewType { target: String },
    Expression(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAssignment {
    pub name: String,
    pub annotation: Option<String>,
    pub value: AssignedValue,
}

/// One bound name from an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImport {
    /// Module path as written; relative imports keep their leading dots.
    pub module: String,
    /// Imported member for `from` imports, `None` for plain module imports.
    pub name: Option<String>,
    pub alias: Option<String>,
    pub line: usize,
}

impl ExtractedImport {
    /// Name this import binds in the importing module.
    pub fn bound_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .module
                .split('.')
                .next()
                .unwrap_or(&self.module)
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCall {
    pub callee_text: String,
    pub start: usize,
    pub end: usize,
    pub open_paren: usize,
    pub close_paren: usize,
    pub positional: usize,
    pub keywords: Vec<String>,
    pub unpacking: usize,
    /// End offset of the last existing argument.
    pub last_arg_end: Option<usize>,
    pub scope: usize,
    pub enclosing_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedScope {
    pub kind: ScopeKind,
    pub parent: Option<usize>,
    pub bindings: IndexMap<String, BindingKind>,
    /// Imports executed inside this scope; empty for the module scope,
    /// whose imports are in [`ParsedModule::imports`].
    pub imports: Vec<ExtractedImport>,
}

#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub path: String,
    pub module: String,
    pub is_package: bool,
    pub source: String,
    pub classes: Vec<ExtractedClass>,
    pub functions: Vec<ExtractedFunction>,
    pub assignments: Vec<ExtractedAssignment>,
    pub imports: Vec<ExtractedImport>,
    pub calls: Vec<ExtractedCall>,
    pub scopes: Vec<ExtractedScope>,
    /// Where a new import line goes.
    pub import_insert_offset: usize,
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Convert a relative file path to a dotted module name and whether the file
/// is a package initializer.
pub fn to_module_name(path: &str) -> (String, bool) {
    let without_ext = Path::new(path).with_extension("");
    let mut parts: Vec<&str> = without_ext
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os) => os.to_str(),
            _ => None,
        })
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    let is_package = parts.last() == Some(&"__init__");
    if is_package {
        parts.pop();
    }
    (parts.join("."), is_package)
}

static PY_FROM_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+([A-Za-z0-9_\.]+)\s+import\s+(.+)$").unwrap());

static PY_IMPORT_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+(.+)$").unwrap());

static ALIAS_CHUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_\.]+)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?$").unwrap()
});

/// Parse one import statement's text into bound names.
pub fn parse_import_statement(text: &str, line: usize) -> Vec<ExtractedImport> {
    let collapsed: String = text
        .replace(['(', ')', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(caps) = PY_FROM_ALIAS_RE.captures(&collapsed) {
        let module = caps[1].to_string();
        return caps[2]
            .split(',')
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty() && *chunk != "*")
            .filter_map(|chunk| ALIAS_CHUNK_RE.captures(chunk))
            .map(|item| ExtractedImport {
                module: module.clone(),
                name: Some(item[1].to_string()),
                alias: item.get(2).map(|m| m.as_str().to_string()),
                line,
            })
            .collect();
    }

    if let Some(caps) = PY_IMPORT_LIST_RE.captures(&collapsed) {
        return caps[1]
            .split(',')
            .map(str::trim)
            .filter_map(|chunk| ALIAS_CHUNK_RE.captures(chunk))
            .map(|item| ExtractedImport {
                module: item[1].to_string(),
                name: None,
                alias: item.get(2).map(|m| m.as_str().to_string()),
                line,
            })
            .collect();
    }

    Vec::new()
}

fn decorator_name<'t>(parsed: &ParsedSource, decorator: Node<'t>) -> (String, Option<Node<'t>>) {
    let Some(expr) = named_children(decorator).into_iter().next() else {
        return (String::new(), None);
    };
    if expr.kind() == "call" {
        let callee = expr
            .child_by_field_name("function")
            .map(|f| parsed.text(f).to_string())
            .unwrap_or_default();
        return (callee, expr.child_by_field_name("arguments"));
    }
    (parsed.text(expr).to_string(), None)
}

/// Keyword arguments of an `argument_list` as (name, value text) pairs.
fn keyword_arguments(parsed: &ParsedSource, args: Node<'_>) -> Vec<(String, String)> {
    named_children(args)
        .into_iter()
        .filter(|arg| arg.kind() == "keyword_argument")
        .filter_map(|arg| {
            let name = arg.child_by_field_name("name")?;
            let value = arg.child_by_field_name("value")?;
            Some((parsed.text(name).to_string(), parsed.text(value).to_string()))
        })
        .collect()
}

fn positional_arguments<'t>(args: Node<'t>) -> Vec<Node<'t>> {
    named_children(args)
        .into_iter()
        .filter(|arg| {
            !matches!(
                arg.kind(),
                "keyword_argument" | "list_splat" | "dictionary_splat"
            )
        })
        .collect()
}

fn string_contents(text: &str) -> String {
    let trimmed = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    trimmed.trim_matches(|c| c == '"' || c == '\'').to_string()
}

// ---------------------------------------------------------------------------
// Definition pass
// ---------------------------------------------------------------------------

const FIELD_FACTORIES: &[&str] = &["field", "Field", "ib", "attrib"];

struct DefinitionCollector<'p> {
    parsed: &'p ParsedSource,
    classes: Vec<ExtractedClass>,
    functions: Vec<ExtractedFunction>,
    assignments: Vec<ExtractedAssignment>,
    imports: Vec<ExtractedImport>,
    last_import_end: Option<usize>,
}

impl<'p> DefinitionCollector<'p> {
    fn new(parsed: &'p ParsedSource) -> Self {
        Self {
            parsed,
            classes: Vec::new(),
            functions: Vec::new(),
            assignments: Vec::new(),
            imports: Vec::new(),
            last_import_end: None,
        }
    }

    fn module_statements(&mut self, block: Node<'_>, top_level: bool) {
        for statement in named_children(block) {
            match statement.kind() {
                "import_statement" | "import_from_statement" | "future_import_statement" => {
                    let line = statement.start_position().row + 1;
                    self.imports
                        .extend(parse_import_statement(self.parsed.text(statement), line));
                    if top_level {
                        self.last_import_end = Some(statement.end_byte());
                    }
                }
                "class_definition" => self.class(statement, &[], ""),
                "function_definition" => {
                    let function = self.function(statement, Vec::new());
                    self.functions.push(function);
                }
                "decorated_definition" => self.decorated_module_definition(statement),
                "expression_statement" => {
                    for child in named_children(statement) {
                        if let Some(assignment) = self.assignment(child) {
                            self.assignments.push(assignment);
                        }
                    }
                }
                "type_alias_statement" => {
                    let left = statement.child_by_field_name("left");
                    let right = statement.child_by_field_name("right");
                    if let (Some(left), Some(right)) = (left, right) {
                        self.assignments.push(ExtractedAssignment {
                            name: self.parsed.text(left).to_string(),
                            annotation: Some("TypeAlias".to_string()),
                            value: AssignedValue::Expression(self.parsed.text(right).to_string()),
                        });
                    }
                }
                "if_statement" | "try_statement" | "with_statement" | "else_clause"
                | "elif_clause" | "except_clause" | "finally_clause" => {
                    self.nested_blocks(statement);
                }
                _ => {}
            }
        }
    }

    fn nested_blocks(&mut self, statement: Node<'_>) {
        for child in named_children(statement) {
            if child.kind() == "block" {
                self.module_statements(child, false);
            } else if child.kind().ends_with("_clause") {
                self.nested_blocks(child);
            }
        }
    }

    fn decorators(&self, decorated: Node<'_>) -> (Vec<String>, bool) {
        let mut names = Vec::new();
        let mut kw_only = false;
        for decorator in named_children(decorated)
            .into_iter()
            .filter(|n| n.kind() == "decorator")
        {
            let (name, args) = decorator_name(self.parsed, decorator);
            if let Some(args) = args {
                kw_only |= keyword_arguments(self.parsed, args)
                    .iter()
                    .any(|(k, v)| k == "kw_only" && v == "True");
            }
            names.push(name);
        }
        (names, kw_only)
    }

    fn decorated_module_definition(&mut self, decorated: Node<'_>) {
        let Some(definition) = decorated.child_by_field_name("definition") else {
            return;
        };
        let (decorators, kw_only) = self.decorators(decorated);
        match definition.kind() {
            "class_definition" => {
                let start = self.classes.len();
                self.class(definition, &decorators, "");
                if kw_only {
                    if let Some(class) = self.classes.get_mut(start) {
                        class.fields.iter_mut().for_each(|f| f.kw_only = true);
                    }
                }
            }
            "function_definition" => {
                let function = self.function(definition, decorators);
                self.functions.push(function);
            }
            _ => {}
        }
    }

    fn class(&mut self, node: Node<'_>, decorators: &[String], prefix: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = if prefix.is_empty() {
            self.parsed.text(name_node).to_string()
        } else {
            format!("{prefix}.{}", self.parsed.text(name_node))
        };

        let (bases, keywords) = match node.child_by_field_name("superclasses") {
            Some(args) => (
                positional_arguments(args)
                    .into_iter()
                    .map(|b| self.parsed.text(b).to_string())
                    .collect(),
                keyword_arguments(self.parsed, args),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let index = self.classes.len();
        self.classes.push(ExtractedClass {
            name: name.clone(),
            bases,
            keywords,
            decorators: decorators.to_vec(),
            fields: Vec::new(),
            methods: Vec::new(),
        });

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut kw_only = false;
        for statement in named_children(body) {
            match statement.kind() {
                "expression_statement" => {
                    for child in named_children(statement) {
                        if let Some(field) = self.field(child, &mut kw_only) {
                            self.classes[index].fields.push(field);
                        }
                    }
                }
                "function_definition" => {
                    let method = self.function(statement, Vec::new());
                    self.classes[index].methods.push(method);
                }
                "decorated_definition" => {
                    let Some(definition) = statement.child_by_field_name("definition") else {
                        continue;
                    };
                    let (inner_decorators, _) = self.decorators(statement);
                    match definition.kind() {
                        "function_definition" => {
                            let method = self.function(definition, inner_decorators);
                            self.classes[index].methods.push(method);
                        }
                        "class_definition" => self.class(definition, &inner_decorators, &name),
                        _ => {}
                    }
                }
                "class_definition" => self.class(statement, &[], &name),
                _ => {}
            }
        }
    }

    fn field(&self, node: Node<'_>, kw_only: &mut bool) -> Option<ExtractedField> {
        if node.kind() != "assignment" {
            return None;
        }
        let left = node.child_by_field_name("left")?;
        let annotation = node.child_by_field_name("type")?;
        if left.kind() != "identifier" {
            return None;
        }
        let parsed_annotation = type_expr(annotation, &self.parsed.source);
        let annotation = self.parsed.text(annotation).to_string();
        match parsed_annotation.head() {
            Some("KW_ONLY") => {
                *kw_only = true;
                return None;
            }
            Some("ClassVar") => return None,
            _ => {}
        }

        let mut field = ExtractedField {
            name: self.parsed.text(left).to_string(),
            annotation,
            default: None,
            alias: None,
            kw_only: *kw_only,
            init: true,
        };
        if let Some(value) = node.child_by_field_name("right") {
            self.field_value(value, &mut field);
        }
        Some(field)
    }

    fn field_value(&self, value: Node<'_>, field: &mut ExtractedField) {
        let text = self.parsed.text(value).to_string();
        let factory = value
            .child_by_field_name("function")
            .filter(|_| value.kind() == "call")
            .map(|f| self.parsed.text(f))
            .filter(|f| FIELD_FACTORIES.contains(&f.rsplit('.').next().unwrap_or(*f)));
        let args = value.child_by_field_name("arguments");
        let (Some(_), Some(args)) = (factory, args) else {
            field.default = Some(text);
            return;
        };

        for (key, arg) in keyword_arguments(self.parsed, args) {
            match key.as_str() {
                "default" | "default_factory" | "factory" => field.default = Some(arg),
                "alias" => field.alias = Some(string_contents(&arg)),
                "kw_only" => field.kw_only = arg == "True",
                "init" => field.init = arg != "False",
                _ => {}
            }
        }
        if field.default.is_none() {
            if let Some(first) = positional_arguments(args).first() {
                let first = self.parsed.text(*first);
                if first != "..." {
                    field.default = Some(first.to_string());
                }
            }
        }
    }

    fn function(&self, node: Node<'_>, decorators: Vec<String>) -> ExtractedFunction {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.parsed.text(n).to_string())
            .unwrap_or_default();
        let parameters = node
            .child_by_field_name("parameters")
            .map(|p| self.parameters(p))
            .unwrap_or_default();
        ExtractedFunction {
            name,
            parameters,
            decorators,
        }
    }

    fn parameters(&self, node: Node<'_>) -> Vec<ExtractedParameter> {
        let mut parameters: Vec<ExtractedParameter> = Vec::new();
        let mut keyword_only = false;
        let text = |n: Node<'_>| self.parsed.text(n).to_string();
        let default_kind = |keyword_only: bool| {
            if keyword_only {
                ParamKind::KeywordOnly
            } else {
                ParamKind::PositionalOrKeyword
            }
        };

        for child in named_children(node) {
            let param = match child.kind() {
                "identifier" => ExtractedParameter {
                    name: text(child),
                    annotation: None,
                    default: None,
                    kind: default_kind(keyword_only),
                },
                "typed_parameter" => {
                    let Some(inner) = named_children(child).into_iter().next() else {
                        continue;
                    };
                    let annotation = child.child_by_field_name("type").map(text);
                    let (name, kind) = match inner.kind() {
                        "list_splat_pattern" => {
                            keyword_only = true;
                            (splat_name(self.parsed, inner), ParamKind::VarPositional)
                        }
                        "dictionary_splat_pattern" => {
                            (splat_name(self.parsed, inner), ParamKind::VarKeyword)
                        }
                        _ => (text(inner), default_kind(keyword_only)),
                    };
                    ExtractedParameter {
                        name,
                        annotation,
                        default: None,
                        kind,
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    ExtractedParameter {
                        name: text(name),
                        annotation: child.child_by_field_name("type").map(text),
                        default: child.child_by_field_name("value").map(text),
                        kind: default_kind(keyword_only),
                    }
                }
                "list_splat_pattern" => {
                    keyword_only = true;
                    ExtractedParameter {
                        name: splat_name(self.parsed, child),
                        annotation: None,
                        default: None,
                        kind: ParamKind::VarPositional,
                    }
                }
                "dictionary_splat_pattern" => ExtractedParameter {
                    name: splat_name(self.parsed, child),
                    annotation: None,
                    default: None,
                    kind: ParamKind::VarKeyword,
                },
                "keyword_separator" => {
                    keyword_only = true;
                    continue;
                }
                "positional_separator" => {
                    for previous in parameters.iter_mut() {
                        previous.kind = ParamKind::PositionalOnly;
                    }
                    continue;
                }
                _ => continue,
            };
            parameters.push(param);
        }
        parameters
    }

    fn assignment(&self, node: Node<'_>) -> Option<ExtractedAssignment> {
        if node.kind() != "assignment" {
            return None;
        }
        let left = node.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let annotation = node
            .child_by_field_name("type")
            .map(|t| self.parsed.text(t).to_string());
        let value = match node.child_by_field_name("right") {
            Some(right) => self.assigned_value(right),
            None => AssignedValue::Missing,
        };
        Some(ExtractedAssignment {
            name: self.parsed.text(left).to_string(),
            annotation,
            value,
        })
    }

    fn assigned_value(&self, right: Node<'_>) -> AssignedValue {
        if right.kind() == "call" {
            let callee = right
                .child_by_field_name("function")
                .map(|f| self.parsed.text(f))
                .unwrap_or("");
            if callee.rsplit('.').next() == Some("NewType") {
                let target = right
                    .child_by_field_name("arguments")
                    .map(positional_arguments)
                    .and_then(|args| args.get(1).copied());
                if let Some(target) = target {
                    return AssignedValue::NewType {
                        target: self.parsed.text(target).to_string(),
                    };
                }
            }
        }
        AssignedValue::Expression(self.parsed.text(right).to_string())
    }
}

fn splat_name(parsed: &ParsedSource, node: Node<'_>) -> String {
    named_children(node)
        .into_iter()
        .next()
        .map(|n| parsed.text(n).to_string())
        .unwrap_or_default()
}

/// Offset after the last top-level import, else after a module docstring.
fn docstring_end(parsed: &ParsedSource) -> usize {
    let Some(first) = named_children(parsed.root()).into_iter().next() else {
        return 0;
    };
    let is_docstring = first.kind() == "expression_statement"
        && named_children(first)
            .first()
            .is_some_and(|n| n.kind() == "string");
    if is_docstring {
        first.end_byte()
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Scope and call pass
// ---------------------------------------------------------------------------

struct ScopeWalker<'p> {
    parsed: &'p ParsedSource,
    scopes: Vec<ExtractedScope>,
    calls: Vec<ExtractedCall>,
}

impl<'p> ScopeWalker<'p> {
    fn new(parsed: &'p ParsedSource) -> Self {
        Self {
            parsed,
            scopes: vec![ExtractedScope {
                kind: ScopeKind::Module,
                parent: None,
                bindings: IndexMap::new(),
                imports: Vec::new(),
            }],
            calls: Vec::new(),
        }
    }

    fn push_scope(&mut self, kind: ScopeKind, parent: usize) -> usize {
        self.scopes.push(ExtractedScope {
            kind,
            parent: Some(parent),
            bindings: IndexMap::new(),
            imports: Vec::new(),
        });
        self.scopes.len() - 1
    }

    fn bind(&mut self, scope: usize, name: &str) {
        let kind = match self.scopes[scope].kind {
            ScopeKind::Module => BindingKind::Global,
            _ => BindingKind::Local,
        };
        self.scopes[scope]
            .bindings
            .entry(name.to_string())
            .or_insert(kind);
    }

    fn bind_targets(&mut self, scope: usize, target: Node<'_>) {
        match target.kind() {
            "identifier" => {
                let name = self.parsed.text(target).to_string();
                self.bind(scope, &name);
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
            | "as_pattern_target" => {
                for child in named_children(target) {
                    self.bind_targets(scope, child);
                }
            }
            _ => {}
        }
    }

    fn walk(&mut self, node: Node<'_>, scope: usize, class_path: Option<&str>) {
        match node.kind() {
            "function_definition" => return self.function(node, scope, class_path),
            "class_definition" => return self.class(node, scope, class_path),
            "call" => self.record_call(node, scope, class_path),
            "assignment" | "augmented_assignment" | "for_statement" | "for_in_clause" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.bind_targets(scope, left);
                }
            }
            "named_expression" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.bind_targets(scope, name);
                }
            }
            "as_pattern" => {
                if let Some(alias) = node.child_by_field_name("alias") {
                    self.bind_targets(scope, alias);
                }
            }
            "import_statement" | "import_from_statement" => {
                let line = node.start_position().row + 1;
                for import in parse_import_statement(self.parsed.text(node), line) {
                    self.bind(scope, &import.bound_name());
                    if self.scopes[scope].kind != ScopeKind::Module {
                        self.scopes[scope].imports.push(import);
                    }
                }
                return;
            }
            _ => {}
        }
        for child in named_children(node) {
            self.walk(child, scope, class_path);
        }
    }

    fn function(&mut self, node: Node<'_>, scope: usize, class_path: Option<&str>) {
        if let Some(name) = node.child_by_field_name("name") {
            let name = self.parsed.text(name).to_string();
            self.bind(scope, &name);
        }
        let inner = self.push_scope(ScopeKind::Function, scope);
        if let Some(parameters) = node.child_by_field_name("parameters") {
            for param in named_children(parameters) {
                let name_node = match param.kind() {
                    "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => Some(param),
                    "default_parameter" | "typed_default_parameter" => {
                        if let Some(value) = param.child_by_field_name("value") {
                            self.walk(value, scope, class_path);
                        }
                        param.child_by_field_name("name")
                    }
                    "typed_parameter" => named_children(param).into_iter().next(),
                    _ => None,
                };
                let Some(name_node) = name_node else { continue };
                let name = match name_node.kind() {
                    "list_splat_pattern" | "dictionary_splat_pattern" => {
                        splat_name(self.parsed, name_node)
                    }
                    _ => self.parsed.text(name_node).to_string(),
                };
                self.scopes[inner]
                    .bindings
                    .insert(name, BindingKind::Parameter);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, inner, class_path);
        }
    }

    fn class(&mut self, node: Node<'_>, scope: usize, class_path: Option<&str>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.parsed.text(n).to_string())
            .unwrap_or_default();
        self.bind(scope, &name);
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            self.walk(superclasses, scope, class_path);
        }
        let path = match (class_path, self.scopes[scope].kind) {
            (Some(outer), ScopeKind::Class) => format!("{outer}.{name}"),
            _ => name,
        };
        let inner = self.push_scope(ScopeKind::Class, scope);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, inner, Some(&path));
        }
    }

    fn record_call(&mut self, node: Node<'_>, scope: usize, class_path: Option<&str>) {
        let (Some(function), Some(args)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return;
        };
        let source = self.parsed.source.as_bytes();
        let open_paren = args.start_byte();
        let close_paren = args.end_byte().saturating_sub(1);
        if source.get(open_paren) != Some(&b'(') || source.get(close_paren) != Some(&b')') {
            return;
        }

        let mut positional = 0;
        let mut keywords = Vec::new();
        let mut unpacking = 0;
        let mut last_arg_end = None;
        if args.kind() == "generator_expression" {
            positional = 1;
            last_arg_end = Some(close_paren);
        } else {
            for arg in named_children(args) {
                match arg.kind() {
                    "keyword_argument" => {
                        if let Some(name) = arg.child_by_field_name("name") {
                            keywords.push(self.parsed.text(name).to_string());
                        }
                    }
                    "list_splat" | "dictionary_splat" => unpacking += 1,
                    _ => positional += 1,
                }
                last_arg_end = Some(arg.end_byte());
            }
        }

        self.calls.push(ExtractedCall {
            callee_text: self.parsed.text(function).to_string(),
            start: node.start_byte(),
            end: node.end_byte(),
            open_paren,
            close_paren,
            positional,
            keywords,
            unpacking,
            last_arg_end,
            scope,
            enclosing_class: class_path.map(str::to_string),
        });
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse and extract one Python module.
pub fn extract_module(path: &str, source: String) -> ArgfillResult<ParsedModule> {
    let parsed = parse_python(path, source)?;
    let (module, is_package) = to_module_name(path);

    let mut definitions = DefinitionCollector::new(&parsed);
    definitions.module_statements(parsed.root(), true);
    let import_insert_offset = definitions
        .last_import_end
        .unwrap_or_else(|| docstring_end(&parsed));

    let mut walker = ScopeWalker::new(&parsed);
    walker.walk(parsed.root(), 0, None);

    Ok(ParsedModule {
        path: path.to_string(),
        module,
        is_package,
        classes: definitions.classes,
        functions: definitions.functions,
        assignments: definitions.assignments,
        imports: definitions.imports,
        calls: walker.calls,
        scopes: walker.scopes,
        import_insert_offset,
        source: parsed.source,
    })
}
