//! In-memory project model built from parsed modules.
//!
//! Files, classes, functions, module-level assignments, scopes and calls are
//! stored in flat arenas addressed by index. Names are resolved lazily
//! through each file's namespace and its imports; annotation types are
//! resolved once at build time and interned in a [`TypeArena`].

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::indexer::annotation::{parse_annotation, TypeExpr};
use crate::indexer::imports::{absolute_module, split_qualified};
use crate::indexer::pipeline::{load_sources, parallel_extract, SourceText, DEFAULT_WORKERS};
use crate::indexer::symbols::{
    AssignedValue, ExtractedAssignment, ExtractedClass, ExtractedField, ExtractedFunction,
    ExtractedImport, ParamKind, ParsedModule, ScopeKind,
};
use crate::models::{
    BindingKind, CallId, CallSite, CollectionKind, FieldDescriptor, FileId, ParameterDescriptor,
    ScopeId, Symbol, SymbolId, SymbolKind, TypeId,
};
use crate::store::types::{SymbolInterner, TypeArena, TypeNode};

/// Bound on import hops, base-class walks and alias expansion.
const MAX_RESOLUTION_HOPS: usize = 16;

const TYPING_MODULES: &[&str] = &["typing", "typing_extensions", "collections.abc", "collections"];

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Definition {
    Class(usize),
    Function(usize),
    Assignment(usize),
    Import(usize),
}

#[derive(Debug)]
pub struct SourceFile {
    pub id: FileId,
    pub path: String,
    pub module: String,
    pub is_package: bool,
    pub text: String,
    pub import_insert_offset: usize,
    pub imports: Vec<ExtractedImport>,
    namespace: IndexMap<String, Definition>,
}

#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub function: ExtractedFunction,
    /// Declared type per parameter, `None` when unannotated.
    pub types: Vec<Option<TypeId>>,
}

impl ResolvedFunction {
    fn unresolved(function: ExtractedFunction) -> Self {
        Self {
            function,
            types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub field: ExtractedField,
    pub ty: TypeId,
    pub alias_symbol: Option<SymbolId>,
}

#[derive(Debug)]
pub struct ClassInfo {
    pub symbol: SymbolId,
    pub qualified_name: String,
    pub file: FileId,
    pub class: ExtractedClass,
    pub fields: Vec<ResolvedField>,
    pub methods: Vec<ResolvedFunction>,
}

#[derive(Debug)]
pub struct FunctionInfo {
    pub file: FileId,
    pub function: ResolvedFunction,
}

#[derive(Debug)]
pub struct AssignmentInfo {
    pub file: FileId,
    pub assignment: ExtractedAssignment,
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub site: CallSite,
    pub start: usize,
    pub end: usize,
    pub open_paren: usize,
    pub close_paren: usize,
    pub last_arg_end: Option<usize>,
    pub enclosing_class: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScopeRecord {
    pub file: FileId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub bindings: IndexMap<String, BindingKind>,
    pub imports: Vec<ExtractedImport>,
}

/// What a name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Class(usize),
    Function(usize),
    Assignment(usize),
    Module(String),
    /// Something outside the project, by qualified name.
    External(String),
    Builtin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    /// Marked by a class decorator; subclasses are not records by inheritance.
    Decorator,
    /// A record base, metaclass or transform base; subclasses are records too.
    Inherited,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Project {
    config: EngineConfig,
    files: Vec<SourceFile>,
    modules: HashMap<String, FileId>,
    classes: Vec<ClassInfo>,
    class_paths: HashMap<(FileId, String), usize>,
    class_by_symbol: HashMap<SymbolId, usize>,
    functions: Vec<FunctionInfo>,
    assignments: Vec<AssignmentInfo>,
    calls: Vec<CallRecord>,
    scopes: Vec<ScopeRecord>,
    types: TypeArena,
    symbols: SymbolInterner,
}

impl Project {
    pub fn from_sources<I, P, S>(sources: I, config: &EngineConfig) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<String>,
        S: Into<String>,
    {
        let sources: Vec<SourceText> = sources
            .into_iter()
            .map(|(p, s)| (p.into(), s.into()))
            .collect();
        Self::build(parallel_extract(&sources, DEFAULT_WORKERS), config)
    }

    pub fn load(root: &Path, config: &EngineConfig) -> Self {
        let sources = load_sources(root);
        info!("Loaded {} Python files from {}", sources.len(), root.display());
        Self::build(parallel_extract(&sources, DEFAULT_WORKERS), config)
    }

    pub fn build(modules: Vec<ParsedModule>, config: &EngineConfig) -> Self {
        let mut project = Project {
            config: config.clone(),
            files: Vec::with_capacity(modules.len()),
            modules: HashMap::new(),
            classes: Vec::new(),
            class_paths: HashMap::new(),
            class_by_symbol: HashMap::new(),
            functions: Vec::new(),
            assignments: Vec::new(),
            calls: Vec::new(),
            scopes: Vec::new(),
            types: TypeArena::default(),
            symbols: SymbolInterner::default(),
        };
        for module in modules {
            project.register(module);
        }
        project.resolve_types();
        debug!(
            "Project built: {} files, {} classes, {} calls, {} types",
            project.files.len(),
            project.classes.len(),
            project.calls.len(),
            project.types.len()
        );
        project
    }

    fn register(&mut self, parsed: ParsedModule) {
        let file = FileId(self.files.len() as u32);
        if self.modules.contains_key(&parsed.module) {
            warn!("Module {} defined twice; keeping the first", parsed.module);
        } else {
            self.modules.insert(parsed.module.clone(), file);
        }

        let mut namespace = IndexMap::new();
        for (i, import) in parsed.imports.iter().enumerate() {
            namespace.insert(import.bound_name(), Definition::Import(i));
        }
        for assignment in parsed.assignments {
            namespace.insert(
                assignment.name.clone(),
                Definition::Assignment(self.assignments.len()),
            );
            self.assignments.push(AssignmentInfo { file, assignment });
        }
        for function in parsed.functions {
            namespace.insert(
                function.name.clone(),
                Definition::Function(self.functions.len()),
            );
            self.functions.push(FunctionInfo {
                file,
                function: ResolvedFunction::unresolved(function),
            });
        }
        for class in parsed.classes {
            let index = self.classes.len();
            let qualified_name = qualify(&parsed.module, &class.name);
            let symbol = self
                .symbols
                .intern(&qualified_name, &parsed.module, SymbolKind::Class);
            if !class.name.contains('.') {
                namespace.insert(class.name.clone(), Definition::Class(index));
            }
            self.class_paths.insert((file, class.name.clone()), index);
            self.class_by_symbol.insert(symbol, index);
            let methods = class
                .methods
                .iter()
                .cloned()
                .map(ResolvedFunction::unresolved)
                .collect();
            self.classes.push(ClassInfo {
                symbol,
                qualified_name,
                file,
                class,
                fields: Vec::new(),
                methods,
            });
        }

        let scope_base = self.scopes.len();
        for scope in parsed.scopes {
            self.scopes.push(ScopeRecord {
                file,
                kind: scope.kind,
                parent: scope.parent.map(|p| ScopeId((scope_base + p) as u32)),
                bindings: scope.bindings,
                imports: scope.imports,
            });
        }
        for call in parsed.calls {
            let site = CallSite {
                id: CallId(self.calls.len() as u32),
                file,
                scope: ScopeId((scope_base + call.scope) as u32),
                callee_text: call.callee_text,
                positional_args: call.positional,
                keyword_args: call.keywords,
                unpacking_args: call.unpacking,
            };
            self.calls.push(CallRecord {
                site,
                start: call.start,
                end: call.end,
                open_paren: call.open_paren,
                close_paren: call.close_paren,
                last_arg_end: call.last_arg_end,
                enclosing_class: call.enclosing_class,
            });
        }

        self.files.push(SourceFile {
            id: file,
            path: parsed.path,
            module: parsed.module,
            is_package: parsed.is_package,
            text: parsed.source,
            import_insert_offset: parsed.import_insert_offset,
            imports: parsed.imports,
            namespace,
        });
    }

    fn resolve_types(&mut self) {
        let mut types = std::mem::take(&mut self.types);
        let mut symbols = std::mem::take(&mut self.symbols);
        let resolved = {
            let mut resolver = TypeResolver {
                project: self,
                types: &mut types,
                symbols: &mut symbols,
            };
            resolver.resolve_all()
        };
        self.types = types;
        self.symbols = symbols;

        for (class, (fields, methods)) in self.classes.iter_mut().zip(resolved.classes) {
            class.fields = fields;
            for (method, types) in class.methods.iter_mut().zip(methods) {
                method.types = types;
            }
        }
        for (function, types) in self.functions.iter_mut().zip(resolved.functions) {
            function.function.types = types;
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.index())
    }

    pub fn file_by_path(&self, path: &str) -> Option<&SourceFile> {
        let wanted = normalize_path(path);
        self.files.iter().find(|f| normalize_path(&f.path) == wanted)
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    pub fn call(&self, id: CallId) -> Option<&CallRecord> {
        self.calls.get(id.index())
    }

    /// Innermost call in `file` whose text contains `offset`.
    pub fn call_at(&self, file: FileId, offset: usize) -> Option<&CallRecord> {
        self.calls
            .iter()
            .filter(|c| c.site.file == file && c.start <= offset && offset <= c.end)
            .min_by_key(|c| c.end - c.start)
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ScopeRecord> {
        self.scopes.get(id.index())
    }

    pub fn type_node(&self, id: TypeId) -> &TypeNode {
        self.types.get(id)
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn class(&self, index: usize) -> Option<&ClassInfo> {
        self.classes.get(index)
    }

    pub fn class_for_symbol(&self, symbol: SymbolId) -> Option<usize> {
        self.class_by_symbol.get(&symbol).copied()
    }

    pub fn class_at_path(&self, file: FileId, path: &str) -> Option<usize> {
        self.class_paths.get(&(file, path.to_string())).copied()
    }

    pub fn function(&self, index: usize) -> Option<&FunctionInfo> {
        self.functions.get(index)
    }

    pub fn is_project_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    // -----------------------------------------------------------------------
    // Name resolution
    // -----------------------------------------------------------------------

    /// Resolve a possibly dotted name as seen from `file`'s module scope.
    pub fn resolve(&self, file: FileId, dotted: &str) -> Option<Entity> {
        let mut segments = dotted.split('.').map(str::trim);
        let first = segments.next().filter(|s| !s.is_empty())?;
        let mut entity = self
            .namespace_entity(file, first, 0)
            .or_else(|| self.builtin_entity(first))?;
        for segment in segments {
            entity = self.member(entity, segment, 0)?;
        }
        Some(entity)
    }

    /// Resolve a possibly dotted name as seen from inside `scope`. Imports
    /// executed in an enclosing function or class body take precedence over
    /// the module namespace; other local bindings resolve to nothing.
    pub fn resolve_from(&self, scope: ScopeId, dotted: &str) -> Option<Entity> {
        let file = self.scope(scope)?.file;
        let (first, rest) = match dotted.split_once('.') {
            Some((first, rest)) => (first.trim(), Some(rest)),
            None => (dotted.trim(), None),
        };
        let Some((bound_in, _)) = self.lookup(first, scope) else {
            return self.resolve(file, dotted);
        };
        let record = self.scope(bound_in)?;
        if record.kind == ScopeKind::Module {
            return self.resolve(file, dotted);
        }
        let import = record
            .imports
            .iter()
            .rev()
            .find(|import| import.bound_name() == first)?;
        let mut entity = self.import_entity(self.file(file)?, import, 0)?;
        for segment in rest.into_iter().flat_map(|rest| rest.split('.')) {
            entity = self.member(entity, segment.trim(), 0)?;
        }
        Some(entity)
    }

    fn builtin_entity(&self, name: &str) -> Option<Entity> {
        self.config
            .is_builtin_name(name)
            .then(|| Entity::Builtin(name.to_string()))
    }

    fn namespace_entity(&self, file: FileId, name: &str, depth: usize) -> Option<Entity> {
        if depth > MAX_RESOLUTION_HOPS {
            return None;
        }
        let source = self.file(file)?;
        match *source.namespace.get(name)? {
            Definition::Class(i) => Some(Entity::Class(i)),
            Definition::Function(i) => Some(Entity::Function(i)),
            Definition::Assignment(i) => Some(Entity::Assignment(i)),
            Definition::Import(i) => self.import_entity(source, &source.imports[i], depth + 1),
        }
    }

    fn import_entity(
        &self,
        source: &SourceFile,
        import: &ExtractedImport,
        depth: usize,
    ) -> Option<Entity> {
        let module = absolute_module(&source.module, source.is_package, &import.module)?;
        match (&import.name, &import.alias) {
            (Some(name), _) => self.member(Entity::Module(module), name, depth),
            (None, Some(_)) => Some(Entity::Module(module)),
            (None, None) => {
                let top = module.split('.').next().unwrap_or(&module).to_string();
                Some(Entity::Module(top))
            }
        }
    }

    fn member(&self, entity: Entity, name: &str, depth: usize) -> Option<Entity> {
        match entity {
            Entity::Module(module) => {
                let submodule = qualify(&module, name);
                match self.modules.get(&module) {
                    Some(&file) => self
                        .namespace_entity(file, name, depth + 1)
                        .or_else(|| {
                            self.is_project_module(&submodule)
                                .then_some(Entity::Module(submodule))
                        }),
                    None if self.is_project_module(&submodule) => Some(Entity::Module(submodule)),
                    None => Some(Entity::External(submodule)),
                }
            }
            Entity::External(qualified) => Some(Entity::External(qualify(&qualified, name))),
            Entity::Class(i) => {
                let class = self.classes.get(i)?;
                self.class_at_path(class.file, &format!("{}.{name}", class.class.name))
                    .map(Entity::Class)
            }
            Entity::Function(_) | Entity::Assignment(_) | Entity::Builtin(_) => None,
        }
    }

    /// Dotted name an entity is known by.
    pub fn qualified(&self, entity: &Entity) -> String {
        match entity {
            Entity::Class(i) => self
                .classes
                .get(*i)
                .map(|c| c.qualified_name.clone())
                .unwrap_or_default(),
            Entity::Function(i) => self
                .functions
                .get(*i)
                .and_then(|f| Some(qualify(&self.file(f.file)?.module, &f.function.function.name)))
                .unwrap_or_default(),
            Entity::Assignment(i) => self
                .assignments
                .get(*i)
                .and_then(|a| Some(qualify(&self.file(a.file)?.module, &a.assignment.name)))
                .unwrap_or_default(),
            Entity::Module(name) | Entity::External(name) | Entity::Builtin(name) => name.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    /// Resolved bases of a class, generic arguments stripped.
    pub fn class_bases(&self, index: usize) -> Vec<(String, Option<Entity>)> {
        let Some(class) = self.classes.get(index) else {
            return Vec::new();
        };
        class
            .class
            .bases
            .iter()
            .map(|base| {
                let raw = base.split('[').next().unwrap_or(base).trim().to_string();
                let entity = self.resolve(class.file, &raw);
                (raw, entity)
            })
            .collect()
    }

    fn is_transform_marked(&self, entity: &Option<Entity>) -> bool {
        match entity {
            Some(Entity::Class(i)) => self
                .classes
                .get(*i)
                .is_some_and(|c| c.class.has_decorator("dataclass_transform")),
            Some(Entity::Function(i)) => self
                .functions
                .get(*i)
                .is_some_and(|f| f.function.function.has_decorator("dataclass_transform")),
            _ => false,
        }
    }

    /// How a class became a record, if it is one.
    pub fn record_origin(&self, index: usize) -> Option<RecordOrigin> {
        self.record_origin_at(index, 0)
    }

    fn record_origin_at(&self, index: usize, depth: usize) -> Option<RecordOrigin> {
        if depth > MAX_RESOLUTION_HOPS {
            return None;
        }
        let class = self.classes.get(index)?;

        for decorator in &class.class.decorators {
            let entity = self.resolve(class.file, decorator);
            let qualified = entity.as_ref().map(|e| self.qualified(e));
            if self
                .config
                .is_record_decorator(decorator, qualified.as_deref())
                || self.is_transform_marked(&entity)
            {
                return Some(RecordOrigin::Decorator);
            }
        }

        for (raw, entity) in self.class_bases(index) {
            let qualified = entity.as_ref().map(|e| self.qualified(e));
            if self.config.is_record_base(&raw, qualified.as_deref())
                || self.is_transform_marked(&entity)
            {
                return Some(RecordOrigin::Inherited);
            }
            if let Some(Entity::Class(base)) = entity {
                if self.record_origin_at(base, depth + 1) == Some(RecordOrigin::Inherited) {
                    return Some(RecordOrigin::Inherited);
                }
            }
        }

        if let Some(metaclass) = class.class.keyword("metaclass") {
            let entity = self.resolve(class.file, metaclass);
            if self.is_transform_marked(&entity) {
                return Some(RecordOrigin::Inherited);
            }
        }
        None
    }

    /// Fields of a record, inherited record fields first. An override keeps
    /// the position of the field it replaces.
    pub fn record_fields(&self, index: usize) -> Vec<FieldDescriptor> {
        self.record_fields_at(index, 0).into_values().collect()
    }

    fn record_fields_at(&self, index: usize, depth: usize) -> IndexMap<String, FieldDescriptor> {
        let mut fields = IndexMap::new();
        let Some(class) = self.classes.get(index) else {
            return fields;
        };
        if depth > MAX_RESOLUTION_HOPS {
            return fields;
        }
        for (_, entity) in self.class_bases(index).into_iter().rev() {
            if let Some(Entity::Class(base)) = entity {
                if self.record_origin_at(base, depth + 1).is_some() {
                    fields.extend(self.record_fields_at(base, depth + 1));
                }
            }
        }
        for resolved in &class.fields {
            let field = &resolved.field;
            if self.config.is_config_marker(&field.name) {
                continue;
            }
            if !field.init {
                fields.shift_remove(&field.name);
                continue;
            }
            fields.insert(
                field.name.clone(),
                FieldDescriptor {
                    name: field.alias.clone().unwrap_or_else(|| field.name.clone()),
                    declared_type: resolved.ty,
                    alias_symbol: resolved.alias_symbol,
                    default_text: field.default.clone(),
                    is_keyword_only: field.kw_only,
                },
            );
        }
        fields
    }

    /// Parameters the class constructor accepts, receiver removed: an own
    /// `__init__`, else the record fields, else the first base that has some.
    pub fn constructor_parameters(&self, index: usize) -> Option<Vec<ParameterDescriptor>> {
        self.constructor_parameters_at(index, 0)
    }

    fn constructor_parameters_at(
        &self,
        index: usize,
        depth: usize,
    ) -> Option<Vec<ParameterDescriptor>> {
        if depth > MAX_RESOLUTION_HOPS {
            return None;
        }
        let class = self.classes.get(index)?;
        if let Some(init) = class.methods.iter().find(|m| m.function.name == "__init__") {
            return Some(parameters_of(init, true));
        }
        if self.record_origin_at(index, depth).is_some() {
            return Some(
                self.record_fields(index)
                    .iter()
                    .map(|f| f.to_parameter(f.alias_symbol))
                    .collect(),
            );
        }
        self.class_bases(index)
            .into_iter()
            .find_map(|(_, entity)| match entity {
                Some(Entity::Class(base)) => self.constructor_parameters_at(base, depth + 1),
                _ => None,
            })
    }

    /// Method lookup through the class and its project bases, depth first.
    pub fn find_method(&self, index: usize, name: &str) -> Option<&ResolvedFunction> {
        self.find_method_at(index, name, 0)
    }

    fn find_method_at(&self, index: usize, name: &str, depth: usize) -> Option<&ResolvedFunction> {
        if depth > MAX_RESOLUTION_HOPS {
            return None;
        }
        let class = self.classes.get(index)?;
        if let Some(method) = class.methods.iter().find(|m| m.function.name == name) {
            return Some(method);
        }
        self.class_bases(index)
            .into_iter()
            .find_map(|(_, entity)| match entity {
                Some(Entity::Class(base)) => self.find_method_at(base, name, depth + 1),
                _ => None,
            })
    }

    /// Whether a builtin type other than `object` is among the ancestors.
    pub fn derives_from_builtin(&self, index: usize) -> bool {
        self.derives_from_builtin_at(index, 0)
    }

    fn derives_from_builtin_at(&self, index: usize, depth: usize) -> bool {
        if depth > MAX_RESOLUTION_HOPS {
            return false;
        }
        self.class_bases(index)
            .into_iter()
            .any(|(_, entity)| match entity {
                Some(Entity::Builtin(name)) => name != "object",
                Some(Entity::Class(base)) => self.derives_from_builtin_at(base, depth + 1),
                _ => false,
            })
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    /// Look `name` up from `scope` outwards. Enclosing class bodies are
    /// skipped, as they are not visible from nested functions.
    pub fn lookup(&self, name: &str, scope: ScopeId) -> Option<(ScopeId, BindingKind)> {
        let mut current = Some(scope);
        let mut first = true;
        while let Some(id) = current {
            let record = self.scope(id)?;
            if first || record.kind != ScopeKind::Class {
                if let Some(&kind) = record.bindings.get(name) {
                    return Some((id, kind));
                }
            }
            first = false;
            current = record.parent;
        }
        None
    }
}

/// Descriptors for a function's parameters. A bound receiver is dropped
/// unless the function is a staticmethod.
pub fn parameters_of(function: &ResolvedFunction, bound: bool) -> Vec<ParameterDescriptor> {
    let skip = usize::from(bound && !function.function.has_decorator("staticmethod"));
    function
        .function
        .parameters
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, param)| ParameterDescriptor {
            name: param.name.clone(),
            declared_type: function.types.get(i).copied().flatten(),
            has_default: param.default.is_some(),
            is_positional: param.kind == ParamKind::PositionalOnly,
            is_keyword_only: param.kind == ParamKind::KeywordOnly,
            is_variadic: matches!(param.kind, ParamKind::VarPositional | ParamKind::VarKeyword),
            annotation_alias: None,
            default_text: param.default.clone(),
        })
        .collect()
}

fn qualify(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{module}.{name}")
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

// ---------------------------------------------------------------------------
// Annotation resolution
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ResolvedTypes {
    classes: Vec<(Vec<ResolvedField>, Vec<Vec<Option<TypeId>>>)>,
    functions: Vec<Vec<Option<TypeId>>>,
}

struct TypeResolver<'a> {
    project: &'a Project,
    types: &'a mut TypeArena,
    symbols: &'a mut SymbolInterner,
}

impl TypeResolver<'_> {
    fn resolve_all(&mut self) -> ResolvedTypes {
        let project = self.project;
        let mut resolved = ResolvedTypes::default();
        for class in &project.classes {
            let fields = class
                .class
                .fields
                .iter()
                .map(|field| {
                    let ty = self.annotation(class.file, &field.annotation);
                    let alias_symbol = match self.types.get(ty) {
                        TypeNode::Alias(symbol) => Some(*symbol),
                        _ => None,
                    };
                    ResolvedField {
                        field: field.clone(),
                        ty,
                        alias_symbol,
                    }
                })
                .collect();
            let methods = class
                .methods
                .iter()
                .map(|m| self.parameter_types(class.file, &m.function))
                .collect();
            resolved.classes.push((fields, methods));
        }
        for function in &project.functions {
            let types = self.parameter_types(function.file, &function.function.function);
            resolved.functions.push(types);
        }
        resolved
    }

    fn parameter_types(&mut self, file: FileId, function: &ExtractedFunction) -> Vec<Option<TypeId>> {
        function
            .parameters
            .iter()
            .map(|p| p.annotation.as_deref().map(|a| self.annotation(file, a)))
            .collect()
    }

    fn annotation(&mut self, file: FileId, text: &str) -> TypeId {
        self.expr(file, &parse_annotation(text), 0)
    }

    fn expr(&mut self, file: FileId, expr: &TypeExpr, depth: usize) -> TypeId {
        if depth > MAX_RESOLUTION_HOPS {
            return self.types.intern(TypeNode::Unknown);
        }
        match expr {
            TypeExpr::None => self.types.intern(TypeNode::NoneType),
            TypeExpr::Str(text) => self.expr(file, &parse_annotation(text), depth + 1),
            TypeExpr::Union(items) => self.union(file, items, depth),
            TypeExpr::Name(name) => self.named(file, name, &[], depth),
            TypeExpr::Subscript { base, args } => self.named(file, base, args, depth),
            TypeExpr::Ellipsis
            | TypeExpr::Number(_)
            | TypeExpr::List(_)
            | TypeExpr::Other(_)
            | TypeExpr::Invalid(_) => self.types.intern(TypeNode::Unknown),
        }
    }

    fn union(&mut self, file: FileId, items: &[TypeExpr], depth: usize) -> TypeId {
        let members: Vec<TypeId> = items
            .iter()
            .map(|item| self.expr(file, item, depth + 1))
            .collect();
        match members.as_slice() {
            [single] => *single,
            _ => self.types.intern(TypeNode::Union(members)),
        }
    }

    fn named(&mut self, file: FileId, name: &str, args: &[TypeExpr], depth: usize) -> TypeId {
        let project = self.project;
        let entity = project.resolve(file, name);
        let special = match &entity {
            Some(Entity::External(qualified)) => {
                let (module, short) = split_qualified(qualified);
                TYPING_MODULES.contains(&module).then_some(short)
            }
            None => name.rsplit('.').next(),
            _ => None,
        };
        if let Some(form) = special {
            if let Some(ty) = self.special_form(file, form, args, depth) {
                return ty;
            }
        }

        let node = match entity {
            Some(Entity::Builtin(builtin)) => return self.builtin(file, &builtin, args, depth),
            Some(Entity::Class(i)) => TypeNode::Class(project.classes[i].symbol),
            Some(Entity::Assignment(i)) => return self.assignment(i, depth),
            Some(Entity::External(qualified)) => {
                let (module, _) = split_qualified(&qualified);
                TypeNode::External(self.symbols.intern(&qualified, module, SymbolKind::External))
            }
            Some(Entity::Function(_)) | Some(Entity::Module(_)) | None => TypeNode::Unknown,
        };
        self.types.intern(node)
    }

    fn special_form(
        &mut self,
        file: FileId,
        form: &str,
        args: &[TypeExpr],
        depth: usize,
    ) -> Option<TypeId> {
        let ty = match form {
            "Optional" => {
                let inner = self.expr(file, args.first()?, depth + 1);
                let none = self.types.intern(TypeNode::NoneType);
                self.types.intern(TypeNode::Union(vec![inner, none]))
            }
            "Union" => self.union(file, args, depth),
            "Annotated" | "ClassVar" | "Final" | "Required" | "NotRequired" | "ReadOnly"
            | "InitVar" => match args.first() {
                Some(inner) => self.expr(file, inner, depth + 1),
                None => self.types.intern(TypeNode::Unknown),
            },
            "Literal" => {
                let values: Vec<String> = args.iter().map(ToString::to_string).collect();
                self.types
                    .intern(TypeNode::Literal(format!("Literal[{}]", values.join(", "))))
            }
            "Any" | "Never" | "NoReturn" => self.types.intern(TypeNode::AnyLike(form.to_string())),
            "List" | "Set" | "FrozenSet" | "Tuple" | "Dict" | "DefaultDict" | "OrderedDict"
            | "Deque" | "Sequence" | "MutableSequence" | "Mapping" | "MutableMapping"
            | "Iterable" | "Iterator" | "Collection" | "AbstractSet" | "MutableSet" | "Type"
            | "Callable" => self.collection(file, form, args, depth),
            _ => return None,
        };
        Some(ty)
    }

    fn builtin(&mut self, file: FileId, name: &str, args: &[TypeExpr], depth: usize) -> TypeId {
        if !args.is_empty() {
            return self.collection(file, name, args, depth);
        }
        let symbol = self.symbols.intern(name, "builtins", SymbolKind::Builtin);
        self.types.intern(TypeNode::Builtin(symbol))
    }

    fn collection(&mut self, file: FileId, name: &str, args: &[TypeExpr], depth: usize) -> TypeId {
        let elements = args
            .iter()
            .filter(|arg| **arg != TypeExpr::Ellipsis)
            .map(|arg| self.expr(file, arg, depth + 1))
            .collect();
        self.types.intern(TypeNode::Collection {
            kind: CollectionKind::from_name(name),
            name: name.to_string(),
            elements,
        })
    }

    fn assignment(&mut self, index: usize, depth: usize) -> TypeId {
        let project = self.project;
        let info = &project.assignments[index];
        let Some(module) = project.file(info.file).map(|f| f.module.as_str()) else {
            return self.types.intern(TypeNode::Unknown);
        };
        let assignment = &info.assignment;
        let declared_alias = assignment
            .annotation
            .as_deref()
            .map_or(true, |a| a.rsplit('.').next() == Some("TypeAlias"));
        match &assignment.value {
            AssignedValue::NewType { .. } => {
                let qualified = qualify(module, &assignment.name);
                let symbol = self.symbols.intern(&qualified, module, SymbolKind::Alias);
                self.types.intern(TypeNode::Alias(symbol))
            }
            AssignedValue::Expression(text) if declared_alias => {
                self.expr(info.file, &parse_annotation(text), depth + 1)
            }
            _ => self.types.intern(TypeNode::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(files: &[(&str, &str)]) -> Project {
        Project::from_sources(files.iter().copied(), &EngineConfig::default())
    }

    fn class_index(project: &Project, file: &str, path: &str) -> usize {
        let file = project.file_by_path(file).unwrap().id;
        project.class_at_path(file, path).unwrap()
    }

    fn field_names(fields: &[FieldDescriptor]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_resolve_across_relative_imports() {
        let p = project(&[
            ("app/__init__.py", "from .models import A\n"),
            ("app/models.py", "class A:\n    pass\n"),
            ("app/views.py", "from . import models\nfrom app import A as Alias\n"),
        ]);
        let views = p.file_by_path("app/views.py").unwrap().id;
        let a = class_index(&p, "app/models.py", "A");
        assert_eq!(p.resolve(views, "Alias"), Some(Entity::Class(a)));
        assert_eq!(p.resolve(views, "models.A"), Some(Entity::Class(a)));
        assert_eq!(p.qualified(&Entity::Class(a)), "app.models.A");
    }

    #[test]
    fn test_external_and_builtin_names() {
        let p = project(&[("main.py", "import datetime as dt\nfrom pydantic import BaseModel\n")]);
        let main = p.file_by_path("main.py").unwrap().id;
        assert_eq!(
            p.resolve(main, "dt.date"),
            Some(Entity::External("datetime.date".to_string()))
        );
        assert_eq!(
            p.resolve(main, "BaseModel"),
            Some(Entity::External("pydantic.BaseModel".to_string()))
        );
        assert_eq!(p.resolve(main, "int"), Some(Entity::Builtin("int".to_string())));
        assert_eq!(p.resolve(main, "missing"), None);
    }

    #[test]
    fn test_record_origins() {
        let p = project(&[(
            "main.py",
            r#"
from dataclasses import dataclass as dc
from pydantic import BaseModel
from typing import dataclass_transform

@dc
class D:
    x: int

class M(BaseModel):
    y: int

class N(M):
    z: int

class Sub(D):
    w: int

@dataclass_transform()
class ModelBase:
    pass

class T(ModelBase):
    v: int

class Plain:
    q: int
"#,
        )]);
        let origin = |name| p.record_origin(class_index(&p, "main.py", name));
        assert_eq!(origin("D"), Some(RecordOrigin::Decorator));
        assert_eq!(origin("M"), Some(RecordOrigin::Inherited));
        assert_eq!(origin("N"), Some(RecordOrigin::Inherited));
        assert_eq!(origin("Sub"), None);
        assert_eq!(origin("T"), Some(RecordOrigin::Inherited));
        assert_eq!(origin("Plain"), None);
    }

    #[test]
    fn test_inherited_fields_first_and_overrides_in_place() {
        let p = project(&[(
            "main.py",
            r#"
from dataclasses import dataclass

@dataclass
class Base:
    a: int
    b: int

@dataclass
class Child(Base):
    c: str
    a: str = "x"
"#,
        )]);
        let child = class_index(&p, "main.py", "Child");
        let fields = p.record_fields(child);
        assert_eq!(field_names(&fields), vec!["a", "b", "c"]);
        assert_eq!(fields[0].default_text.as_deref(), Some("\"x\""));
    }

    #[test]
    fn test_non_init_fields_are_not_constructor_keywords() {
        let p = project(&[(
            "main.py",
            r#"
from dataclasses import dataclass, field

@dataclass
class Base:
    x: int
    total: int = 0

@dataclass
class A(Base):
    cache: int = field(init=False)
    total: int = field(init=False, default=0)
"#,
        )]);
        let a = class_index(&p, "main.py", "A");
        assert_eq!(field_names(&p.record_fields(a)), vec!["x"]);
        let params = p.constructor_parameters(a).unwrap();
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    fn test_config_marker_and_alias_keywords() {
        let p = project(&[(
            "main.py",
            r#"
from pydantic import BaseModel, ConfigDict, Field

class User(BaseModel):
    model_config: ConfigDict = ConfigDict(populate_by_name=True)
    user_name: str = Field(..., alias="userName")
"#,
        )]);
        let user = class_index(&p, "main.py", "User");
        let fields = p.record_fields(user);
        assert_eq!(field_names(&fields), vec!["userName"]);
        let params = p.constructor_parameters(user).unwrap();
        assert!(!params[0].has_default);
    }

    #[test]
    fn test_constructor_parameters() {
        let p = project(&[(
            "main.py",
            r#"
class NeedsArg:
    def __init__(self, value, *, flag: bool = False):
        self.value = value

class Derived(NeedsArg):
    pass

class Factory:
    @staticmethod
    def __init__(value):
        pass
"#,
        )]);
        let params = p
            .constructor_parameters(class_index(&p, "main.py", "Derived"))
            .unwrap();
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["value", "flag"]);
        assert!(params[1].is_keyword_only);
        let factory = p
            .constructor_parameters(class_index(&p, "main.py", "Factory"))
            .unwrap();
        assert_eq!(factory[0].name, "value");
    }

    #[test]
    fn test_annotation_types() {
        let p = project(&[(
            "main.py",
            r#"
from typing import Optional, NewType, Literal
MyStr = NewType("MyStr", str)
Pair = tuple[int, str]

def f(a: Optional[int], b: MyStr, c: "Pair", d: list[int], e: Literal["x"], g: int | None):
    pass
"#,
        )]);
        let function = p.function(0).unwrap();
        let node = |i: usize| p.type_node(function.function.types[i].unwrap()).clone();
        assert!(matches!(node(0), TypeNode::Union(ref m) if m.len() == 2));
        assert!(matches!(node(1), TypeNode::Alias(_)));
        assert!(matches!(
            node(2),
            TypeNode::Collection { kind: CollectionKind::Tuple, ref elements, .. } if elements.len() == 2
        ));
        assert!(matches!(
            node(3),
            TypeNode::Collection { kind: CollectionKind::List, .. }
        ));
        assert_eq!(node(4), TypeNode::Literal("Literal['x']".to_string()));
        assert_eq!(
            function.function.types[0], function.function.types[5],
            "Optional[int] and int | None intern to the same type"
        );
    }

    #[test]
    fn test_field_alias_symbol() {
        let p = project(&[(
            "main.py",
            r#"
from dataclasses import dataclass
from typing import NewType
MyStr = NewType("MyStr", str)

@dataclass
class Outer:
    val: MyStr
"#,
        )]);
        let outer = class_index(&p, "main.py", "Outer");
        let fields = p.record_fields(outer);
        let alias = fields[0].alias_symbol.unwrap();
        assert_eq!(p.symbol(alias).unwrap().qualified_name, "main.MyStr");
    }

    #[test]
    fn test_lookup_skips_class_scopes() {
        let p = project(&[(
            "main.py",
            r#"
top = 1

class C:
    attr = 2

    def m(self):
        foo()
"#,
        )]);
        let call = p.calls().iter().find(|c| c.site.callee_text == "foo").unwrap();
        assert!(p.lookup("self", call.site.scope).is_some());
        assert!(p.lookup("top", call.site.scope).is_some());
        assert!(p.lookup("attr", call.site.scope).is_none());
    }

    #[test]
    fn test_resolve_from_function_local_imports() {
        let p = project(&[
            ("models.py", "def f(a: int):\n    pass\n\nclass A:\n    pass\n"),
            (
                "main.py",
                "def g():\n    from models import f\n    import models as m\n    f()\n    m.A()\n\ndef h(f):\n    f()\n\nf()\n",
            ),
        ]);
        let main = p.file_by_path("main.py").unwrap().id;
        let calls: Vec<_> = p
            .calls()
            .iter()
            .filter(|c| c.site.file == main)
            .map(|c| p.resolve_from(c.site.scope, &c.site.callee_text))
            .collect();
        let models = p.file_by_path("models.py").unwrap().id;
        let a = p.class_at_path(models, "A").unwrap();
        assert!(matches!(calls[0], Some(Entity::Function(_))));
        assert_eq!(calls[1], Some(Entity::Class(a)));
        assert_eq!(calls[2], None);
        assert_eq!(calls[3], None);
    }

    #[test]
    fn test_call_at_picks_innermost() {
        let source = "A(b=B())\n";
        let p = project(&[("main.py", source)]);
        let file = p.file_by_path("main.py").unwrap().id;
        let inner = p.call_at(file, source.find("B(").unwrap() + 2).unwrap();
        assert_eq!(inner.site.callee_text, "B");
        let outer = p.call_at(file, 2).unwrap();
        assert_eq!(outer.site.callee_text, "A");
        assert!(p.call_at(file, source.len()).is_none());
    }

    #[test]
    fn test_derives_from_builtin() {
        let p = project(&[(
            "main.py",
            "class MyInt(int):\n    pass\n\nclass Deeper(MyInt):\n    pass\n\nclass Obj(object):\n    pass\n",
        )]);
        assert!(p.derives_from_builtin(class_index(&p, "main.py", "Deeper")));
        assert!(!p.derives_from_builtin(class_index(&p, "main.py", "Obj")));
    }
}
