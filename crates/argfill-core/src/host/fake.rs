//! In-memory collaborators for engine unit tests.

use std::collections::{HashMap, HashSet};

use crate::errors::{ArgfillError, ArgfillResult};
use crate::host::{CallQuery, CalleeSignature, CodeMutator, ImportResolver, SymbolTable, TypeQuery};
use crate::models::{
    Binding, BindingKind, CallId, CallSite, CollectionKind, FieldDescriptor, FileId,
    ParameterDescriptor, ScopeId, Symbol, SymbolId, SymbolKind, TypeBucket, TypeId, TypeShape,
};

struct FakeType {
    shape: TypeShape,
    display: String,
    symbol: Option<SymbolId>,
    required_ctor: bool,
}

#[derive(Default)]
pub(crate) struct FakeHost {
    symbols: Vec<Symbol>,
    buckets: HashMap<SymbolId, TypeBucket>,
    types: Vec<FakeType>,
    bindings: HashSet<String>,
    aliases: HashMap<SymbolId, String>,
    callees: HashMap<String, CalleeSignature>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol(
        &mut self,
        name: &str,
        module: &str,
        kind: SymbolKind,
        bucket: Option<TypeBucket>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        let qualified_name = if module.is_empty() {
            name.to_string()
        } else {
            format!("{module}.{name}")
        };
        self.symbols.push(Symbol {
            id,
            name: name.to_string(),
            qualified_name,
            module: module.to_string(),
            kind,
        });
        if let Some(bucket) = bucket {
            self.buckets.insert(id, bucket);
        }
        id
    }

    fn push(&mut self, shape: TypeShape, display: String, symbol: Option<SymbolId>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(FakeType {
            shape,
            display,
            symbol,
            required_ctor: false,
        });
        id
    }

    pub fn builtin(&mut self, name: &str) -> TypeId {
        let sym = self.add_symbol(name, "", SymbolKind::Builtin, Some(TypeBucket::Builtin));
        self.push(
            TypeShape::Builtin {
                symbol: Some(sym),
                name: name.to_string(),
            },
            name.to_string(),
            Some(sym),
        )
    }

    /// Own class deriving from a builtin.
    pub fn builtin_subclass(&mut self, name: &str) -> TypeId {
        let sym = self.add_symbol(name, "main", SymbolKind::Class, Some(TypeBucket::Own));
        self.push(
            TypeShape::Builtin {
                symbol: Some(sym),
                name: name.to_string(),
            },
            format!("main.{name}"),
            Some(sym),
        )
    }

    pub fn record(&mut self, name: &str) -> TypeId {
        let sym = self.add_symbol(name, "main", SymbolKind::Class, Some(TypeBucket::Own));
        self.push(
            TypeShape::Record {
                symbol: sym,
                fields: Vec::new(),
            },
            format!("main.{name}"),
            Some(sym),
        )
    }

    pub fn field(&mut self, record: TypeId, name: &str, ty: TypeId) -> &mut Self {
        self.field_with(
            record,
            FieldDescriptor {
                name: name.to_string(),
                declared_type: ty,
                alias_symbol: None,
                default_text: None,
                is_keyword_only: false,
            },
        )
    }

    pub fn field_with(&mut self, record: TypeId, field: FieldDescriptor) -> &mut Self {
        if let TypeShape::Record { fields, .. } = &mut self.types[record.index()].shape {
            fields.push(field);
        }
        self
    }

    pub fn plain(&mut self, name: &str, module: &str, bucket: TypeBucket) -> TypeId {
        let kind = if bucket == TypeBucket::Own {
            SymbolKind::Class
        } else {
            SymbolKind::External
        };
        let sym = self.add_symbol(name, module, kind, Some(bucket));
        let display = self.symbols[sym.index()].qualified_name.clone();
        self.push(TypeShape::Plain { symbol: sym }, display, Some(sym))
    }

    /// External class whose provenance cannot be classified.
    pub fn unclassified(&mut self, name: &str) -> TypeId {
        let sym = self.add_symbol(name, "ext", SymbolKind::External, None);
        self.push(TypeShape::Plain { symbol: sym }, format!("ext.{name}"), Some(sym))
    }

    pub fn alias(&mut self, name: &str) -> TypeId {
        let sym = self.add_symbol(name, "main", SymbolKind::Alias, Some(TypeBucket::Own));
        self.push(
            TypeShape::Alias {
                symbol: Some(sym),
                name: name.to_string(),
            },
            format!("main.{name}"),
            Some(sym),
        )
    }

    pub fn union(&mut self, members: &[TypeId]) -> TypeId {
        let display = members
            .iter()
            .map(|m| self.types[m.index()].display.clone())
            .collect::<Vec<_>>()
            .join(" | ");
        self.push(
            TypeShape::Union {
                members: members.to_vec(),
            },
            display,
            None,
        )
    }

    pub fn collection(&mut self, kind: CollectionKind, name: &str, elements: &[TypeId]) -> TypeId {
        let inner = elements
            .iter()
            .map(|m| self.types[m.index()].display.clone())
            .collect::<Vec<_>>()
            .join(", ");
        self.push(
            TypeShape::Collection {
                kind,
                elements: elements.to_vec(),
            },
            format!("{name}[{inner}]"),
            None,
        )
    }

    pub fn none(&mut self) -> TypeId {
        self.push(TypeShape::NoneType, "None".to_string(), None)
    }

    pub fn unknown(&mut self) -> TypeId {
        self.push(TypeShape::Unknown, "?".to_string(), None)
    }

    pub fn literal(&mut self, text: &str) -> TypeId {
        self.push(
            TypeShape::Literal {
                text: text.to_string(),
            },
            text.to_string(),
            None,
        )
    }

    pub fn any(&mut self) -> TypeId {
        self.push(
            TypeShape::AnyLike {
                name: "Any".to_string(),
            },
            "Any".to_string(),
            None,
        )
    }

    pub fn require_ctor_args(&mut self, ty: TypeId) {
        self.types[ty.index()].required_ctor = true;
    }

    pub fn bind(&mut self, name: &str) {
        self.bindings.insert(name.to_string());
    }

    pub fn visible(&mut self, ty: TypeId, alias: &str) {
        if let Some(sym) = self.types[ty.index()].symbol {
            self.aliases.insert(sym, alias.to_string());
        }
    }

    pub fn define_callee(&mut self, text: &str, parameters: Vec<ParameterDescriptor>) {
        self.callees.insert(
            text.to_string(),
            CalleeSignature {
                name: text.to_string(),
                parameters,
                record: None,
            },
        );
    }

    /// Register a record constructor whose parameters are its fields.
    pub fn record_callee(&mut self, text: &str, record: TypeId) {
        let (symbol, parameters) = match &self.types[record.index()].shape {
            TypeShape::Record { symbol, fields } => (
                *symbol,
                fields
                    .iter()
                    .map(|f| f.to_parameter(f.alias_symbol))
                    .collect(),
            ),
            _ => return,
        };
        self.callees.insert(
            text.to_string(),
            CalleeSignature {
                name: text.to_string(),
                parameters,
                record: Some(symbol),
            },
        );
    }

    pub fn symbol_of_type(&self, ty: TypeId) -> SymbolId {
        self.types[ty.index()].symbol.unwrap_or(SymbolId(u32::MAX))
    }
}

pub(crate) fn call(text: &str, positional: usize, keywords: &[&str]) -> CallSite {
    CallSite {
        id: CallId(0),
        file: FileId(0),
        scope: ScopeId(0),
        callee_text: text.to_string(),
        positional_args: positional,
        keyword_args: keywords.iter().map(|k| k.to_string()).collect(),
        unpacking_args: 0,
    }
}

pub(crate) fn param(name: &str, ty: TypeId) -> ParameterDescriptor {
    ParameterDescriptor::new(name, Some(ty))
}

impl TypeQuery for FakeHost {
    fn shape(&self, ty: TypeId) -> TypeShape {
        self.types
            .get(ty.index())
            .map_or(TypeShape::Unknown, |t| t.shape.clone())
    }

    fn display_name(&self, ty: TypeId) -> String {
        self.types
            .get(ty.index())
            .map_or_else(|| "?".to_string(), |t| t.display.clone())
    }

    fn symbol_of(&self, ty: TypeId) -> Option<SymbolId> {
        self.types.get(ty.index()).and_then(|t| t.symbol)
    }

    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    fn provenance(&self, symbol: SymbolId) -> Option<TypeBucket> {
        self.buckets.get(&symbol).copied()
    }

    fn has_required_constructor_args(&self, ty: TypeId) -> bool {
        self.types.get(ty.index()).is_some_and(|t| t.required_ctor)
    }
}

impl SymbolTable for FakeHost {
    fn lookup(&self, name: &str, _scope: ScopeId) -> Option<Binding> {
        self.bindings.contains(name).then(|| Binding {
            name: name.to_string(),
            kind: BindingKind::Local,
        })
    }

    fn visible_alias(&self, _file: FileId, symbol: SymbolId) -> Option<String> {
        self.aliases.get(&symbol).cloned()
    }
}

impl CallQuery for FakeHost {
    fn callee(&self, call: &CallSite) -> Option<CalleeSignature> {
        self.callees.get(&call.callee_text).cloned()
    }
}

/// Editor that records every request instead of touching text.
#[derive(Debug, Default)]
pub(crate) struct RecordingEditor {
    pub log: Vec<String>,
    pub fail_commit: bool,
    pub fail_imports: bool,
}

impl CodeMutator for RecordingEditor {
    fn begin(&mut self) -> ArgfillResult<()> {
        self.log.push("begin".to_string());
        Ok(())
    }

    fn commit(&mut self) -> ArgfillResult<()> {
        if self.fail_commit {
            return Err(ArgfillError::Mutation("commit refused".to_string()));
        }
        self.log.push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) {
        self.log.push("rollback".to_string());
    }

    fn replace_argument_list(&mut self, call: &CallSite, inner_text: &str) -> ArgfillResult<()> {
        self.log.push(format!("replace({}, {inner_text})", call.id));
        Ok(())
    }

    fn append_keyword_argument(
        &mut self,
        call: &CallSite,
        name: &str,
        value: &str,
    ) -> ArgfillResult<()> {
        self.log.push(format!("append({}, {name}={value})", call.id));
        Ok(())
    }
}

impl ImportResolver for RecordingEditor {
    fn ensure_imported(
        &mut self,
        file: FileId,
        anchor: &str,
        symbol: SymbolId,
    ) -> ArgfillResult<()> {
        if self.fail_imports {
            return Err(ArgfillError::Mutation("import refused".to_string()));
        }
        self.log.push(format!("import({file}, {anchor}, {symbol})"));
        Ok(())
    }
}
