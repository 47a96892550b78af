//! [`SourceModel`](crate::host::SourceModel) over a parsed [`Project`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::host::{CallQuery, CalleeSignature, SymbolTable, TypeQuery};
use crate::indexer::imports::absolute_module;
use crate::models::{
    Binding, CallSite, FileId, ScopeId, Symbol, SymbolId, SymbolKind, TypeBucket, TypeId,
    TypeShape,
};
use crate::store::project::{parameters_of, Entity, Project};
use crate::store::types::TypeNode;

/// `Name(...).method`: a method called on a freshly constructed instance.
static CONSTRUCTED_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_\.]*)\s*\(.*\)\s*\.\s*([A-Za-z_][A-Za-z0-9_]*)$")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receiver {
    /// `obj.method(...)`: the first parameter is bound.
    Instance,
    /// `Cls.method(...)`: bound only for classmethods.
    Class,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceHost<'p> {
    project: &'p Project,
}

impl<'p> SourceHost<'p> {
    pub fn new(project: &'p Project) -> Self {
        Self { project }
    }

    pub fn project(&self) -> &'p Project {
        self.project
    }

    fn class_of(&self, ty: TypeId) -> Option<usize> {
        match self.project.type_node(ty) {
            TypeNode::Class(symbol) => self.project.class_for_symbol(*symbol),
            _ => None,
        }
    }

    fn constructor(&self, class: usize) -> Option<CalleeSignature> {
        let info = self.project.class(class)?;
        let record = self.project.record_origin(class).map(|_| info.symbol);
        let name = info.class.name.rsplit('.').next().unwrap_or(&info.class.name);
        Some(CalleeSignature {
            name: name.to_string(),
            parameters: self.project.constructor_parameters(class).unwrap_or_default(),
            record,
        })
    }

    fn method(&self, class: usize, name: &str, receiver: Receiver) -> Option<CalleeSignature> {
        let method = self.project.find_method(class, name)?;
        let bound = match receiver {
            Receiver::Instance => true,
            Receiver::Class => method.function.has_decorator("classmethod"),
        };
        Some(CalleeSignature {
            name: name.to_string(),
            parameters: parameters_of(method, bound),
            record: None,
        })
    }

    fn resolve_class(&self, file: FileId, text: &str) -> Option<usize> {
        match self.project.resolve(file, text)? {
            Entity::Class(class) => Some(class),
            _ => None,
        }
    }
}

impl TypeQuery for SourceHost<'_> {
    fn shape(&self, ty: TypeId) -> TypeShape {
        let project = self.project;
        let symbol_name = |symbol: SymbolId| {
            project
                .symbol(symbol)
                .map(|s| s.name.clone())
                .unwrap_or_default()
        };
        match project.type_node(ty) {
            TypeNode::Unknown => TypeShape::Unknown,
            TypeNode::NoneType => TypeShape::NoneType,
            TypeNode::AnyLike(name) => TypeShape::AnyLike { name: name.clone() },
            TypeNode::Literal(text) => TypeShape::Literal { text: text.clone() },
            TypeNode::Builtin(symbol) => TypeShape::Builtin {
                symbol: Some(*symbol),
                name: symbol_name(*symbol),
            },
            TypeNode::Alias(symbol) => TypeShape::Alias {
                symbol: Some(*symbol),
                name: symbol_name(*symbol),
            },
            TypeNode::External(symbol) => TypeShape::Plain { symbol: *symbol },
            TypeNode::Union(members) => TypeShape::Union {
                members: members.clone(),
            },
            TypeNode::Collection { kind, elements, .. } => TypeShape::Collection {
                kind: *kind,
                elements: elements.clone(),
            },
            TypeNode::Class(symbol) => match project.class_for_symbol(*symbol) {
                Some(class) if project.record_origin(class).is_some() => TypeShape::Record {
                    symbol: *symbol,
                    fields: project.record_fields(class),
                },
                Some(class) if project.derives_from_builtin(class) => TypeShape::Builtin {
                    symbol: Some(*symbol),
                    name: symbol_name(*symbol),
                },
                _ => TypeShape::Plain { symbol: *symbol },
            },
        }
    }

    fn display_name(&self, ty: TypeId) -> String {
        let project = self.project;
        let qualified = |symbol: &SymbolId| {
            project
                .symbol(*symbol)
                .map(|s| s.qualified_name.clone())
                .unwrap_or_else(|| "?".to_string())
        };
        match project.type_node(ty) {
            TypeNode::Unknown => "?".to_string(),
            TypeNode::NoneType => "None".to_string(),
            TypeNode::AnyLike(name) | TypeNode::Literal(name) => name.clone(),
            TypeNode::Builtin(symbol)
            | TypeNode::Class(symbol)
            | TypeNode::Alias(symbol)
            | TypeNode::External(symbol) => qualified(symbol),
            TypeNode::Union(members) => members
                .iter()
                .map(|&m| self.display_name(m))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeNode::Collection { name, elements, .. } if elements.is_empty() => name.clone(),
            TypeNode::Collection { name, elements, .. } => {
                let inner: Vec<String> = elements.iter().map(|&e| self.display_name(e)).collect();
                format!("{name}[{}]", inner.join(", "))
            }
        }
    }

    fn symbol_of(&self, ty: TypeId) -> Option<SymbolId> {
        match self.project.type_node(ty) {
            TypeNode::Builtin(symbol)
            | TypeNode::Class(symbol)
            | TypeNode::Alias(symbol)
            | TypeNode::External(symbol) => Some(*symbol),
            _ => None,
        }
    }

    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.project.symbol(id)
    }

    fn provenance(&self, symbol: SymbolId) -> Option<TypeBucket> {
        let symbol = self.project.symbol(symbol)?;
        let bucket = match symbol.kind {
            SymbolKind::Builtin => TypeBucket::Builtin,
            SymbolKind::Class | SymbolKind::Alias | SymbolKind::Function | SymbolKind::Variable => {
                TypeBucket::Own
            }
            SymbolKind::External
                if symbol.module == "builtins"
                    || self.project.config().is_stdlib_module(&symbol.module) =>
            {
                TypeBucket::StandardLibrary
            }
            SymbolKind::External => TypeBucket::ThirdParty,
        };
        Some(bucket)
    }

    fn has_required_constructor_args(&self, ty: TypeId) -> bool {
        let Some(class) = self.class_of(ty) else {
            return false;
        };
        self.project
            .constructor_parameters(class)
            .is_some_and(|params| params.iter().any(|p| !p.has_default && !p.is_variadic))
    }
}

impl SymbolTable for SourceHost<'_> {
    fn lookup(&self, name: &str, scope: ScopeId) -> Option<Binding> {
        self.project.lookup(name, scope).map(|(_, kind)| Binding {
            name: name.to_string(),
            kind,
        })
    }

    fn visible_alias(&self, file: FileId, symbol: SymbolId) -> Option<String> {
        let project = self.project;
        let symbol = project.symbol(symbol)?;
        let source = project.file(file)?;

        for import in source.imports.iter().filter(|i| i.name.is_some()) {
            let bound = import.bound_name();
            let Some(entity) = project.resolve(file, &bound) else {
                continue;
            };
            if project.qualified(&entity) == symbol.qualified_name {
                return Some(bound);
            }
        }

        for import in source.imports.iter().filter(|i| i.name.is_none()) {
            let Some(module) = absolute_module(&source.module, source.is_package, &import.module)
            else {
                continue;
            };
            let Some(rest) = symbol
                .qualified_name
                .strip_prefix(module.as_str())
                .and_then(|r| r.strip_prefix('.'))
            else {
                continue;
            };
            return Some(match &import.alias {
                Some(alias) => format!("{alias}.{rest}"),
                None => symbol.qualified_name.clone(),
            });
        }
        None
    }
}

impl CallQuery for SourceHost<'_> {
    fn callee(&self, call: &CallSite) -> Option<CalleeSignature> {
        let project = self.project;
        let text = call.callee_text.trim();
        let file = call.file;

        if let Some(caps) = CONSTRUCTED_METHOD_RE.captures(text) {
            let class = self.resolve_class(file, &caps[1])?;
            return self.method(class, &caps[2], Receiver::Instance);
        }

        if let Some((head, name)) = text.rsplit_once('.') {
            if head == "self" || head == "cls" {
                let record = project.call(call.id)?;
                let class = project.class_at_path(file, record.enclosing_class.as_deref()?)?;
                let receiver = if head == "self" {
                    Receiver::Instance
                } else {
                    Receiver::Class
                };
                return self.method(class, name, receiver);
            }
        }

        match project.resolve_from(call.scope, text) {
            Some(Entity::Class(class)) => self.constructor(class),
            Some(Entity::Function(function)) => {
                let info = project.function(function)?;
                Some(CalleeSignature {
                    name: info.function.function.name.clone(),
                    parameters: parameters_of(&info.function, false),
                    record: None,
                })
            }
            None => {
                let (head, name) = text.rsplit_once('.')?;
                let class = self.resolve_class(file, head)?;
                self.method(class, name, Receiver::Class)
            }
            Some(other) => {
                debug!("Callee {text:?} resolves outside the project ({other:?})");
                None
            }
        }
    }
}
