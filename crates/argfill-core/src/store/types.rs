//! Interned type nodes and the symbol interner of the project model.

use std::collections::HashMap;

use crate::models::{CollectionKind, Symbol, SymbolId, SymbolKind, TypeId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNode {
    Unknown,
    NoneType,
    AnyLike(String),
    /// Full `Literal[...]` text.
    Literal(String),
    Builtin(SymbolId),
    /// A class defined in the project.
    Class(SymbolId),
    /// A `NewType` wrapper.
    Alias(SymbolId),
    /// A class outside the project, known only by name.
    External(SymbolId),
    Union(Vec<TypeId>),
    Collection {
        kind: CollectionKind,
        name: String,
        elements: Vec<TypeId>,
    },
}

/// Hash-consed type storage; equal nodes share one [`TypeId`].
#[derive(Debug, Default)]
pub struct TypeArena {
    nodes: Vec<TypeNode>,
    index: HashMap<TypeNode, TypeId>,
}

impl TypeArena {
    pub fn intern(&mut self, node: TypeNode) -> TypeId {
        if let Some(&id) = self.index.get(&node) {
            return id;
        }
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.index.insert(node, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeNode {
        self.nodes.get(id.index()).unwrap_or(&TypeNode::Unknown)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SymbolInterner {
    symbols: Vec<Symbol>,
    by_qualified_name: HashMap<String, SymbolId>,
}

impl SymbolInterner {
    /// Id for `qualified_name`, creating the symbol on first sight.
    pub fn intern(&mut self, qualified_name: &str, module: &str, kind: SymbolKind) -> SymbolId {
        if let Some(&id) = self.by_qualified_name.get(qualified_name) {
            return id;
        }
        let id = SymbolId(self.symbols.len() as u32);
        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(qualified_name)
            .to_string();
        self.symbols.push(Symbol {
            id,
            name,
            qualified_name: qualified_name.to_string(),
            module: module.to_string(),
            kind,
        });
        self.by_qualified_name.insert(qualified_name.to_string(), id);
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    pub fn find(&self, qualified_name: &str) -> Option<SymbolId> {
        self.by_qualified_name.get(qualified_name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
