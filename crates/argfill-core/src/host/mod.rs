//! Collaborator interfaces the population engine consumes, plus the
//! concrete Python-source implementations of them.
//!
//! The engine in [`crate::populate`] only ever talks to these traits.
//! [`source::SourceHost`] answers type and symbol questions from a parsed
//! [`crate::store::Project`]; [`editor::SourceEditor`] applies text edits.

pub mod choosers;
pub mod editor;
pub mod source;

#[cfg(test)]
pub(crate) mod fake;

use std::ops::{Deref, DerefMut};

use crate::errors::ArgfillResult;
use crate::models::{
    Binding, CallSite, FileId, ParameterDescriptor, ScopeId, Symbol, SymbolId, TypeBucket,
    TypeId, TypeShape,
};

// ---------------------------------------------------------------------------
// Read-side collaborators
// ---------------------------------------------------------------------------

pub trait TypeQuery {
    /// Decompose a type into its structural shape.
    fn shape(&self, ty: TypeId) -> TypeShape;

    /// Rendered name used for deduplication, ordering and signatures.
    fn display_name(&self, ty: TypeId) -> String;

    fn symbol_of(&self, ty: TypeId) -> Option<SymbolId>;

    fn symbol(&self, id: SymbolId) -> Option<&Symbol>;

    fn provenance(&self, symbol: SymbolId) -> Option<TypeBucket>;

    /// True when the type's initializer has a non-self, non-variadic
    /// parameter without a default.
    fn has_required_constructor_args(&self, ty: TypeId) -> bool;
}

pub trait SymbolTable {
    /// Find a variable or parameter visible from `scope`.
    fn lookup(&self, name: &str, scope: ScopeId) -> Option<Binding>;

    /// Expression that already names `symbol` in `file` through an import,
    /// e.g. `MyDate` or `dt.date`.
    fn visible_alias(&self, file: FileId, symbol: SymbolId) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeSignature {
    pub name: String,
    /// Declaration order, bound receivers already removed.
    pub parameters: Vec<ParameterDescriptor>,
    /// Set when the callee is a record constructor.
    pub record: Option<SymbolId>,
}

pub trait CallQuery {
    fn callee(&self, call: &CallSite) -> Option<CalleeSignature>;
}

/// Everything the engine reads from the host.
pub trait SourceModel: TypeQuery + SymbolTable + CallQuery {}

impl<T: TypeQuery + SymbolTable + CallQuery + ?Sized> SourceModel for T {}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChooserOutcome<T> {
    Chosen(T),
    Cancelled,
}

pub trait Chooser {
    fn choose(
        &mut self,
        title: &str,
        options: &[TypeId],
        render: &dyn Fn(TypeId) -> String,
    ) -> ChooserOutcome<TypeId>;
}

// ---------------------------------------------------------------------------
// Write-side collaborators
// ---------------------------------------------------------------------------

pub trait CodeMutator {
    fn begin(&mut self) -> ArgfillResult<()>;

    fn commit(&mut self) -> ArgfillResult<()>;

    fn rollback(&mut self);

    /// Replace the text between the call's parentheses.
    fn replace_argument_list(&mut self, call: &CallSite, inner_text: &str) -> ArgfillResult<()>;

    fn append_keyword_argument(
        &mut self,
        call: &CallSite,
        name: &str,
        value: &str,
    ) -> ArgfillResult<()>;
}

pub trait ImportResolver {
    /// Make `symbol` importable in `file`. No-op when already visible,
    /// defined in the file, or builtin.
    fn ensure_imported(&mut self, file: FileId, anchor: &str, symbol: SymbolId)
        -> ArgfillResult<()>;
}

pub trait DocumentEditor: CodeMutator + ImportResolver {}

impl<T: CodeMutator + ImportResolver + ?Sized> DocumentEditor for T {}

/// Scoped write transaction: rolls back on drop unless committed.
pub struct WriteTransaction<'e, E: CodeMutator + ?Sized> {
    editor: &'e mut E,
    committed: bool,
}

impl<'e, E: CodeMutator + ?Sized> WriteTransaction<'e, E> {
    pub fn begin(editor: &'e mut E) -> ArgfillResult<Self> {
        editor.begin()?;
        Ok(Self {
            editor,
            committed: false,
        })
    }

    pub fn commit(mut self) -> ArgfillResult<()> {
        self.editor.commit()?;
        self.committed = true;
        Ok(())
    }
}

impl<E: CodeMutator + ?Sized> Deref for WriteTransaction<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.editor
    }
}

impl<E: CodeMutator + ?Sized> DerefMut for WriteTransaction<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.editor
    }
}

impl<E: CodeMutator + ?Sized> Drop for WriteTransaction<'_, E> {
    fn drop(&mut self) {
        if !self.committed {
            self.editor.rollback();
        }
    }
}
