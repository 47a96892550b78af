//! Buffered text edits against the files of a [`Project`].
//!
//! Edits are collected inside a transaction and applied on commit, last
//! offset first, so earlier offsets stay valid. The project itself is never
//! modified; committed texts are read back with [`SourceEditor::document`].

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::errors::{ArgfillError, ArgfillResult};
use crate::host::source::SourceHost;
use crate::host::{CodeMutator, ImportResolver, SymbolTable};
use crate::models::{CallId, CallSite, FileId, SymbolId, SymbolKind};
use crate::store::project::{CallRecord, Project};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextEdit {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Debug, Default)]
struct Pending {
    replaced: IndexMap<CallId, String>,
    appended: IndexMap<CallId, Vec<String>>,
    imports: IndexMap<FileId, IndexSet<String>>,
}

pub struct SourceEditor<'p> {
    project: &'p Project,
    pending: Option<Pending>,
    documents: IndexMap<FileId, String>,
}

impl<'p> SourceEditor<'p> {
    pub fn new(project: &'p Project) -> Self {
        Self {
            project,
            pending: None,
            documents: IndexMap::new(),
        }
    }

    /// Committed text of `file`, if this editor changed it.
    pub fn document(&self, file: FileId) -> Option<&str> {
        self.documents.get(&file).map(String::as_str)
    }

    pub fn into_documents(self) -> IndexMap<FileId, String> {
        self.documents
    }

    fn pending(&mut self) -> ArgfillResult<&mut Pending> {
        self.pending
            .as_mut()
            .ok_or_else(|| ArgfillError::Mutation("no open transaction".to_string()))
    }

    fn edits_for(&self, pending: &Pending) -> ArgfillResult<IndexMap<FileId, Vec<TextEdit>>> {
        let mut edits: IndexMap<FileId, Vec<TextEdit>> = IndexMap::new();
        for (&id, inner) in &pending.replaced {
            let call = self.call(id)?;
            edits.entry(call.site.file).or_default().push(TextEdit {
                start: call.open_paren + 1,
                end: call.close_paren,
                text: inner.clone(),
            });
        }
        for (&id, arguments) in &pending.appended {
            let call = self.call(id)?;
            let source = self
                .project
                .file(call.site.file)
                .ok_or_else(|| ArgfillError::UnknownFile(call.site.file.to_string()))?;
            let (start, end) = append_range(&source.text, call);
            let text = match call.last_arg_end {
                Some(_) => format!(", {}", arguments.join(", ")),
                None => arguments.join(", "),
            };
            edits.entry(call.site.file).or_default().push(TextEdit { start, end, text });
        }
        for (&file, lines) in &pending.imports {
            let source = self
                .project
                .file(file)
                .ok_or_else(|| ArgfillError::UnknownFile(file.to_string()))?;
            let offset = source.import_insert_offset;
            let block = lines.iter().cloned().collect::<Vec<_>>().join("\n");
            let text = if offset > 0 {
                format!("\n{block}")
            } else {
                format!("{block}\n")
            };
            edits.entry(file).or_default().push(TextEdit {
                start: offset,
                end: offset,
                text,
            });
        }
        Ok(edits)
    }

    fn call(&self, id: CallId) -> ArgfillResult<&'p CallRecord> {
        self.project
            .call(id)
            .ok_or_else(|| ArgfillError::Mutation(format!("unknown call {id}")))
    }
}

/// Byte range that appended keyword arguments replace.
///
/// Text between the last argument and the closing parenthesis survives
/// unless it is only a trailing comma and spaces on the same line.
pub(crate) fn append_range(text: &str, call: &CallRecord) -> (usize, usize) {
    let Some(last) = call.last_arg_end else {
        return (call.open_paren + 1, call.close_paren);
    };
    let trailing = text.get(last..call.close_paren).unwrap_or_default();
    if trailing.chars().all(|c| matches!(c, ',' | ' ' | '\t')) {
        (last, call.close_paren)
    } else {
        (last, last)
    }
}

fn apply_edits(text: &str, mut edits: Vec<TextEdit>) -> ArgfillResult<String> {
    edits.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    let mut out = text.to_string();
    for edit in edits {
        let valid = edit.start <= edit.end
            && edit.end <= out.len()
            && out.is_char_boundary(edit.start)
            && out.is_char_boundary(edit.end);
        if !valid {
            return Err(ArgfillError::Mutation(format!(
                "edit range {}..{} is outside the document",
                edit.start, edit.end
            )));
        }
        out.replace_range(edit.start..edit.end, &edit.text);
    }
    Ok(out)
}

impl CodeMutator for SourceEditor<'_> {
    fn begin(&mut self) -> ArgfillResult<()> {
        if self.pending.is_some() {
            return Err(ArgfillError::Mutation(
                "a transaction is already open".to_string(),
            ));
        }
        self.pending = Some(Pending::default());
        Ok(())
    }

    fn commit(&mut self) -> ArgfillResult<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| ArgfillError::Mutation("no open transaction".to_string()))?;
        let edits = self.edits_for(&pending)?;

        let mut updated = Vec::with_capacity(edits.len());
        for (file, file_edits) in edits {
            if self.documents.contains_key(&file) {
                return Err(ArgfillError::Mutation(format!(
                    "{file} was already edited; rebuild the project first"
                )));
            }
            let source = self
                .project
                .file(file)
                .ok_or_else(|| ArgfillError::UnknownFile(file.to_string()))?;
            updated.push((file, apply_edits(&source.text, file_edits)?));
        }
        debug!("Committed edits to {} file(s)", updated.len());
        self.documents.extend(updated);
        Ok(())
    }

    fn rollback(&mut self) {
        if self.pending.take().is_some() {
            debug!("Discarded pending edits");
        }
    }

    fn replace_argument_list(&mut self, call: &CallSite, inner_text: &str) -> ArgfillResult<()> {
        self.pending()?
            .replaced
            .insert(call.id, inner_text.to_string());
        Ok(())
    }

    fn append_keyword_argument(
        &mut self,
        call: &CallSite,
        name: &str,
        value: &str,
    ) -> ArgfillResult<()> {
        self.pending()?
            .appended
            .entry(call.id)
            .or_default()
            .push(format!("{name}={value}"));
        Ok(())
    }
}

impl ImportResolver for SourceEditor<'_> {
    fn ensure_imported(
        &mut self,
        file: FileId,
        anchor: &str,
        symbol: SymbolId,
    ) -> ArgfillResult<()> {
        let project = self.project;
        let source = project
            .file(file)
            .ok_or_else(|| ArgfillError::UnknownFile(file.to_string()))?;
        let Some(sym) = project.symbol(symbol) else {
            return Ok(());
        };
        if sym.kind == SymbolKind::Builtin
            || sym.module == source.module
            || SourceHost::new(project).visible_alias(file, symbol).is_some()
        {
            return Ok(());
        }
        let line = format!("from {} import {}", sym.module, sym.name);
        debug!("Importing {} for {anchor:?}", sym.qualified_name);
        self.pending()?.imports.entry(file).or_default().insert(line);
        Ok(())
    }
}
