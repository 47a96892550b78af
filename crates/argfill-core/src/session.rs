//! Path-and-offset facade over the project model and the population engine.
//!
//! A [`Workspace`] owns the source texts. Every successful population
//! writes the edited texts back and rebuilds the project, so offsets passed
//! to the next call refer to the updated sources.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{ArgfillError, ArgfillResult};
use crate::host::editor::{append_range, SourceEditor};
use crate::host::source::SourceHost;
use crate::host::Chooser;
use crate::indexer::pipeline::load_sources;
use crate::models::{
    FileId, ParameterDescriptor, PopulateOptions, UnionChoiceRequest, UnionSelections,
};
use crate::populate::{PopulationOrchestrator, PopulationReport, SelectionCoordinator};
use crate::store::project::{CallRecord, Project};

pub struct Workspace {
    config: EngineConfig,
    root: Option<PathBuf>,
    sources: IndexMap<String, String>,
    dirty: IndexSet<String>,
    project: Project,
}

impl Workspace {
    pub fn from_sources<I, P, S>(sources: I, config: EngineConfig) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<String>,
        S: Into<String>,
    {
        let sources: IndexMap<String, String> = sources
            .into_iter()
            .map(|(p, s)| (p.into(), s.into()))
            .collect();
        let project = build(&sources, &config);
        Self {
            config,
            root: None,
            sources,
            dirty: IndexSet::new(),
            project,
        }
    }

    /// Load every Python file under `root`.
    pub fn load(root: &Path, config: EngineConfig) -> Self {
        let mut workspace = Self::from_sources(load_sources(root), config);
        workspace.root = Some(root.to_path_buf());
        workspace
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn source(&self, path: &str) -> Option<&str> {
        self.sources.get(path).map(String::as_str)
    }

    /// Replace one file's text and rebuild the project.
    pub fn update(&mut self, path: &str, text: impl Into<String>) {
        self.sources.insert(path.to_string(), text.into());
        self.dirty.insert(path.to_string());
        self.project = build(&self.sources, &self.config);
    }

    /// Write changed files back under the root the workspace was loaded
    /// from. Returns the number of files written.
    pub fn save(&mut self) -> ArgfillResult<usize> {
        let Some(root) = &self.root else {
            return Err(ArgfillError::Config(
                "workspace was not loaded from disk".to_string(),
            ));
        };
        let mut written = 0;
        for path in &self.dirty {
            if let Some(text) = self.sources.get(path) {
                std::fs::write(root.join(path), text)?;
                written += 1;
            }
        }
        self.dirty.clear();
        info!("Saved {written} file(s) under {}", root.display());
        Ok(written)
    }

    fn locate(&self, path: &str, offset: usize) -> ArgfillResult<&CallRecord> {
        let file = self
            .project
            .file_by_path(path)
            .ok_or_else(|| ArgfillError::UnknownFile(path.to_string()))?;
        self.project
            .call_at(file.id, offset)
            .ok_or_else(|| ArgfillError::NoCallAt {
                path: path.to_string(),
                offset,
            })
    }

    /// Whether the call at the offset has anything to populate.
    pub fn is_available(&self, path: &str, offset: usize) -> ArgfillResult<bool> {
        let call = self.locate(path, offset)?;
        let host = SourceHost::new(&self.project);
        Ok(PopulationOrchestrator::new(&host, &self.config).is_available(&call.site))
    }

    pub fn missing_parameters(
        &self,
        path: &str,
        offset: usize,
        options: &PopulateOptions,
    ) -> ArgfillResult<Vec<ParameterDescriptor>> {
        let call = self.locate(path, offset)?;
        let host = SourceHost::new(&self.project);
        Ok(PopulationOrchestrator::new(&host, &self.config).compute_missing(&call.site, options))
    }

    /// Ambiguous unions among the missing parameters, one per parameter.
    pub fn union_choices(
        &self,
        path: &str,
        offset: usize,
        options: &PopulateOptions,
    ) -> ArgfillResult<Vec<UnionChoiceRequest>> {
        let missing = self.missing_parameters(path, offset, options)?;
        let host = SourceHost::new(&self.project);
        Ok(SelectionCoordinator::new(&host, &self.config).requests(&missing))
    }

    pub fn has_union_choices(
        &self,
        path: &str,
        offset: usize,
        options: &PopulateOptions,
    ) -> ArgfillResult<bool> {
        Ok(!self.union_choices(path, offset, options)?.is_empty())
    }

    pub fn is_recursive_applicable(&self, path: &str, offset: usize) -> ArgfillResult<bool> {
        let call = self.locate(path, offset)?;
        let host = SourceHost::new(&self.project);
        Ok(PopulationOrchestrator::new(&host, &self.config).is_recursive_applicable(&call.site))
    }

    /// Text of the call as populating it would leave it. Nothing is edited.
    pub fn preview(
        &self,
        path: &str,
        offset: usize,
        options: &PopulateOptions,
        selections: &UnionSelections,
    ) -> ArgfillResult<String> {
        let call = self.locate(path, offset)?;
        let host = SourceHost::new(&self.project);
        let planned = PopulationOrchestrator::new(&host, &self.config).plan(
            &call.site,
            options,
            selections,
        );
        let arguments: Vec<String> = planned.iter().map(|p| p.text()).collect();
        let text = self.source(path).unwrap_or_default();
        Ok(render_call(text, call, &arguments))
    }

    /// Populate the call at the offset, asking `chooser` about ambiguous
    /// unions first.
    pub fn populate<C: Chooser + ?Sized>(
        &mut self,
        path: &str,
        offset: usize,
        options: &PopulateOptions,
        chooser: &mut C,
    ) -> ArgfillResult<PopulationReport> {
        let (report, documents) = {
            let call = self.locate(path, offset)?.site.clone();
            let host = SourceHost::new(&self.project);
            let mut editor = SourceEditor::new(&self.project);
            let mut orchestrator = PopulationOrchestrator::new(&host, &self.config);
            let report = orchestrator.run(&call, options, chooser, &mut editor)?;
            (report, editor.into_documents())
        };
        self.apply_documents(documents);
        Ok(report)
    }

    /// Populate the call at the offset with unions settled by `selections`.
    pub fn populate_with(
        &mut self,
        path: &str,
        offset: usize,
        options: &PopulateOptions,
        selections: &UnionSelections,
    ) -> ArgfillResult<PopulationReport> {
        let (report, documents) = {
            let call = self.locate(path, offset)?.site.clone();
            let host = SourceHost::new(&self.project);
            let mut editor = SourceEditor::new(&self.project);
            let mut orchestrator = PopulationOrchestrator::new(&host, &self.config);
            let report = orchestrator.populate(&call, options, selections, &mut editor)?;
            (report, editor.into_documents())
        };
        self.apply_documents(documents);
        Ok(report)
    }

    fn apply_documents(&mut self, documents: IndexMap<FileId, String>) {
        if documents.is_empty() {
            return;
        }
        let updates: Vec<(String, String)> = documents
            .into_iter()
            .filter_map(|(id, text)| Some((self.project.file(id)?.path.clone(), text)))
            .collect();
        debug!("Applying edits to {} file(s)", updates.len());
        for (path, text) in updates {
            self.dirty.insert(path.clone());
            self.sources.insert(path, text);
        }
        self.project = build(&self.sources, &self.config);
    }
}

fn build(sources: &IndexMap<String, String>, config: &EngineConfig) -> Project {
    Project::from_sources(
        sources.iter().map(|(p, s)| (p.clone(), s.clone())),
        config,
    )
}

fn render_call(source: &str, call: &CallRecord, arguments: &[String]) -> String {
    let slice = |from: usize, to: usize| source.get(from..to).unwrap_or_default();
    if arguments.is_empty() {
        return slice(call.start, call.end).to_string();
    }
    let joined = arguments.join(", ");
    let tail = slice(call.close_paren, call.end);
    if call.site.argument_count() == 0 {
        format!("{}{joined}{tail}", slice(call.start, call.open_paren + 1))
    } else {
        let (start, end) = append_range(source, call);
        format!(
            "{}, {joined}{}{tail}",
            slice(call.start, start),
            slice(end, call.close_paren)
        )
    }
}
