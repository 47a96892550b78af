//! Composition of analysis, union selection, synthesis and mutation into
//! the public population operations.

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{ArgfillError, ArgfillResult};
use crate::host::{Chooser, DocumentEditor, SourceModel, WriteTransaction};
use crate::models::{
    CallSite, GenerationResult, ParameterDescriptor, PopulateOptions, SymbolId, TypeId, TypeShape,
    UnionSelections,
};
use crate::populate::analyzer::MissingParameterAnalyzer;
use crate::populate::guards::{alias_placeholder, LOCAL_SCOPE_FALLBACK};
use crate::populate::selection::SelectionCoordinator;
use crate::populate::synthesizer::ValueSynthesizer;
use crate::populate::unions::UnionResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationState {
    Idle,
    Analyzing,
    SelectingUnions,
    Synthesizing,
    Mutating,
    Done,
    Aborted,
}

/// One keyword argument about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArgument {
    pub name: String,
    pub value: String,
    pub symbols: IndexSet<SymbolId>,
}

impl PlannedArgument {
    pub fn text(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationReport {
    pub state: PopulationState,
    /// `name=value` texts in insertion order.
    pub arguments: Vec<String>,
    /// Qualified names handed to the import resolver.
    pub imports: Vec<String>,
    pub replaced_argument_list: bool,
}

impl PopulationReport {
    fn empty(state: PopulationState) -> Self {
        Self {
            state,
            arguments: Vec::new(),
            imports: Vec::new(),
            replaced_argument_list: false,
        }
    }

    pub fn changed(&self) -> bool {
        self.state == PopulationState::Done && !self.arguments.is_empty()
    }
}

pub struct PopulationOrchestrator<'a, H: ?Sized> {
    host: &'a H,
    config: &'a EngineConfig,
    state: PopulationState,
}

impl<'a, H: SourceModel + ?Sized> PopulationOrchestrator<'a, H> {
    pub fn new(host: &'a H, config: &'a EngineConfig) -> Self {
        Self {
            host,
            config,
            state: PopulationState::Idle,
        }
    }

    pub fn state(&self) -> PopulationState {
        self.state
    }

    fn transition(&mut self, next: PopulationState) {
        debug!("Population state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn compute_missing(
        &self,
        call: &CallSite,
        options: &PopulateOptions,
    ) -> Vec<ParameterDescriptor> {
        MissingParameterAnalyzer::new(self.host).analyze(call, options)
    }

    pub fn is_available(&self, call: &CallSite) -> bool {
        MissingParameterAnalyzer::new(self.host).is_available(call)
    }

    /// Whether interactive selection is needed before synthesis.
    pub fn has_union_choices(&self, missing: &[ParameterDescriptor]) -> bool {
        !SelectionCoordinator::new(self.host, self.config)
            .requests(missing)
            .is_empty()
    }

    /// Whether populating this call would expand nested records.
    pub fn is_recursive_applicable(&self, call: &CallSite) -> bool {
        let Some(signature) = self.host.callee(call) else {
            return false;
        };
        signature
            .parameters
            .iter()
            .filter(|p| !p.is_variadic)
            .any(|p| p.annotation_alias.is_some() || p.declared_type.is_some_and(|t| self.is_record_like(t)))
    }

    fn is_record_like(&self, ty: TypeId) -> bool {
        match self.host.shape(ty) {
            TypeShape::Record { .. } => true,
            TypeShape::Union { members } => UnionResolver::new(self.host, self.config)
                .flatten(&members)
                .into_iter()
                .any(|m| matches!(self.host.shape(m), TypeShape::Record { .. })),
            _ => false,
        }
    }

    /// Synthesize the arguments for `call` without touching any text.
    pub fn plan(
        &self,
        call: &CallSite,
        options: &PopulateOptions,
        selections: &UnionSelections,
    ) -> Vec<PlannedArgument> {
        let missing = self.compute_missing(call, options);
        self.plan_for(call, &missing, options, selections)
    }

    fn plan_for(
        &self,
        call: &CallSite,
        missing: &[ParameterDescriptor],
        options: &PopulateOptions,
        selections: &UnionSelections,
    ) -> Vec<PlannedArgument> {
        let synth = ValueSynthesizer::new(self.host, self.config, options, selections, call.file);
        let mut planned = Vec::with_capacity(missing.len());
        for param in missing {
            let result = if options.use_local_scope {
                if let Some(binding) = self.host.lookup(&param.name, call.scope) {
                    GenerationResult::new(binding.name)
                } else if param.has_default {
                    debug!("Skipping defaulted parameter {} with no local match", param.name);
                    continue;
                } else {
                    let result = self.synthesize_parameter(&synth, param);
                    if result.contains_sentinel() {
                        GenerationResult::new(LOCAL_SCOPE_FALLBACK)
                    } else {
                        result
                    }
                }
            } else {
                self.synthesize_parameter(&synth, param)
            };
            planned.push(PlannedArgument {
                name: param.name.clone(),
                value: result.text,
                symbols: result.required_symbols,
            });
        }
        planned
    }

    fn synthesize_parameter(
        &self,
        synth: &ValueSynthesizer<'_, H>,
        param: &ParameterDescriptor,
    ) -> GenerationResult {
        let mut result = match param.declared_type {
            Some(ty) => synth.synthesize_near(ty, 0, param.default_text.as_deref()),
            None => GenerationResult::sentinel(),
        };
        if let Some(alias) = param.annotation_alias {
            if result.is_sentinel() {
                if let Some(wrapped) = synth.alias_wrap(alias) {
                    result = wrapped;
                }
            } else if let Some(symbol) = self.host.symbol(alias) {
                if result.text == alias_placeholder(&symbol.name) {
                    result.required_symbols.insert(alias);
                }
            }
        }
        result
    }

    /// Joined `name=value` list that populating would insert.
    pub fn preview(
        &self,
        call: &CallSite,
        options: &PopulateOptions,
        selections: &UnionSelections,
    ) -> String {
        self.plan(call, options, selections)
            .iter()
            .map(PlannedArgument::text)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Fill every missing argument of `call` in one transaction.
    pub fn populate<E: DocumentEditor + ?Sized>(
        &mut self,
        call: &CallSite,
        options: &PopulateOptions,
        selections: &UnionSelections,
        editor: &mut E,
    ) -> ArgfillResult<PopulationReport> {
        self.transition(PopulationState::Analyzing);
        let missing = self.compute_missing(call, options);
        self.populate_missing(call, &missing, options, selections, editor)
    }

    /// Full run: analysis, interactive union selection, synthesis, edit.
    ///
    /// Cancelling the chooser ends in [`PopulationState::Aborted`] without
    /// touching the editor.
    pub fn run<C: Chooser + ?Sized, E: DocumentEditor + ?Sized>(
        &mut self,
        call: &CallSite,
        options: &PopulateOptions,
        chooser: &mut C,
        editor: &mut E,
    ) -> ArgfillResult<PopulationReport> {
        self.transition(PopulationState::Analyzing);
        let missing = self.compute_missing(call, options);
        let mut selections = UnionSelections::new();
        if self.has_union_choices(&missing) {
            self.transition(PopulationState::SelectingUnions);
            match SelectionCoordinator::new(self.host, self.config).collect(&missing, chooser) {
                Ok(chosen) => selections = chosen,
                Err(ArgfillError::Cancelled) => {
                    self.transition(PopulationState::Aborted);
                    return Ok(PopulationReport::empty(PopulationState::Aborted));
                }
                Err(err) => {
                    self.transition(PopulationState::Aborted);
                    return Err(err);
                }
            }
        }
        self.populate_missing(call, &missing, options, &selections, editor)
    }

    fn populate_missing<E: DocumentEditor + ?Sized>(
        &mut self,
        call: &CallSite,
        missing: &[ParameterDescriptor],
        options: &PopulateOptions,
        selections: &UnionSelections,
        editor: &mut E,
    ) -> ArgfillResult<PopulationReport> {
        if missing.is_empty() {
            debug!("Nothing missing at {}", call.id);
            self.transition(PopulationState::Done);
            return Ok(PopulationReport::empty(PopulationState::Done));
        }
        self.transition(PopulationState::Synthesizing);
        let planned = self.plan_for(call, missing, options, selections);
        if planned.is_empty() {
            self.transition(PopulationState::Done);
            return Ok(PopulationReport::empty(PopulationState::Done));
        }
        self.transition(PopulationState::Mutating);
        match self.apply(call, &planned, editor) {
            Ok(report) => {
                self.transition(PopulationState::Done);
                info!(
                    "Populated {} argument(s) at {} ({} import(s))",
                    report.arguments.len(),
                    call.id,
                    report.imports.len()
                );
                Ok(report)
            }
            Err(err) => {
                self.transition(PopulationState::Aborted);
                Err(err)
            }
        }
    }

    fn apply<E: DocumentEditor + ?Sized>(
        &self,
        call: &CallSite,
        planned: &[PlannedArgument],
        editor: &mut E,
    ) -> ArgfillResult<PopulationReport> {
        let arguments: Vec<String> = planned.iter().map(PlannedArgument::text).collect();
        let replaced_argument_list = call.argument_count() == 0;
        let mut imports = IndexSet::new();

        let mut tx = WriteTransaction::begin(editor)?;
        if replaced_argument_list {
            tx.replace_argument_list(call, &arguments.join(", "))?;
        } else {
            for arg in planned {
                tx.append_keyword_argument(call, &arg.name, &arg.value)?;
            }
        }
        for (arg, anchor) in planned.iter().zip(&arguments) {
            for &symbol in &arg.symbols {
                tx.ensure_imported(call.file, anchor, symbol)?;
                if let Some(sym) = self.host.symbol(symbol) {
                    imports.insert(sym.qualified_name.clone());
                }
            }
        }
        tx.commit()?;

        Ok(PopulationReport {
            state: PopulationState::Done,
            arguments,
            imports: imports.into_iter().collect(),
            replaced_argument_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::choosers::{FirstOptionChooser, ScriptedChooser};
    use crate::host::fake::{call, param, FakeHost, RecordingEditor};
    use crate::models::{FieldDescriptor, SymbolKind, TypeBucket, SENTINEL};

    fn record_a(host: &mut FakeHost) -> TypeId {
        let int = host.builtin("int");
        let a = host.record("A");
        host.field(a, "x", int).field(a, "y", int);
        host.field_with(
            a,
            FieldDescriptor {
                name: "z".to_string(),
                declared_type: int,
                alias_symbol: None,
                default_text: Some("1".to_string()),
                is_keyword_only: false,
            },
        );
        host.record_callee("A", a);
        a
    }

    #[test]
    fn test_all_mode_replaces_empty_argument_list() {
        let mut host = FakeHost::new();
        record_a(&mut host);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();
        let report = orchestrator
            .populate(
                &call("A", 0, &[]),
                &PopulateOptions::default(),
                &UnionSelections::new(),
                &mut editor,
            )
            .unwrap();
        assert_eq!(report.arguments, vec!["x=...", "y=...", "z=..."]);
        assert!(report.replaced_argument_list);
        assert_eq!(orchestrator.state(), PopulationState::Done);
        assert_eq!(
            editor.log,
            vec!["begin", "replace(call_0, x=..., y=..., z=...)", "commit"]
        );
    }

    #[test]
    fn test_required_only_preview() {
        let mut host = FakeHost::new();
        record_a(&mut host);
        let config = EngineConfig::default();
        let orchestrator = PopulationOrchestrator::new(&host, &config);
        let preview = orchestrator.preview(
            &call("A", 0, &[]),
            &PopulateOptions::required_only(),
            &UnionSelections::new(),
        );
        assert_eq!(preview, "x=..., y=...");
    }

    #[test]
    fn test_existing_arguments_append_keywords() {
        let mut host = FakeHost::new();
        record_a(&mut host);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();
        let report = orchestrator
            .populate(
                &call("A", 1, &[]),
                &PopulateOptions::default(),
                &UnionSelections::new(),
                &mut editor,
            )
            .unwrap();
        assert!(!report.replaced_argument_list);
        assert_eq!(
            editor.log,
            vec!["begin", "append(call_0, y=...)", "append(call_0, z=...)", "commit"]
        );
    }

    #[test]
    fn test_nothing_missing_means_no_mutation() {
        let mut host = FakeHost::new();
        record_a(&mut host);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();
        let report = orchestrator
            .populate(
                &call("A", 0, &["x", "y", "z"]),
                &PopulateOptions::default(),
                &UnionSelections::new(),
                &mut editor,
            )
            .unwrap();
        assert_eq!(report.state, PopulationState::Done);
        assert!(!report.changed());
        assert!(editor.log.is_empty());
    }

    #[test]
    fn test_imports_once_per_argument_and_symbol() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let leaf = host.record("Leaf");
        host.field(leaf, "val", int);
        host.define_callee("f", vec![param("a", leaf), param("b", leaf)]);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();
        let report = orchestrator
            .populate(
                &call("f", 0, &[]),
                &PopulateOptions::default(),
                &UnionSelections::new(),
                &mut editor,
            )
            .unwrap();
        let leaf_sym = host.symbol_of_type(leaf);
        assert_eq!(
            editor.log,
            vec![
                "begin".to_string(),
                "replace(call_0, a=Leaf(val=...), b=Leaf(val=...))".to_string(),
                format!("import(file_0, a=Leaf(val=...), {leaf_sym})"),
                format!("import(file_0, b=Leaf(val=...), {leaf_sym})"),
                "commit".to_string(),
            ]
        );
        assert_eq!(report.imports, vec!["main.Leaf"]);
    }

    #[test]
    fn test_failed_import_rolls_back() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let leaf = host.record("Leaf");
        host.field(leaf, "val", int);
        host.define_callee("f", vec![param("a", leaf)]);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor {
            fail_imports: true,
            ..Default::default()
        };
        let err = orchestrator
            .populate(
                &call("f", 0, &[]),
                &PopulateOptions::default(),
                &UnionSelections::new(),
                &mut editor,
            )
            .unwrap_err();
        assert!(matches!(err, ArgfillError::Mutation(_)));
        assert_eq!(orchestrator.state(), PopulationState::Aborted);
        assert_eq!(editor.log.last().map(String::as_str), Some("rollback"));
    }

    #[test]
    fn test_local_scope_uses_bindings_and_never_sentinel() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let my_str = host.alias("MyStr");
        host.define_callee(
            "foo",
            vec![
                param("param1", int),
                param("param2", my_str),
                param("param3", int),
                param("opt", int).with_default("0"),
            ],
        );
        host.bind("param1");
        let config = EngineConfig::default();
        let orchestrator = PopulationOrchestrator::new(&host, &config);
        let planned = orchestrator.plan(
            &call("foo", 0, &[]),
            &PopulateOptions::default().with_local_scope(),
            &UnionSelections::new(),
        );
        let texts: Vec<String> = planned.iter().map(PlannedArgument::text).collect();
        assert_eq!(texts, vec!["param1=param1", "param2=None", "param3=None"]);
        assert!(texts.iter().all(|t| !t.contains(SENTINEL)));
        assert!(planned.iter().all(|p| p.symbols.is_empty()));
    }

    #[test]
    fn test_local_binding_fills_defaulted_parameter() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        host.define_callee("foo", vec![param("opt", int).with_default("0")]);
        host.bind("opt");
        let config = EngineConfig::default();
        let orchestrator = PopulationOrchestrator::new(&host, &config);
        let preview = orchestrator.preview(
            &call("foo", 0, &[]),
            &PopulateOptions::required_only().with_local_scope(),
            &UnionSelections::new(),
        );
        assert_eq!(preview, "opt=opt");
    }

    #[test]
    fn test_annotation_alias_post_process() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let user_id = host.add_symbol("UserId", "main", SymbolKind::Alias, Some(TypeBucket::Own));
        let mut id = param("id", int);
        id.annotation_alias = Some(user_id);
        host.define_callee("User", vec![id]);
        let config = EngineConfig::default();
        let orchestrator = PopulationOrchestrator::new(&host, &config);
        let planned = orchestrator.plan(
            &call("User", 0, &[]),
            &PopulateOptions::default(),
            &UnionSelections::new(),
        );
        assert_eq!(planned[0].text(), "id=UserId(...)");
        assert!(planned[0].symbols.contains(&user_id));
    }

    #[test]
    fn test_run_with_scripted_choice() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let a = host.record("A");
        host.field(a, "a", int);
        let b = host.record("B");
        host.field(b, "b", int);
        let union = host.union(&[a, b]);
        let c = host.record("C");
        host.field(c, "v", union);
        host.record_callee("C", c);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();

        let missing = orchestrator.compute_missing(&call("C", 0, &[]), &PopulateOptions::default());
        assert!(orchestrator.has_union_choices(&missing));

        let mut chooser = ScriptedChooser::new(["B"]);
        let report = orchestrator
            .run(
                &call("C", 0, &[]),
                &PopulateOptions::default(),
                &mut chooser,
                &mut editor,
            )
            .unwrap();
        assert_eq!(report.arguments, vec!["v=B(b=...)"]);
        assert_eq!(chooser.prompts, vec!["Select union type for v"]);
    }

    #[test]
    fn test_run_cancelled_aborts_without_mutation() {
        let mut host = FakeHost::new();
        let a = host.record("A");
        let b = host.record("B");
        let union = host.union(&[a, b]);
        host.define_callee("f", vec![param("v", union)]);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();
        let mut chooser = ScriptedChooser::new(Vec::<String>::new());
        let report = orchestrator
            .run(
                &call("f", 0, &[]),
                &PopulateOptions::default(),
                &mut chooser,
                &mut editor,
            )
            .unwrap();
        assert_eq!(report.state, PopulationState::Aborted);
        assert_eq!(orchestrator.state(), PopulationState::Aborted);
        assert!(editor.log.is_empty());
    }

    #[test]
    fn test_run_without_unions_never_prompts() {
        let mut host = FakeHost::new();
        record_a(&mut host);
        let config = EngineConfig::default();
        let mut orchestrator = PopulationOrchestrator::new(&host, &config);
        let mut editor = RecordingEditor::default();
        let report = orchestrator
            .run(
                &call("A", 0, &[]),
                &PopulateOptions::required_only(),
                &mut FirstOptionChooser,
                &mut editor,
            )
            .unwrap();
        assert_eq!(report.arguments, vec!["x=...", "y=..."]);
    }

    #[test]
    fn test_recursive_applicability() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let none = host.none();
        let leaf = host.record("Leaf");
        host.field(leaf, "val", int);
        let optional_leaf = host.union(&[leaf, none]);
        host.define_callee("flat", vec![param("x", int)]);
        host.define_callee("nested", vec![param("x", int), param("leaf", optional_leaf)]);
        let config = EngineConfig::default();
        let orchestrator = PopulationOrchestrator::new(&host, &config);
        assert!(!orchestrator.is_recursive_applicable(&call("flat", 0, &[])));
        assert!(orchestrator.is_recursive_applicable(&call("nested", 0, &[])));
        assert!(!orchestrator.is_recursive_applicable(&call("unknown", 0, &[])));
        assert!(orchestrator.is_available(&call("flat", 0, &[])));
    }
}
