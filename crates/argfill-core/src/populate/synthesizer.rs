//! Type-directed placeholder synthesis.
//!
//! [`ValueSynthesizer::synthesize`] maps a declared type to expression text
//! plus the symbols that text needs imported. Recursion is bounded by depth
//! only: anything deeper than the configured maximum, and anything whose
//! type is unknown, becomes the sentinel `...`.

use tracing::debug;

use crate::config::EngineConfig;
use crate::host::{SymbolTable, TypeQuery};
use crate::models::{
    CollectionKind, FieldDescriptor, FileId, GenerationResult, PopulateOptions, SymbolId, TypeId,
    TypeShape, UnionSelections,
};
use crate::populate::guards::alias_placeholder;
use crate::populate::unions::{UnionResolution, UnionResolver};

pub struct ValueSynthesizer<'a, H: ?Sized> {
    host: &'a H,
    config: &'a EngineConfig,
    options: &'a PopulateOptions,
    selections: &'a UnionSelections,
    file: FileId,
}

impl<'a, H: TypeQuery + SymbolTable + ?Sized> ValueSynthesizer<'a, H> {
    pub fn new(
        host: &'a H,
        config: &'a EngineConfig,
        options: &'a PopulateOptions,
        selections: &'a UnionSelections,
        file: FileId,
    ) -> Self {
        Self {
            host,
            config,
            options,
            selections,
            file,
        }
    }

    pub fn synthesize(&self, ty: TypeId, depth: usize) -> GenerationResult {
        self.synthesize_near(ty, depth, None)
    }

    /// Like [`Self::synthesize`], with the text currently standing in for the
    /// value (a default, say) available to settle ambiguous unions.
    pub fn synthesize_near(
        &self,
        ty: TypeId,
        depth: usize,
        existing: Option<&str>,
    ) -> GenerationResult {
        if depth > self.config.max_depth {
            return GenerationResult::sentinel();
        }
        match self.host.shape(ty) {
            TypeShape::Record { symbol, fields } => self.record(symbol, &fields, depth),
            TypeShape::Union { members } => self.union(&members, depth, existing),
            TypeShape::Collection { kind, elements } => self.collection(kind, &elements, depth),
            TypeShape::Builtin { symbol, name } => self.builtin(ty, symbol, &name),
            TypeShape::Alias { symbol, name } => self.alias(symbol, &name),
            TypeShape::Plain { symbol } => self.plain(ty, symbol),
            TypeShape::Literal { .. }
            | TypeShape::AnyLike { .. }
            | TypeShape::NoneType
            | TypeShape::Unknown => GenerationResult::sentinel(),
        }
    }

    /// `Alias(...)` for an alias symbol, unless it names a builtin.
    pub fn alias_wrap(&self, symbol: SymbolId) -> Option<GenerationResult> {
        let name = self.reference(symbol, None)?;
        if self.config.is_builtin_name(&name) {
            return None;
        }
        Some(GenerationResult::requiring(alias_placeholder(&name), symbol))
    }

    // -----------------------------------------------------------------------
    // Shapes
    // -----------------------------------------------------------------------

    fn record(
        &self,
        symbol: SymbolId,
        fields: &[FieldDescriptor],
        depth: usize,
    ) -> GenerationResult {
        if !self.options.recursive || fields.is_empty() {
            return GenerationResult::sentinel();
        }
        let Some(name) = self.reference(symbol, None) else {
            return GenerationResult::sentinel();
        };
        let mut result = GenerationResult::requiring(String::new(), symbol);
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let mut value =
                self.synthesize_near(field.declared_type, depth + 1, field.default_text.as_deref());
            if value.is_sentinel() {
                if let Some(wrapped) = field.alias_symbol.and_then(|a| self.alias_wrap(a)) {
                    value = wrapped;
                }
            }
            result.absorb(&value);
            parts.push(format!("{}={}", field.name, value.text));
        }
        result.text = format!("{name}({})", parts.join(", "));
        result
    }

    fn union(&self, members: &[TypeId], depth: usize, existing: Option<&str>) -> GenerationResult {
        let resolver = UnionResolver::new(self.host, self.config);
        let flat = resolver.flatten(members);
        if flat.len() >= 2 {
            let signature = resolver.signature(&flat);
            if let Some(choice) = self.selections.get(&signature) {
                if let Some(&picked) = flat
                    .iter()
                    .find(|&&m| self.host.display_name(m) == *choice)
                {
                    return self.synthesize(picked, depth);
                }
                debug!("Selection {choice:?} is not a member of {signature}");
            }
        }
        match resolver.resolve(&flat, existing) {
            UnionResolution::Single(ty) | UnionResolution::Matched(ty) => {
                self.synthesize(ty, depth)
            }
            UnionResolution::Choice(ranked) => match resolver.default_pick(&ranked) {
                Some(ty) => self.synthesize(ty, depth),
                None => GenerationResult::sentinel(),
            },
            UnionResolution::Unresolved => GenerationResult::sentinel(),
        }
    }

    fn collection(&self, kind: CollectionKind, elements: &[TypeId], depth: usize) -> GenerationResult {
        let element = |ty: TypeId| self.synthesize(ty, depth + 1);
        match (kind, elements) {
            (CollectionKind::List, [item, ..]) => wrap(element(*item), "[", "]"),
            (CollectionKind::Set, [item, ..]) => wrap(element(*item), "{", "}"),
            (CollectionKind::Tuple, [item]) => wrap(element(*item), "(", ")"),
            (CollectionKind::Tuple, items) if items.len() > 1 => {
                let values: Vec<GenerationResult> = items.iter().map(|&t| element(t)).collect();
                let mut result = GenerationResult::new(format!(
                    "({})",
                    values
                        .iter()
                        .map(|v| v.text.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
                for value in &values {
                    result.absorb(value);
                }
                result
            }
            (CollectionKind::Dict, [key, value, ..]) => {
                let key = element(*key);
                let value = element(*value);
                let mut result = GenerationResult::new(format!("{{{}: {}}}", key.text, value.text));
                result.absorb(&key);
                result.absorb(&value);
                result
            }
            _ => GenerationResult::sentinel(),
        }
    }

    fn builtin(&self, ty: TypeId, symbol: Option<SymbolId>, name: &str) -> GenerationResult {
        if !self.options.use_constructors || self.host.has_required_constructor_args(ty) {
            return GenerationResult::sentinel();
        }
        match symbol {
            Some(symbol) => {
                let callee = self
                    .reference(symbol, Some(name))
                    .unwrap_or_else(|| name.to_string());
                GenerationResult::requiring(format!("{callee}()"), symbol)
            }
            None => GenerationResult::new(format!("{name}()")),
        }
    }

    fn alias(&self, symbol: Option<SymbolId>, name: &str) -> GenerationResult {
        if self.config.is_builtin_name(name) {
            return GenerationResult::sentinel();
        }
        match symbol {
            Some(symbol) => self
                .alias_wrap(symbol)
                .unwrap_or_else(GenerationResult::sentinel),
            None => GenerationResult::new(alias_placeholder(name)),
        }
    }

    fn plain(&self, ty: TypeId, symbol: SymbolId) -> GenerationResult {
        if self.options.use_constructors && self.host.has_required_constructor_args(ty) {
            return GenerationResult::sentinel();
        }
        if let Some(alias) = self.host.visible_alias(self.file, symbol) {
            return GenerationResult::new(format!("{alias}()"));
        }
        match self.host.symbol(symbol) {
            Some(sym) => GenerationResult::requiring(format!("{}()", sym.name), symbol),
            None => GenerationResult::sentinel(),
        }
    }

    /// Name to call `symbol` by in the target file: a visible import alias
    /// when there is one, else its own name.
    fn reference(&self, symbol: SymbolId, fallback: Option<&str>) -> Option<String> {
        if let Some(alias) = self.host.visible_alias(self.file, symbol) {
            return Some(alias);
        }
        self.host
            .symbol(symbol)
            .map(|s| s.name.clone())
            .or_else(|| fallback.map(str::to_string))
    }
}

fn wrap(inner: GenerationResult, open: &str, close: &str) -> GenerationResult {
    GenerationResult {
        text: format!("{open}{}{close}", inner.text),
        required_symbols: inner.required_symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::models::{SymbolKind, TypeBucket, SENTINEL};

    fn synth_text(host: &FakeHost, ty: TypeId, options: PopulateOptions) -> String {
        let config = EngineConfig::default();
        let selections = UnionSelections::new();
        ValueSynthesizer::new(host, &config, &options, &selections, FileId(0))
            .synthesize(ty, 0)
            .text
    }

    #[test]
    fn test_record_fields_in_order() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let a = host.record("A");
        host.field(a, "x", int).field(a, "y", int);
        assert_eq!(synth_text(&host, a, PopulateOptions::default()), "A(x=..., y=...)");
    }

    #[test]
    fn test_record_imports_itself_and_nested() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let leaf = host.record("Leaf");
        host.field(leaf, "val", int);
        let node = host.record("Node");
        host.field(node, "leaf", leaf).field(node, "other", int);
        let config = EngineConfig::default();
        let options = PopulateOptions::default();
        let selections = UnionSelections::new();
        let result = ValueSynthesizer::new(&host, &config, &options, &selections, FileId(0))
            .synthesize(node, 0);
        assert_eq!(result.text, "Node(leaf=Leaf(val=...), other=...)");
        let symbols: Vec<_> = result.required_symbols.into_iter().collect();
        assert_eq!(
            symbols,
            vec![host.symbol_of_type(node), host.symbol_of_type(leaf)]
        );
    }

    #[test]
    fn test_self_referential_record_stops_at_depth() {
        let mut host = FakeHost::new();
        let rec = host.record("Rec");
        host.field(rec, "r", rec);
        let text = synth_text(&host, rec, PopulateOptions::default());
        assert_eq!(text.matches("Rec(").count(), 6);
        assert!(text.ends_with("r=...))))))"));
    }

    #[test]
    fn test_depth_limit_is_configurable() {
        let mut host = FakeHost::new();
        let rec = host.record("Rec");
        host.field(rec, "r", rec);
        let config = EngineConfig {
            max_depth: 1,
            ..EngineConfig::default()
        };
        let options = PopulateOptions::default();
        let selections = UnionSelections::new();
        let synth = ValueSynthesizer::new(&host, &config, &options, &selections, FileId(0));
        assert_eq!(synth.synthesize(rec, 0).text, "Rec(r=Rec(r=...))");
        assert_eq!(synth.synthesize(rec, 2).text, SENTINEL);
    }

    #[test]
    fn test_empty_record_and_flat_mode_give_sentinel() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let empty = host.record("Empty");
        let a = host.record("A");
        host.field(a, "x", int);
        assert_eq!(synth_text(&host, empty, PopulateOptions::default()), SENTINEL);
        assert_eq!(synth_text(&host, a, PopulateOptions::default().flat()), SENTINEL);
    }

    #[test]
    fn test_field_alias_wraps_sentinel() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let user_id = host.add_symbol("UserId", "main", SymbolKind::Alias, Some(TypeBucket::Own));
        let builtin_alias =
            host.add_symbol("str", "", SymbolKind::Builtin, Some(TypeBucket::Builtin));
        let user = host.record("User");
        host.field_with(
            user,
            FieldDescriptor {
                name: "id".to_string(),
                declared_type: int,
                alias_symbol: Some(user_id),
                default_text: None,
                is_keyword_only: false,
            },
        );
        host.field_with(
            user,
            FieldDescriptor {
                name: "tag".to_string(),
                declared_type: int,
                alias_symbol: Some(builtin_alias),
                default_text: None,
                is_keyword_only: false,
            },
        );
        let config = EngineConfig::default();
        let options = PopulateOptions::default();
        let selections = UnionSelections::new();
        let result = ValueSynthesizer::new(&host, &config, &options, &selections, FileId(0))
            .synthesize(user, 0);
        assert_eq!(result.text, "User(id=UserId(...), tag=...)");
        assert!(result.required_symbols.contains(&user_id));
        assert!(!result.required_symbols.contains(&builtin_alias));
    }

    #[test]
    fn test_newtype_alias() {
        let mut host = FakeHost::new();
        let my_str = host.alias("MyStr");
        let outer = host.record("Outer");
        host.field(outer, "val", my_str);
        assert_eq!(
            synth_text(&host, outer, PopulateOptions::default()),
            "Outer(val=MyStr(...))"
        );
    }

    #[test]
    fn test_collections() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let text = host.builtin("str");
        let a = host.record("A");
        host.field(a, "x", int);
        let list = host.collection(CollectionKind::List, "list", &[a]);
        let set = host.collection(CollectionKind::Set, "set", &[int]);
        let single = host.collection(CollectionKind::Tuple, "tuple", &[int]);
        let pair = host.collection(CollectionKind::Tuple, "tuple", &[int, text]);
        let dict = host.collection(CollectionKind::Dict, "dict", &[text, a]);
        let bare = host.collection(CollectionKind::List, "list", &[]);
        let other = host.collection(CollectionKind::Other, "Sequence", &[int]);
        let options = PopulateOptions::default();
        assert_eq!(synth_text(&host, list, options), "[A(x=...)]");
        assert_eq!(synth_text(&host, set, options), "{...}");
        assert_eq!(synth_text(&host, single, options), "(...)");
        assert_eq!(synth_text(&host, pair, options), "(..., ...)");
        assert_eq!(synth_text(&host, dict, options), "{...: A(x=...)}");
        assert_eq!(synth_text(&host, bare, options), SENTINEL);
        assert_eq!(synth_text(&host, other, options), SENTINEL);
    }

    #[test]
    fn test_builtins_need_constructor_option() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let my_int = host.builtin_subclass("MyInt");
        let ctor = PopulateOptions::default().with_constructors();
        assert_eq!(synth_text(&host, int, PopulateOptions::default()), SENTINEL);
        assert_eq!(synth_text(&host, int, ctor), "int()");
        assert_eq!(synth_text(&host, my_int, ctor), "MyInt()");
        host.require_ctor_args(my_int);
        assert_eq!(synth_text(&host, my_int, ctor), SENTINEL);
    }

    #[test]
    fn test_plain_class_prefers_visible_alias() {
        let mut host = FakeHost::new();
        let date = host.plain("date", "datetime", TypeBucket::StandardLibrary);
        let widget = host.plain("Widget", "main", TypeBucket::Own);
        assert_eq!(synth_text(&host, widget, PopulateOptions::default()), "Widget()");
        assert_eq!(synth_text(&host, date, PopulateOptions::default()), "date()");
        host.visible(date, "dt.date");
        assert_eq!(synth_text(&host, date, PopulateOptions::default()), "dt.date()");
    }

    #[test]
    fn test_plain_class_with_required_args() {
        let mut host = FakeHost::new();
        let needs = host.plain("NeedsArg", "main", TypeBucket::Own);
        host.require_ctor_args(needs);
        let ctor = PopulateOptions::default().with_constructors();
        assert_eq!(synth_text(&host, needs, ctor), SENTINEL);
        assert_eq!(synth_text(&host, needs, PopulateOptions::default()), "NeedsArg()");
    }

    #[test]
    fn test_union_uses_default_pick_and_selection() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let a = host.record("A");
        host.field(a, "a", int);
        let b = host.record("B");
        host.field(b, "b", int);
        let union = host.union(&[a, b]);
        assert_eq!(synth_text(&host, union, PopulateOptions::default()), "A(a=...)");

        let config = EngineConfig::default();
        let options = PopulateOptions::default();
        let mut selections = UnionSelections::new();
        selections.insert("main.A|main.B".to_string(), "main.B".to_string());
        let synth = ValueSynthesizer::new(&host, &config, &options, &selections, FileId(0));
        assert_eq!(synth.synthesize(union, 0).text, "B(b=...)");
    }

    #[test]
    fn test_optional_record_field() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let none = host.none();
        let d = host.record("D");
        host.field(d, "v", int);
        let optional = host.union(&[d, none]);
        let e = host.record("E");
        host.field(e, "d", optional);
        assert_eq!(synth_text(&host, e, PopulateOptions::default()), "E(d=D(v=...))");
    }

    #[test]
    fn test_unknown_like_shapes_give_sentinel() {
        let mut host = FakeHost::new();
        let unknown = host.unknown();
        let literal = host.literal("Literal['a']");
        let any = host.any();
        let none = host.none();
        for ty in [unknown, literal, any, none] {
            assert_eq!(synth_text(&host, ty, PopulateOptions::default()), SENTINEL);
        }
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let mut host = FakeHost::new();
        let int = host.builtin("int");
        let a = host.record("A");
        let b = host.record("B");
        host.field(a, "x", int).field(b, "a", a);
        let union = host.union(&[b, a]);
        let first = synth_text(&host, union, PopulateOptions::default());
        let second = synth_text(&host, union, PopulateOptions::default());
        assert_eq!(first, second);
    }
}
