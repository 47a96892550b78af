//! Union member classification and ranking.
//!
//! Members are flattened and deduplicated by rendered name, bucketed by
//! provenance, restricted to the best bucket present, then ordered by
//! [`Kind`] with the rendered name as tie-break.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::EngineConfig;
use crate::host::TypeQuery;
use crate::models::{Kind, SymbolId, TypeBucket, TypeId, TypeShape, UnionChoiceRequest};
use crate::populate::guards::{NONE_NAME, SIGNATURE_SEPARATOR};

/// Nested unions deeper than this are not flattened further.
const MAX_FLATTEN_DEPTH: usize = 16;

static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_\.]*)\s*\(").unwrap());
static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d[\d_]*$").unwrap());
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d[\d_]*\.\d*|\.\d+|\d[\d_]*(\.\d*)?[eE][+-]?\d+)$").unwrap()
});
static STR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^[rRuUfF]*['"]"#).unwrap());
static BYTES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^[rR]?[bB][rR]?['"]"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnionResolution {
    /// Only one candidate survives ranking.
    Single(TypeId),
    /// The existing expression already is one of the candidates.
    Matched(TypeId),
    /// Two or more ranked candidates; a human should choose.
    Choice(Vec<TypeId>),
    Unresolved,
}

pub struct UnionResolver<'q, Q: TypeQuery + ?Sized> {
    query: &'q Q,
    config: &'q EngineConfig,
}

impl<'q, Q: TypeQuery + ?Sized> UnionResolver<'q, Q> {
    pub fn new(query: &'q Q, config: &'q EngineConfig) -> Self {
        Self { query, config }
    }

    /// Depth-first flattening of nested unions, deduplicated by rendered name.
    pub fn flatten(&self, members: &[TypeId]) -> Vec<TypeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &member in members {
            self.flatten_into(member, 0, &mut seen, &mut out);
        }
        out
    }

    fn flatten_into(
        &self,
        ty: TypeId,
        depth: usize,
        seen: &mut HashSet<String>,
        out: &mut Vec<TypeId>,
    ) {
        if let TypeShape::Union { members } = self.query.shape(ty) {
            if depth < MAX_FLATTEN_DEPTH {
                for member in members {
                    self.flatten_into(member, depth + 1, seen, out);
                }
            }
            return;
        }
        if seen.insert(self.query.display_name(ty)) {
            out.push(ty);
        }
    }

    /// Order-independent key for a union: sorted member names joined by `|`.
    pub fn signature(&self, members: &[TypeId]) -> String {
        let mut names: Vec<String> = self
            .flatten(members)
            .into_iter()
            .map(|m| self.query.display_name(m))
            .collect();
        names.sort();
        names.join(SIGNATURE_SEPARATOR)
    }

    pub fn bucket_for(&self, symbol: SymbolId) -> Option<TypeBucket> {
        self.query.provenance(symbol)
    }

    /// Bucket of a member; symbol-less members are classified by shape.
    pub fn bucket_of(&self, ty: TypeId) -> Option<TypeBucket> {
        if let Some(symbol) = self.query.symbol_of(ty) {
            return self.bucket_for(symbol);
        }
        match self.query.shape(ty) {
            TypeShape::NoneType | TypeShape::Collection { .. } | TypeShape::Builtin { .. } => {
                Some(TypeBucket::Builtin)
            }
            TypeShape::Literal { .. } | TypeShape::AnyLike { .. } => {
                Some(TypeBucket::StandardLibrary)
            }
            _ => None,
        }
    }

    pub fn kind_of(&self, ty: TypeId) -> Kind {
        match self.query.shape(ty) {
            TypeShape::Record { .. } => Kind::Record,
            TypeShape::Collection { elements, .. } if !elements.is_empty() => Kind::Collection,
            TypeShape::Builtin { name, .. } if self.config.is_primitive(&name) => Kind::Primitive,
            TypeShape::Collection { .. }
            | TypeShape::Builtin { .. }
            | TypeShape::Plain { .. }
            | TypeShape::Alias { .. } => Kind::Class,
            TypeShape::Literal { .. } => Kind::Literal,
            TypeShape::NoneType => Kind::None,
            TypeShape::AnyLike { .. } | TypeShape::Union { .. } | TypeShape::Unknown => {
                Kind::AnyLike
            }
        }
    }

    /// Candidates from the single best bucket, best first.
    pub fn rank(&self, members: &[TypeId]) -> Vec<TypeId> {
        self.rank_flat(&self.flatten(members))
    }

    fn rank_flat(&self, flat: &[TypeId]) -> Vec<TypeId> {
        let classified: Vec<(TypeId, TypeBucket)> = flat
            .iter()
            .filter_map(|&ty| self.bucket_of(ty).map(|bucket| (ty, bucket)))
            .collect();
        let Some(best) = classified.iter().map(|(_, bucket)| *bucket).min() else {
            return Vec::new();
        };
        let mut ranked: Vec<(Kind, String, TypeId)> = classified
            .into_iter()
            .filter(|(_, bucket)| *bucket == best)
            .map(|(ty, _)| (self.kind_of(ty), self.query.display_name(ty), ty))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, _, ty)| ty).collect()
    }

    /// First ranked member that is not `None`, else the first member.
    pub fn default_pick(&self, ranked: &[TypeId]) -> Option<TypeId> {
        ranked
            .iter()
            .copied()
            .find(|&ty| !self.is_none(ty))
            .or_else(|| ranked.first().copied())
    }

    fn is_none(&self, ty: TypeId) -> bool {
        matches!(self.query.shape(ty), TypeShape::NoneType)
    }

    pub fn resolve(&self, members: &[TypeId], existing: Option<&str>) -> UnionResolution {
        let flat = self.flatten(members);
        match flat.as_slice() {
            [] => return UnionResolution::Unresolved,
            [only] => return UnionResolution::Single(*only),
            _ => {}
        }
        let ranked = self.rank_flat(&flat);
        if ranked.is_empty() {
            debug!("No classifiable union member among {} candidates", flat.len());
            return existing
                .and_then(|text| self.matches_existing(text, &flat))
                .map_or(UnionResolution::Unresolved, UnionResolution::Matched);
        }
        if let Some(hit) = existing.and_then(|text| self.matches_existing(text, &ranked)) {
            return UnionResolution::Matched(hit);
        }
        let real = ranked.iter().filter(|&&ty| !self.is_none(ty)).count();
        if real >= 2 {
            UnionResolution::Choice(ranked)
        } else {
            self.default_pick(&ranked)
                .map_or(UnionResolution::Unresolved, UnionResolution::Single)
        }
    }

    /// A choice request for `param_name`, when its union is ambiguous.
    pub fn request(
        &self,
        param_name: &str,
        members: &[TypeId],
        existing: Option<&str>,
    ) -> Option<UnionChoiceRequest> {
        match self.resolve(members, existing) {
            UnionResolution::Choice(options) => Some(UnionChoiceRequest {
                param_name: param_name.to_string(),
                signature: self.signature(members),
                options,
            }),
            _ => None,
        }
    }

    /// Candidate the expression text already structurally is, if any.
    pub fn matches_existing(&self, text: &str, candidates: &[TypeId]) -> Option<TypeId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        candidates
            .iter()
            .copied()
            .find(|&ty| self.expression_is(text, ty))
    }

    fn expression_is(&self, text: &str, ty: TypeId) -> bool {
        let shape = self.query.shape(ty);
        if let TypeShape::NoneType = shape {
            return text == NONE_NAME;
        }
        let name = self.short_name(ty, &shape);
        if let Some(caps) = CALL_RE.captures(text) {
            let callee = &caps[1];
            let last = callee.rsplit('.').next().unwrap_or(callee);
            return last == name;
        }
        match name.as_str() {
            "str" => STR_RE.is_match(text),
            "bytes" => BYTES_RE.is_match(text),
            "int" => INT_RE.is_match(text),
            "float" => FLOAT_RE.is_match(text),
            "bool" => text == "True" || text == "False",
            "list" => text.starts_with('['),
            "tuple" => text.starts_with('('),
            "dict" => text == "{}" || (text.starts_with('{') && text.contains(':')),
            "set" => text.starts_with('{') && !text.contains(':') && text != "{}",
            _ => false,
        }
    }

    fn short_name(&self, ty: TypeId, shape: &TypeShape) -> String {
        match shape {
            TypeShape::Builtin { name, .. } | TypeShape::Alias { name, .. } => name.clone(),
            TypeShape::Collection { .. } => {
                let display = self.query.display_name(ty);
                display.split('[').next().unwrap_or_default().to_string()
            }
            _ => match self.query.symbol_of(ty).and_then(|s| self.query.symbol(s)) {
                Some(symbol) => symbol.name.clone(),
                None => {
                    let display = self.query.display_name(ty);
                    display.rsplit('.').next().unwrap_or_default().to_string()
                }
            },
        }
    }
}
