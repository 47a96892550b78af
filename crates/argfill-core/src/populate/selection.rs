//! Sequential union disambiguation across the missing parameters of a call.

use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::{ArgfillError, ArgfillResult};
use crate::host::{Chooser, ChooserOutcome, TypeQuery};
use crate::models::{ParameterDescriptor, TypeId, TypeShape, UnionChoiceRequest, UnionSelections};
use crate::populate::guards::union_prompt;
use crate::populate::unions::UnionResolver;

pub struct SelectionCoordinator<'a, Q: TypeQuery + ?Sized> {
    query: &'a Q,
    config: &'a EngineConfig,
}

impl<'a, Q: TypeQuery + ?Sized> SelectionCoordinator<'a, Q> {
    pub fn new(query: &'a Q, config: &'a EngineConfig) -> Self {
        Self { query, config }
    }

    /// One request per missing parameter whose union is still ambiguous.
    pub fn requests(&self, missing: &[ParameterDescriptor]) -> Vec<UnionChoiceRequest> {
        let resolver = UnionResolver::new(self.query, self.config);
        missing
            .iter()
            .filter_map(|param| {
                let ty = param.declared_type?;
                let TypeShape::Union { members } = self.query.shape(ty) else {
                    return None;
                };
                resolver.request(&param.name, &members, param.default_text.as_deref())
            })
            .collect()
    }

    /// Ask the chooser about each ambiguous union, one at a time.
    ///
    /// A signature answered earlier in the batch is reused without asking
    /// again. Cancellation discards every answer collected so far.
    pub fn collect<C: Chooser + ?Sized>(
        &self,
        missing: &[ParameterDescriptor],
        chooser: &mut C,
    ) -> ArgfillResult<UnionSelections> {
        let mut selections = UnionSelections::new();
        for request in self.requests(missing) {
            if selections.contains_key(&request.signature) {
                debug!(
                    "Reusing choice for {} on parameter {}",
                    request.signature, request.param_name
                );
                continue;
            }
            let title = union_prompt(&request.param_name);
            let render = |ty: TypeId| self.label(ty);
            match chooser.choose(&title, &request.options, &render) {
                ChooserOutcome::Chosen(ty) => {
                    let chosen = self.query.display_name(ty);
                    debug!("{} resolved to {chosen}", request.signature);
                    selections.insert(request.signature, chosen);
                }
                ChooserOutcome::Cancelled => {
                    debug!("Union selection cancelled at parameter {}", request.param_name);
                    return Err(ArgfillError::Cancelled);
                }
            }
        }
        Ok(selections)
    }

    /// Human-readable option label.
    pub fn label(&self, ty: TypeId) -> String {
        match self.query.symbol_of(ty).and_then(|s| self.query.symbol(s)) {
            Some(symbol) => symbol.label(),
            None => self.query.display_name(ty),
        }
    }
}
