//! Which parameters of a call still need an argument.

use std::collections::HashSet;

use tracing::debug;

use crate::host::{CallQuery, CalleeSignature};
use crate::models::{CallSite, ParameterDescriptor, PopulateMode, PopulateOptions};

pub struct MissingParameterAnalyzer<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H: CallQuery + ?Sized> MissingParameterAnalyzer<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Parameters needing a value, in the callee's declaration order.
    ///
    /// An unresolvable callee, or a call that unpacks `*args`/`**kwargs`,
    /// yields an empty list.
    pub fn analyze(&self, call: &CallSite, options: &PopulateOptions) -> Vec<ParameterDescriptor> {
        let Some(signature) = self.host.callee(call) else {
            debug!("Callee {:?} of {} is unresolved", call.callee_text, call.id);
            return Vec::new();
        };
        if call.has_unpacking() {
            debug!("{} unpacks arguments; nothing is reported missing", call.id);
            return Vec::new();
        }
        let include_defaulted = options.mode == PopulateMode::All || options.use_local_scope;
        let bound = bound_parameters(&signature, call);
        signature
            .parameters
            .into_iter()
            .filter(|p| !p.is_variadic && !p.is_positional && !p.name.starts_with('_'))
            .filter(|p| !bound.contains(&p.name))
            .filter(|p| include_defaulted || !p.has_default)
            .collect()
    }

    /// True when anything at all could be populated.
    pub fn is_available(&self, call: &CallSite) -> bool {
        !self.analyze(call, &PopulateOptions::default()).is_empty()
    }
}

/// Names of parameters already covered by positional or keyword arguments.
fn bound_parameters(signature: &CalleeSignature, call: &CallSite) -> HashSet<String> {
    let mut bound: HashSet<String> = signature
        .parameters
        .iter()
        .filter(|p| !p.is_variadic && !p.is_keyword_only)
        .take(call.positional_args)
        .map(|p| p.name.clone())
        .collect();
    bound.extend(call.keyword_args.iter().cloned());
    bound
}
