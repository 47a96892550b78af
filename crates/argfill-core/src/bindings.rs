//! Python entry points, compiled with the `python` feature.
//!
//! Each function takes the project as a `{path: source}` mapping, resolves
//! the call at `offset` in `path`, and answers in JSON.

use std::collections::HashMap;

use pyo3::prelude::*;
use serde_json::json;

use crate::config::EngineConfig;
use crate::host::source::SourceHost;
use crate::host::TypeQuery;
use crate::models::{PopulateOptions, UnionSelections};
use crate::session::Workspace;

fn options_from(options_json: Option<&str>) -> PyResult<PopulateOptions> {
    match options_json.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(serde_json::from_str(raw).map_err(crate::errors::ArgfillError::from)?),
        None => Ok(PopulateOptions::default()),
    }
}

fn workspace(sources: HashMap<String, String>) -> PyResult<Workspace> {
    let mut sources: Vec<(String, String)> = sources.into_iter().collect();
    sources.sort();
    Ok(Workspace::from_sources(sources, EngineConfig::from_env()?))
}

/// Names of the parameters that populating would fill.
#[pyfunction]
#[pyo3(signature = (sources, path, offset, options_json=None))]
pub fn missing_parameters(
    sources: HashMap<String, String>,
    path: &str,
    offset: usize,
    options_json: Option<&str>,
) -> PyResult<Vec<String>> {
    let options = options_from(options_json)?;
    let ws = workspace(sources)?;
    let missing = ws.missing_parameters(path, offset, &options)?;
    Ok(missing.into_iter().map(|p| p.name).collect())
}

#[pyfunction]
#[pyo3(signature = (sources, path, offset, options_json=None))]
pub fn union_choices(
    sources: HashMap<String, String>,
    path: &str,
    offset: usize,
    options_json: Option<&str>,
) -> PyResult<String> {
    let options = options_from(options_json)?;
    let ws = workspace(sources)?;
    let requests = ws.union_choices(path, offset, &options)?;
    let host = SourceHost::new(ws.project());
    let payload: Vec<_> = requests
        .iter()
        .map(|r| {
            json!({
                "param_name": r.param_name,
                "signature": r.signature,
                "options": r.options.iter().map(|&t| host.display_name(t)).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(serde_json::Value::Array(payload).to_string())
}

/// Populate the call and return the report plus every changed source.
#[pyfunction]
#[pyo3(signature = (sources, path, offset, options_json=None, selections=None))]
pub fn populate_arguments(
    sources: HashMap<String, String>,
    path: &str,
    offset: usize,
    options_json: Option<&str>,
    selections: Option<HashMap<String, String>>,
) -> PyResult<String> {
    let options = options_from(options_json)?;
    let before = sources.clone();
    let mut ws = workspace(sources)?;
    let mut chosen = UnionSelections::new();
    if let Some(selections) = selections {
        let mut pairs: Vec<_> = selections.into_iter().collect();
        pairs.sort();
        chosen.extend(pairs);
    }
    let report = ws.populate_with(path, offset, &options, &chosen)?;
    let changed: HashMap<&str, &str> = before
        .iter()
        .filter_map(|(p, old)| {
            let new = ws.source(p)?;
            (new != old).then_some((p.as_str(), new))
        })
        .collect();
    Ok(json!({ "report": report, "sources": changed }).to_string())
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add(
        "MAX_RECURSION_DEPTH",
        crate::populate::guards::MAX_RECURSION_DEPTH,
    )?;
    m.add("SENTINEL", crate::models::SENTINEL)?;
    m.add_function(wrap_pyfunction!(missing_parameters, m)?)?;
    m.add_function(wrap_pyfunction!(union_choices, m)?)?;
    m.add_function(wrap_pyfunction!(populate_arguments, m)?)?;
    Ok(())
}
