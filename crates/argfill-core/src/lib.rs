//! Argfill core library: fills in the missing arguments of a Python call
//! with type-directed placeholder values.
//!
//! [`populate`] holds the engine, which only sees the collaborator traits in
//! [`host`]. [`indexer`] and [`store`] build the Python project model those
//! traits are answered from, and [`session::Workspace`] ties everything to
//! file paths and byte offsets. With the `python` feature the crate is also
//! the `_argfill_core` extension module.

pub mod config;
pub mod errors;
pub mod host;
pub mod indexer;
pub mod models;
pub mod populate;
pub mod session;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings;

pub use config::EngineConfig;
pub use errors::{ArgfillError, ArgfillResult};
pub use session::Workspace;

#[cfg(feature = "python")]
use pyo3::prelude::*;

// ---------------------------------------------------------------------------
// Top-level Python module: _argfill_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pymodule]
fn _argfill_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::register(m)
}
