//! The argument population engine.
//!
//! [`analyzer`] decides which parameters of a call need a value,
//! [`synthesizer`] turns declared types into placeholder text, [`unions`]
//! ranks union members, [`selection`] asks a [`crate::host::Chooser`] to
//! settle ambiguous unions and [`orchestrator`] ties them together into one
//! transactional edit.

pub mod analyzer;
pub mod guards;
pub mod orchestrator;
pub mod selection;
pub mod synthesizer;
pub mod unions;

pub use analyzer::MissingParameterAnalyzer;
pub use orchestrator::{PlannedArgument, PopulationOrchestrator, PopulationReport, PopulationState};
pub use selection::SelectionCoordinator;
pub use synthesizer::ValueSynthesizer;
pub use unions::{UnionResolution, UnionResolver};
