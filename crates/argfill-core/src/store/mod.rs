pub mod project;
pub mod types;

pub use project::{CallRecord, Entity, Project, RecordOrigin, SourceFile};
pub use types::{SymbolInterner, TypeArena, TypeNode};
