//! Domain models for costing-service.

mod composite;
mod cost_line;
mod module;
mod project;

pub use composite::{CompositeAggregate, CompositeDetail};
pub use cost_line::{LaborLine, MaterialLine};
pub use module::ModuleAggregate;
pub use project::ProjectRollup;
