//! Workflow registration services.

mod registry;
mod standard;

pub use registry::WorkflowRegistry;
pub use standard::{STANDARD_WORKFLOW, register_standard, standard_stages};
