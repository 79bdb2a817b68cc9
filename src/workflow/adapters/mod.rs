//! Workflow document adapters.

mod toml_loader;

pub use toml_loader::{WorkflowDocument, WorkflowLoadError, WorkflowLoader};
