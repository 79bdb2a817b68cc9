//! Domain model for workflow definitions.
//!
//! Stage definitions are plain data; compilation into a [`WorkflowDef`]
//! performs every structural check up front so a registered workflow can
//! never fail validation at runtime.

mod definition;
mod error;
mod name;
mod stage;

pub use definition::WorkflowDef;
pub use error::{ParseStageKindError, WorkflowValidationError};
pub use name::{WorkflowName, WorkflowRef, WorkflowVersion};
pub use stage::{Stage, StageDefinition, StageKey, StageKind};
