//! Error types for workflow definition validation and parsing.

use super::{StageKey, StageKind, WorkflowName, WorkflowVersion};
use thiserror::Error;

/// Errors returned while compiling or registering a workflow definition.
///
/// Every variant is raised at registration time; a registered
/// [`super::WorkflowDef`] never produces one afterwards.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowValidationError {
    /// The workflow name is empty or contains unsupported characters.
    #[error("invalid workflow name '{0}', expected lowercase letters, digits, '-' or '_'")]
    InvalidWorkflowName(String),

    /// The workflow version is zero.
    #[error("invalid workflow version {0}, versions start at 1")]
    InvalidVersion(u32),

    /// The stage key is empty or contains unsupported characters.
    #[error("invalid stage key '{0}', expected lowercase letters, digits or '_'")]
    InvalidStageKey(String),

    /// The workflow declares no stages.
    #[error("workflow must declare at least one stage")]
    EmptyStageList,

    /// A registration did not raise the version above the current latest.
    #[error("workflow '{name}' version {version} must be greater than latest version {latest}")]
    VersionNotIncreasing {
        /// Workflow name.
        name: WorkflowName,
        /// Rejected version.
        version: WorkflowVersion,
        /// Latest registered version.
        latest: WorkflowVersion,
    },

    /// The same (name, version) was loaded again with different content.
    #[error(
        "workflow '{name}' version {version} is already registered with a different definition"
    )]
    ConflictingDefinition {
        /// Workflow name.
        name: WorkflowName,
        /// Conflicting version.
        version: WorkflowVersion,
    },

    /// Two stages share a key.
    #[error("duplicate stage key '{0}'")]
    DuplicateStageKey(StageKey),

    /// A stage has an empty label.
    #[error("stage '{0}' is missing a label")]
    MissingLabel(StageKey),

    /// No stage is flagged terminal.
    #[error("workflow must declare at least one terminal stage")]
    NoTerminalStage,

    /// The first declared stage is terminal.
    #[error("initial stage '{0}' must not be terminal")]
    TerminalInitialStage(StageKey),

    /// A terminal stage declares outgoing transitions.
    #[error("terminal stage '{0}' must not declare transitions")]
    TerminalWithTransitions(StageKey),

    /// A terminal stage is also flagged auto.
    #[error("terminal stage '{0}' must not be auto")]
    TerminalAuto(StageKey),

    /// An auto stage has a kind without an action hook.
    #[error("auto stage '{stage}' has kind '{kind}' which provides no action")]
    AutoWithoutAction {
        /// Offending stage.
        stage: StageKey,
        /// Its kind.
        kind: StageKind,
    },

    /// A non-terminal stage ended up with no outgoing transitions.
    #[error("non-terminal stage '{0}' has no transitions")]
    NoTransitions(StageKey),

    /// A stage lists itself as a transition target.
    #[error("stage '{0}' must not transition to itself")]
    SelfTransition(StageKey),

    /// A transition names a stage that does not exist.
    #[error("stage '{from}' transitions to unknown stage '{to}'")]
    UnknownTransitionTarget {
        /// Source stage.
        from: StageKey,
        /// Missing target.
        to: StageKey,
    },
}

/// Error returned while parsing stage kinds from documents or storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown stage kind: {0}")]
pub struct ParseStageKindError(pub String);
