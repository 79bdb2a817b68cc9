//! Hook and transition errors.

use crate::task::{domain::TaskId, ports::TaskRepositoryError};
use crate::workflow::domain::{StageKey, WorkflowRef};
use thiserror::Error;

/// Result type for stage hooks.
pub type HookResult<T> = Result<T, HookError>;

/// Failure raised by a stage hook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    /// A precondition of the target stage does not hold. The transition is
    /// abandoned and the task keeps its status.
    #[error("{0}")]
    Gate(String),

    /// The hook hit a fault it cannot recover from. The task is routed to
    /// the workflow's error stage.
    #[error("{0}")]
    Action(String),
}

impl HookError {
    /// Creates a gate rejection.
    pub fn gate(reason: impl Into<String>) -> Self {
        Self::Gate(reason.into())
    }

    /// Creates an action fault.
    pub fn action(reason: impl Into<String>) -> Self {
        Self::Action(reason.into())
    }
}

/// Result type for transition engine operations.
pub type TransitionResult<T> = Result<T, TransitionError>;

/// Errors returned by the transition engine.
#[derive(Debug, Clone, Error)]
pub enum TransitionError {
    /// No task exists with the identifier.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The task is pinned to a workflow the registry does not hold.
    #[error("workflow {0} is not registered")]
    WorkflowNotRegistered(WorkflowRef),

    /// A stage key is not part of the pinned workflow.
    #[error("stage '{stage}' does not exist in workflow {workflow}")]
    UnknownStage {
        /// Missing stage.
        stage: StageKey,
        /// Pinned workflow.
        workflow: WorkflowRef,
    },

    /// The task already rests in a terminal stage.
    #[error("stage '{0}' is terminal")]
    TerminalStage(StageKey),

    /// The workflow has no edge between the two stages.
    #[error("transition from '{from}' to '{to}' is not allowed")]
    NotAllowed {
        /// Current stage.
        from: StageKey,
        /// Requested stage.
        to: StageKey,
    },

    /// The target stage's gate rejected the move.
    #[error("transition rejected: {0}")]
    Gate(String),

    /// A hook fault was escalated but the workflow has no error stage.
    #[error("stage hook failed: {0}")]
    Action(String),

    /// Task persistence failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}
