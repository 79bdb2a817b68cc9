//! Transition requests and their results.

use crate::task::domain::{Task, TaskId};
use crate::workflow::domain::StageKey;

/// A request to move a task to another stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Task to move.
    pub task_id: TaskId,
    /// Requested stage.
    pub target: StageKey,
    /// Free-text note handed to the hooks, such as a rejection reason.
    pub note: Option<String>,
}

impl TransitionRequest {
    /// Creates a request without a note.
    #[must_use]
    pub const fn new(task_id: TaskId, target: StageKey) -> Self {
        Self {
            task_id,
            target,
            note: None,
        }
    }

    /// Attaches a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of a completed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The task reached the requested stage.
    Moved(Task),
    /// A hook fault diverted the task into the error stage.
    Escalated {
        /// The task as persisted in the error stage.
        task: Task,
        /// The fault reported by the hook.
        reason: String,
    },
}

impl TransitionOutcome {
    /// Returns the persisted task.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Moved(task) | Self::Escalated { task, .. } => task,
        }
    }

    /// Consumes the outcome, returning the persisted task.
    #[must_use]
    pub fn into_task(self) -> Task {
        match self {
            Self::Moved(task) | Self::Escalated { task, .. } => task,
        }
    }
}

/// Result of running an auto stage's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoOutcome {
    /// The task is not resting in an auto stage.
    NotAuto,
    /// The action asked to be retried later and changed nothing.
    Idle,
    /// The action kept the task in place and persisted its bookkeeping.
    Stayed(Box<Task>),
    /// The action moved the task.
    Transitioned(Box<TransitionOutcome>),
}
