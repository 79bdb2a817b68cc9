//! Append-only audit events.

use crate::task::domain::{TaskId, TeamName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A task was created.
    TaskCreated,
    /// A task moved between stages.
    StatusChanged,
    /// An `enter` gate rejected a transition.
    GateRejected,
    /// An `exit` hook failed and the transition continued.
    ExitHookFailed,
    /// A hook raised an unrecoverable fault.
    ActionFailed,
    /// The merge pipeline integrated a task.
    MergeSucceeded,
    /// The merge pipeline failed for a task.
    MergeFailed,
    /// A human was asked to take over.
    Escalated,
    /// A busy agent with a dead process was reset to idle.
    AgentReset,
    /// An agent turn was handed to the runtime.
    TurnDispatched,
    /// An agent turn completed.
    TurnFinished,
}

impl AuditEventKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::StatusChanged => "status_changed",
            Self::GateRejected => "gate_rejected",
            Self::ExitHookFailed => "exit_hook_failed",
            Self::ActionFailed => "action_failed",
            Self::MergeSucceeded => "merge_succeeded",
            Self::MergeFailed => "merge_failed",
            Self::Escalated => "escalated",
            Self::AgentReset => "agent_reset",
            Self::TurnDispatched => "turn_dispatched",
            Self::TurnFinished => "turn_finished",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the audit trail. Never read back by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    team: TeamName,
    task_id: Option<TaskId>,
    kind: AuditEventKind,
    message: String,
    recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(
        team: TeamName,
        task_id: Option<TaskId>,
        kind: AuditEventKind,
        message: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team,
            task_id,
            kind,
            message: message.into(),
            recorded_at,
        }
    }

    /// Returns the team.
    #[must_use]
    pub const fn team(&self) -> &TeamName {
        &self.team
    }

    /// Returns the related task, if any.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> AuditEventKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns when the event was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
