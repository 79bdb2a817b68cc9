//! Agent records tracked by the dispatcher.

use super::ParseAgentRoleError;
use crate::task::domain::{AgentName, TeamName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of work an agent accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Implements tasks.
    Worker,
    /// Reviews implemented work.
    Reviewer,
    /// A person; receives escalations and is never dispatched.
    Human,
}

impl AgentRole {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Reviewer => "reviewer",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentRole {
    type Error = ParseAgentRoleError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "worker" => Ok(Self::Worker),
            "reviewer" => Ok(Self::Reviewer),
            "human" => Ok(Self::Human),
            _ => Err(ParseAgentRoleError(value.to_owned())),
        }
    }
}

/// Whether an agent is running a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentStatus {
    /// Available for dispatch.
    #[default]
    Idle,
    /// Running a turn inside process `pid` since `since`.
    Busy {
        /// Process hosting the turn.
        pid: u32,
        /// When the turn started.
        since: DateTime<Utc>,
    },
}

/// An agent known to a team's coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    name: AgentName,
    team: TeamName,
    role: AgentRole,
    status: AgentStatus,
}

impl AgentRecord {
    /// Creates an idle agent.
    #[must_use]
    pub const fn new(name: AgentName, team: TeamName, role: AgentRole) -> Self {
        Self {
            name,
            team,
            role,
            status: AgentStatus::Idle,
        }
    }

    /// Returns the agent name.
    #[must_use]
    pub const fn name(&self) -> &AgentName {
        &self.name
    }

    /// Returns the owning team.
    #[must_use]
    pub const fn team(&self) -> &TeamName {
        &self.team
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> AgentRole {
        self.role
    }

    /// Returns the dispatch status.
    #[must_use]
    pub const fn status(&self) -> AgentStatus {
        self.status
    }

    /// Returns `true` for people.
    #[must_use]
    pub const fn is_human(&self) -> bool {
        matches!(self.role, AgentRole::Human)
    }

    /// Returns the hosting process while a turn runs.
    #[must_use]
    pub const fn busy_pid(&self) -> Option<u32> {
        match self.status {
            AgentStatus::Busy { pid, .. } => Some(pid),
            AgentStatus::Idle => None,
        }
    }

    /// Records that a turn started.
    pub const fn mark_busy(&mut self, pid: u32, since: DateTime<Utc>) {
        self.status = AgentStatus::Busy { pid, since };
    }

    /// Records that the agent is available again.
    pub const fn mark_idle(&mut self) {
        self.status = AgentStatus::Idle;
    }
}
