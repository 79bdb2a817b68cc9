//! Agent directory port.

use crate::dispatch::domain::AgentRecord;
use crate::task::domain::{AgentName, TeamName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for agent directory operations.
pub type AgentDirectoryResult<T> = Result<T, AgentDirectoryError>;

/// Registry of a team's agents and their dispatch status.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Returns the team's agents ordered by name.
    async fn list(&self, team: &TeamName) -> AgentDirectoryResult<Vec<AgentRecord>>;

    /// Looks up one agent.
    async fn find(&self, team: &TeamName, name: &AgentName)
    -> AgentDirectoryResult<Option<AgentRecord>>;

    /// Records that `name` is running a turn inside `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDirectoryError::NotFound`] for an unknown agent.
    async fn mark_busy(
        &self,
        team: &TeamName,
        name: &AgentName,
        pid: u32,
        since: DateTime<Utc>,
    ) -> AgentDirectoryResult<()>;

    /// Records that `name` is idle.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDirectoryError::NotFound`] for an unknown agent.
    async fn mark_idle(&self, team: &TeamName, name: &AgentName) -> AgentDirectoryResult<()>;
}

/// Errors returned by agent directories.
#[derive(Debug, Clone, Error)]
pub enum AgentDirectoryError {
    /// No such agent in the team.
    #[error("agent not found: {0}")]
    NotFound(AgentName),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AgentDirectoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
