//! Port contracts for repository and worktree locations.

use crate::merge::ports::GitError;
use crate::task::domain::{BranchName, RepoName, TaskId, TeamName};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type for worktree operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Maps a team's repository name to its checkout on disk.
pub trait RepositoryResolver: Send + Sync {
    /// Returns the path of the repository checkout.
    fn resolve_path(&self, team: &TeamName, repository: &RepoName) -> Utf8PathBuf;
}

/// Identifies one exclusively owned worktree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorktreeKey {
    /// Owning team.
    pub team: TeamName,
    /// Repository the worktree checks out.
    pub repository: RepoName,
    /// Task that owns the worktree.
    pub task_id: TaskId,
}

impl WorktreeKey {
    /// Creates a worktree key.
    #[must_use]
    pub const fn new(team: TeamName, repository: RepoName, task_id: TaskId) -> Self {
        Self {
            team,
            repository,
            task_id,
        }
    }
}

/// Creates and removes per-task worktrees.
#[async_trait]
pub trait WorktreeManager: Send + Sync {
    /// Returns where the worktree for `key` lives.
    fn path_for(&self, key: &WorktreeKey) -> Utf8PathBuf;

    /// Ensures a worktree with `branch` checked out exists for `key`.
    ///
    /// The branch is created from `start_point` when it does not exist.
    /// Calling this again for an existing worktree returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the worktree cannot be created.
    async fn create(
        &self,
        key: &WorktreeKey,
        branch: &BranchName,
        start_point: &BranchName,
    ) -> WorkspaceResult<Utf8PathBuf>;

    /// Removes the worktree for `key`; removing a missing worktree
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when git refuses the removal.
    async fn remove(&self, key: &WorktreeKey) -> WorkspaceResult<()>;
}

/// Errors returned by worktree managers.
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Local bookkeeping failed.
    #[error("workspace error: {0}")]
    Io(Arc<std::io::Error>),
}

impl WorkspaceError {
    /// Wraps an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
