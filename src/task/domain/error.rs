//! Error types for task domain validation and parsing.

use super::RepoName;
use thiserror::Error;

/// Errors returned while constructing domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The team name is empty or contains unsupported characters.
    #[error("invalid team name '{0}'")]
    InvalidTeamName(String),

    /// The agent name is empty or contains unsupported characters.
    #[error("invalid agent name '{0}'")]
    InvalidAgentName(String),

    /// The repository name is not a single safe path segment.
    #[error("invalid repository name '{0}'")]
    InvalidRepoName(String),

    /// The branch name is empty, contains forbidden characters, or is too
    /// long.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// The commit identifier is not a hexadecimal object name.
    #[error("invalid commit sha '{0}'")]
    InvalidCommitSha(String),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task names no repository.
    #[error("task must be associated with at least one repository")]
    NoRepositories,

    /// The same repository was listed twice.
    #[error("repository '{0}' is listed more than once")]
    DuplicateRepository(RepoName),
}

/// Error returned while parsing approval statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown approval status: {0}")]
pub struct ParseApprovalStatusError(pub String);
