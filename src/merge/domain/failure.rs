//! Merge failure taxonomy.

use crate::task::domain::RepoName;
use std::fmt;
use thiserror::Error;

/// Pipeline step at which a merge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeStep {
    /// Freeing the feature branch from an agent worktree.
    ReleaseWorktree,
    /// Saving uncommitted changes in the repository checkout.
    Stash,
    /// Switching branches.
    Checkout,
    /// Rebasing the feature branch onto the integration branch.
    Rebase,
    /// Running the repository's test command.
    Test,
    /// Fast-forwarding the integration branch.
    FastForward,
}

impl MergeStep {
    /// Returns the step name used in logs and audit messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReleaseWorktree => "release_worktree",
            Self::Stash => "stash",
            Self::Checkout => "checkout",
            Self::Rebase => "rebase",
            Self::Test => "test",
            Self::FastForward => "fast_forward",
        }
    }
}

impl fmt::Display for MergeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A merge attempt that did not complete.
///
/// Retryable failures (subprocess and git faults) count against the task's
/// merge attempts. Non-retryable failures (conflicts, failing tests,
/// diverged history) escalate immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("merge of '{repository}' failed at {step}: {reason}")]
pub struct MergeFailure {
    repository: RepoName,
    step: MergeStep,
    retryable: bool,
    reason: String,
}

impl MergeFailure {
    /// Creates a failure that may succeed on a later attempt.
    #[must_use]
    pub fn retryable(repository: RepoName, step: MergeStep, reason: impl Into<String>) -> Self {
        Self {
            repository,
            step,
            retryable: true,
            reason: reason.into(),
        }
    }

    /// Creates a failure that needs rework before another attempt.
    #[must_use]
    pub fn permanent(repository: RepoName, step: MergeStep, reason: impl Into<String>) -> Self {
        Self {
            repository,
            step,
            retryable: false,
            reason: reason.into(),
        }
    }

    /// Returns the repository being merged.
    #[must_use]
    pub const fn repository(&self) -> &RepoName {
        &self.repository
    }

    /// Returns the step that failed.
    #[must_use]
    pub const fn step(&self) -> MergeStep {
        self.step
    }

    /// Returns `true` when another attempt may succeed unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the failure detail.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
