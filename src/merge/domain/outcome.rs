//! Results of individual git and pipeline operations.

use crate::task::domain::{CommitSha, RepoName};

/// Result of rebasing the checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The branch now sits on top of the target.
    Rebased,
    /// The rebase stopped on conflicts in these paths.
    Conflict(Vec<String>),
}

/// Result of a fast-forward-only merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastForwardOutcome {
    /// The current branch moved to this commit.
    Merged(CommitSha),
    /// History diverged; nothing was changed.
    NotFastForward,
}

/// Result of running a repository's tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestRunOutcome {
    /// The command exited successfully.
    Passed,
    /// No command was configured or detected.
    Skipped,
    /// The command failed.
    Failed(String),
    /// The command exceeded its timeout.
    TimedOut,
    /// The command could not be started.
    Unavailable(String),
}

/// Repositories merged by a successful pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Newly merged repositories and the resulting integration head.
    pub merged: Vec<(RepoName, CommitSha)>,
    /// Repositories skipped because an earlier attempt merged them.
    pub already_merged: Vec<RepoName>,
}
