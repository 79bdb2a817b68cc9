//! Git operations consumed by the merge pipeline and worktree manager.

use crate::merge::domain::{FastForwardOutcome, RebaseOutcome};
use crate::task::domain::{BranchName, CommitSha};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Git contract.
///
/// `repo` is always the path of a repository checkout; worktree paths are
/// passed separately where an operation concerns them.
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Returns the worktree that has `branch` checked out, if any.
    async fn worktree_for_branch(
        &self,
        repo: &Utf8Path,
        branch: &BranchName,
    ) -> GitResult<Option<Utf8PathBuf>>;

    /// Adds a worktree at `path` for `branch`.
    ///
    /// With `start_point` the branch is created from it; without, the
    /// branch must already exist.
    async fn add_worktree(
        &self,
        repo: &Utf8Path,
        path: &Utf8Path,
        branch: &BranchName,
        start_point: Option<&BranchName>,
    ) -> GitResult<()>;

    /// Removes the worktree at `path`, discarding local modifications.
    async fn remove_worktree(&self, repo: &Utf8Path, path: &Utf8Path) -> GitResult<()>;

    /// Prunes metadata of worktrees whose directories are gone.
    async fn prune_worktrees(&self, repo: &Utf8Path) -> GitResult<()>;

    /// Returns the checked-out branch, or `None` on a detached HEAD.
    async fn current_branch(&self, repo: &Utf8Path) -> GitResult<Option<BranchName>>;

    /// Stashes tracked and untracked changes.
    ///
    /// Returns `true` when a stash entry was created.
    async fn stash_push(&self, repo: &Utf8Path) -> GitResult<bool>;

    /// Pops the most recent stash entry.
    async fn stash_pop(&self, repo: &Utf8Path) -> GitResult<()>;

    /// Checks out `branch`.
    async fn checkout(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<()>;

    /// Rebases the checked-out branch onto `onto`.
    ///
    /// A conflicting rebase is left in progress for the caller to abort.
    async fn rebase(&self, repo: &Utf8Path, onto: &BranchName) -> GitResult<RebaseOutcome>;

    /// Aborts an in-progress rebase.
    async fn abort_rebase(&self, repo: &Utf8Path) -> GitResult<()>;

    /// Fast-forwards the checked-out branch to `branch`; never creates a
    /// merge commit.
    async fn merge_fast_forward(
        &self,
        repo: &Utf8Path,
        branch: &BranchName,
    ) -> GitResult<FastForwardOutcome>;

    /// Resolves `rev` to a commit.
    async fn rev_parse(&self, repo: &Utf8Path, rev: &str) -> GitResult<CommitSha>;

    /// Lists the non-merge commits on `head` that are not on `integration`,
    /// oldest first.
    ///
    /// With `reviewed` set, commits reachable from it and rebased copies of
    /// them are left out.
    async fn unreviewed_commits(
        &self,
        repo: &Utf8Path,
        integration: &BranchName,
        reviewed: Option<&CommitSha>,
        head: &BranchName,
    ) -> GitResult<Vec<CommitSha>>;

    /// Returns the number of parents of `rev`.
    async fn parent_count(&self, repo: &Utf8Path, rev: &str) -> GitResult<usize>;

    /// Returns `true` when the local branch exists.
    async fn branch_exists(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<bool>;

    /// Deletes a local branch.
    async fn delete_branch(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<()>;
}

/// Errors raised by git operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitError {
    /// The git process could not be started.
    #[error("failed to run git {command}: {reason}")]
    Spawn {
        /// Git subcommand.
        command: String,
        /// Spawn failure detail.
        reason: String,
    },
    /// The git process exceeded its timeout.
    #[error("git {command} timed out")]
    TimedOut {
        /// Git subcommand.
        command: String,
    },
    /// Git exited unsuccessfully.
    #[error("git {command} failed: {detail}")]
    CommandFailed {
        /// Git subcommand.
        command: String,
        /// Failure summary.
        detail: String,
    },
    /// Git printed something that could not be interpreted.
    #[error("unexpected output from git {command}: {output}")]
    InvalidOutput {
        /// Git subcommand.
        command: String,
        /// Offending output.
        output: String,
    },
}
