//! In-memory git model for tests and dry runs.

use crate::merge::domain::{FastForwardOutcome, RebaseOutcome, TestRunOutcome};
use crate::merge::ports::{GitError, GitOps, GitResult, TestRunner};
use crate::task::domain::{BranchName, CommitSha};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitOperation {
    /// [`GitOps::worktree_for_branch`].
    ListWorktrees,
    /// [`GitOps::add_worktree`].
    AddWorktree,
    /// [`GitOps::checkout`].
    Checkout,
    /// [`GitOps::rebase`].
    Rebase,
    /// [`GitOps::merge_fast_forward`].
    FastForward,
    /// [`GitOps::rev_parse`].
    RevParse,
}

impl GitOperation {
    const fn command(self) -> &'static str {
        match self {
            Self::ListWorktrees | Self::AddWorktree => "worktree",
            Self::Checkout => "checkout",
            Self::Rebase => "rebase",
            Self::FastForward => "merge",
            Self::RevParse => "rev-parse",
        }
    }
}

#[derive(Debug, Default)]
struct RepoState {
    branches: BTreeMap<BranchName, Vec<CommitSha>>,
    head: Option<BranchName>,
    worktrees: BTreeMap<BranchName, Utf8PathBuf>,
    dirty: bool,
    stashes: usize,
    rebase_in_progress: bool,
    pending_conflict: Option<Vec<String>>,
    reject_fast_forward: bool,
}

impl RepoState {
    fn history(&self, branch: &BranchName) -> Option<&Vec<CommitSha>> {
        self.branches.get(branch)
    }

    fn resolve(&self, rev: &str) -> Option<Vec<CommitSha>> {
        if rev == "HEAD" {
            return self.head.as_ref().and_then(|head| self.history(head)).cloned();
        }
        if let Some(history) = BranchName::new(rev)
            .ok()
            .and_then(|branch| self.branches.get(&branch))
        {
            return Some(history.clone());
        }
        self.branches.values().find_map(|history| {
            history
                .iter()
                .position(|sha| sha.as_str() == rev)
                .map(|index| history.iter().take(index + 1).cloned().collect())
        })
    }
}

#[derive(Debug, Default)]
struct GitState {
    repos: HashMap<Utf8PathBuf, RepoState>,
    failures: HashMap<GitOperation, u32>,
    sequence: u64,
}

impl GitState {
    fn next_sha(&mut self) -> CommitSha {
        self.sequence = self.sequence.saturating_add(1);
        CommitSha::from_hex_unchecked(format!("{:040x}", self.sequence))
    }

    fn take_failure(&mut self, operation: GitOperation) -> GitResult<()> {
        match self.failures.get_mut(&operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(GitError::CommandFailed {
                    command: operation.command().to_owned(),
                    detail: "injected failure".to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    fn repo_mut(&mut self, repo: &Utf8Path) -> GitResult<&mut RepoState> {
        self.repos.get_mut(repo).ok_or_else(|| not_a_repository(repo))
    }
}

fn not_a_repository(repo: &Utf8Path) -> GitError {
    GitError::CommandFailed {
        command: "rev-parse".to_owned(),
        detail: format!("'{repo}' is not a git repository"),
    }
}

fn failed(command: &str, detail: impl Into<String>) -> GitError {
    GitError::CommandFailed {
        command: command.to_owned(),
        detail: detail.into(),
    }
}

/// Models branches, worktrees, stashes and rebases of several repositories
/// without touching disk.
///
/// Rebases replay the branch's own commits on top of the target; a
/// conflict or a diverged integration branch can be scripted per
/// repository, and any [`GitOperation`] can be made to fail a number of
/// times.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGit {
    state: Arc<Mutex<GitState>>,
}

impl InMemoryGit {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a repository at `repo` with one commit on `integration`,
    /// which is checked out.
    pub fn init_repository(&self, repo: &Utf8Path, integration: &BranchName) -> CommitSha {
        let mut state = self.lock();
        let root = state.next_sha();
        let mut repository = RepoState::default();
        repository
            .branches
            .insert(integration.clone(), vec![root.clone()]);
        repository.head = Some(integration.clone());
        state.repos.insert(repo.to_owned(), repository);
        root
    }

    /// Adds a commit to `branch` and returns its SHA.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::CommandFailed`] for an unknown repository or
    /// branch.
    pub fn commit(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<CommitSha> {
        let mut state = self.lock();
        let sha = state.next_sha();
        let history = state
            .repo_mut(repo)?
            .branches
            .get_mut(branch)
            .ok_or_else(|| failed("commit", format!("unknown branch {branch}")))?;
        history.push(sha.clone());
        Ok(sha)
    }

    /// Leaves uncommitted changes in the repository checkout.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::CommandFailed`] for an unknown repository.
    pub fn make_dirty(&self, repo: &Utf8Path) -> GitResult<()> {
        self.lock().repo_mut(repo)?.dirty = true;
        Ok(())
    }

    /// Makes the next rebase in `repo` stop on conflicts in `files`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::CommandFailed`] for an unknown repository.
    pub fn script_conflict(&self, repo: &Utf8Path, files: &[&str]) -> GitResult<()> {
        self.lock().repo_mut(repo)?.pending_conflict =
            Some(files.iter().map(|file| (*file).to_owned()).collect());
        Ok(())
    }

    /// Makes fast-forward merges in `repo` report diverged history.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::CommandFailed`] for an unknown repository.
    pub fn reject_fast_forward(&self, repo: &Utf8Path) -> GitResult<()> {
        self.lock().repo_mut(repo)?.reject_fast_forward = true;
        Ok(())
    }

    /// Makes the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: GitOperation, times: u32) {
        self.lock().failures.insert(operation, times);
    }

    /// Returns the checked-out branch of `repo`.
    #[must_use]
    pub fn head(&self, repo: &Utf8Path) -> Option<BranchName> {
        self.lock().repos.get(repo).and_then(|state| state.head.clone())
    }

    /// Returns the tip of `branch`.
    #[must_use]
    pub fn branch_tip(&self, repo: &Utf8Path, branch: &BranchName) -> Option<CommitSha> {
        self.lock()
            .repos
            .get(repo)
            .and_then(|state| state.history(branch))
            .and_then(|history| history.last().cloned())
    }

    /// Returns `true` when the checkout has uncommitted changes.
    #[must_use]
    pub fn is_dirty(&self, repo: &Utf8Path) -> bool {
        self.lock().repos.get(repo).is_some_and(|state| state.dirty)
    }

    /// Returns the number of stash entries.
    #[must_use]
    pub fn stash_count(&self, repo: &Utf8Path) -> usize {
        self.lock().repos.get(repo).map_or(0, |state| state.stashes)
    }

    /// Returns `true` while a rebase is stopped on conflicts.
    #[must_use]
    pub fn rebase_in_progress(&self, repo: &Utf8Path) -> bool {
        self.lock()
            .repos
            .get(repo)
            .is_some_and(|state| state.rebase_in_progress)
    }

    /// Returns the linked worktrees of `repo` by branch.
    #[must_use]
    pub fn worktrees(&self, repo: &Utf8Path) -> BTreeMap<BranchName, Utf8PathBuf> {
        self.lock()
            .repos
            .get(repo)
            .map(|state| state.worktrees.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GitOps for InMemoryGit {
    async fn worktree_for_branch(
        &self,
        repo: &Utf8Path,
        branch: &BranchName,
    ) -> GitResult<Option<Utf8PathBuf>> {
        let mut state = self.lock();
        state.take_failure(GitOperation::ListWorktrees)?;
        Ok(state.repo_mut(repo)?.worktrees.get(branch).cloned())
    }

    async fn add_worktree(
        &self,
        repo: &Utf8Path,
        path: &Utf8Path,
        branch: &BranchName,
        start_point: Option<&BranchName>,
    ) -> GitResult<()> {
        let mut state = self.lock();
        state.take_failure(GitOperation::AddWorktree)?;
        let repository = state.repo_mut(repo)?;
        if repository.worktrees.contains_key(branch) || repository.head.as_ref() == Some(branch) {
            return Err(failed("worktree", format!("'{branch}' is already checked out")));
        }
        match start_point {
            Some(start) => {
                if repository.branches.contains_key(branch) {
                    return Err(failed("worktree", format!("branch '{branch}' already exists")));
                }
                let history = repository
                    .history(start)
                    .cloned()
                    .ok_or_else(|| failed("worktree", format!("invalid reference: {start}")))?;
                repository.branches.insert(branch.clone(), history);
            }
            None if !repository.branches.contains_key(branch) => {
                return Err(failed("worktree", format!("invalid reference: {branch}")));
            }
            None => {}
        }
        repository.worktrees.insert(branch.clone(), path.to_owned());
        Ok(())
    }

    async fn remove_worktree(&self, repo: &Utf8Path, path: &Utf8Path) -> GitResult<()> {
        let mut state = self.lock();
        let repository = state.repo_mut(repo)?;
        let before = repository.worktrees.len();
        repository.worktrees.retain(|_, held| held != path);
        if repository.worktrees.len() == before {
            return Err(failed("worktree", format!("'{path}' is not a working tree")));
        }
        Ok(())
    }

    async fn prune_worktrees(&self, repo: &Utf8Path) -> GitResult<()> {
        self.lock().repo_mut(repo).map(drop)
    }

    async fn current_branch(&self, repo: &Utf8Path) -> GitResult<Option<BranchName>> {
        Ok(self.lock().repo_mut(repo)?.head.clone())
    }

    async fn stash_push(&self, repo: &Utf8Path) -> GitResult<bool> {
        let mut state = self.lock();
        let repository = state.repo_mut(repo)?;
        if !repository.dirty {
            return Ok(false);
        }
        repository.dirty = false;
        repository.stashes += 1;
        Ok(true)
    }

    async fn stash_pop(&self, repo: &Utf8Path) -> GitResult<()> {
        let mut state = self.lock();
        let repository = state.repo_mut(repo)?;
        if repository.stashes == 0 {
            return Err(failed("stash", "no stash entries found"));
        }
        repository.stashes -= 1;
        repository.dirty = true;
        Ok(())
    }

    async fn checkout(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<()> {
        let mut state = self.lock();
        state.take_failure(GitOperation::Checkout)?;
        let repository = state.repo_mut(repo)?;
        if repository.rebase_in_progress {
            return Err(failed("checkout", "a rebase is in progress"));
        }
        if !repository.branches.contains_key(branch) {
            return Err(failed("checkout", format!("pathspec '{branch}' did not match")));
        }
        if repository.worktrees.contains_key(branch) {
            return Err(failed("checkout", format!("'{branch}' is already used by a worktree")));
        }
        repository.head = Some(branch.clone());
        Ok(())
    }

    async fn rebase(&self, repo: &Utf8Path, onto: &BranchName) -> GitResult<RebaseOutcome> {
        let mut state = self.lock();
        state.take_failure(GitOperation::Rebase)?;
        let repository = state.repo_mut(repo)?;
        if let Some(files) = repository.pending_conflict.take() {
            repository.rebase_in_progress = true;
            return Ok(RebaseOutcome::Conflict(files));
        }
        let head = repository
            .head
            .clone()
            .ok_or_else(|| failed("rebase", "HEAD is detached"))?;
        let target = repository
            .history(onto)
            .cloned()
            .ok_or_else(|| failed("rebase", format!("invalid upstream '{onto}'")))?;
        let own: Vec<CommitSha> = repository
            .history(&head)
            .map(|history| {
                history
                    .iter()
                    .filter(|sha| !target.contains(sha))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let mut rebased = target;
        rebased.extend(own);
        repository.branches.insert(head, rebased);
        Ok(RebaseOutcome::Rebased)
    }

    async fn abort_rebase(&self, repo: &Utf8Path) -> GitResult<()> {
        let mut state = self.lock();
        let repository = state.repo_mut(repo)?;
        if !repository.rebase_in_progress {
            return Err(failed("rebase", "no rebase in progress"));
        }
        repository.rebase_in_progress = false;
        Ok(())
    }

    async fn merge_fast_forward(
        &self,
        repo: &Utf8Path,
        branch: &BranchName,
    ) -> GitResult<FastForwardOutcome> {
        let mut state = self.lock();
        state.take_failure(GitOperation::FastForward)?;
        let repository = state.repo_mut(repo)?;
        let head = repository
            .head
            .clone()
            .ok_or_else(|| failed("merge", "HEAD is detached"))?;
        let current = repository.history(&head).cloned().unwrap_or_default();
        let incoming = repository
            .history(branch)
            .cloned()
            .ok_or_else(|| failed("merge", format!("'{branch}' does not point to a commit")))?;
        if repository.reject_fast_forward || !incoming.starts_with(&current) {
            return Ok(FastForwardOutcome::NotFastForward);
        }
        let tip = incoming
            .last()
            .cloned()
            .ok_or_else(|| failed("merge", "empty history"))?;
        repository.branches.insert(head, incoming);
        Ok(FastForwardOutcome::Merged(tip))
    }

    async fn rev_parse(&self, repo: &Utf8Path, rev: &str) -> GitResult<CommitSha> {
        let mut state = self.lock();
        state.take_failure(GitOperation::RevParse)?;
        state
            .repo_mut(repo)?
            .resolve(rev)
            .and_then(|history| history.last().cloned())
            .ok_or_else(|| failed("rev-parse", format!("unknown revision '{rev}'")))
    }

    async fn unreviewed_commits(
        &self,
        repo: &Utf8Path,
        integration: &BranchName,
        reviewed: Option<&CommitSha>,
        head: &BranchName,
    ) -> GitResult<Vec<CommitSha>> {
        let mut state = self.lock();
        let repository = state.repo_mut(repo)?;
        let upstream = repository.history(integration).cloned().unwrap_or_default();
        let seen = reviewed
            .and_then(|sha| repository.resolve(sha.as_str()))
            .unwrap_or_default();
        let history = repository
            .history(head)
            .ok_or_else(|| failed("rev-list", format!("unknown revision '{head}'")))?;
        Ok(history
            .iter()
            .filter(|sha| !upstream.contains(sha) && !seen.contains(sha))
            .cloned()
            .collect())
    }

    async fn parent_count(&self, repo: &Utf8Path, rev: &str) -> GitResult<usize> {
        let mut state = self.lock();
        let history = state
            .repo_mut(repo)?
            .resolve(rev)
            .ok_or_else(|| failed("rev-list", format!("unknown revision '{rev}'")))?;
        Ok(usize::from(history.len() > 1))
    }

    async fn branch_exists(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<bool> {
        Ok(self.lock().repo_mut(repo)?.branches.contains_key(branch))
    }

    async fn delete_branch(&self, repo: &Utf8Path, branch: &BranchName) -> GitResult<()> {
        let mut state = self.lock();
        let repository = state.repo_mut(repo)?;
        if repository.head.as_ref() == Some(branch) || repository.worktrees.contains_key(branch) {
            return Err(failed("branch", format!("cannot delete checked-out branch '{branch}'")));
        }
        repository
            .branches
            .remove(branch)
            .map(drop)
            .ok_or_else(|| failed("branch", format!("branch '{branch}' not found")))
    }
}

/// Test runner returning scripted outcomes, [`TestRunOutcome::Passed`] once
/// the script is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTestRunner {
    outcomes: Arc<Mutex<VecDeque<TestRunOutcome>>>,
    runs: Arc<Mutex<Vec<Utf8PathBuf>>>,
}

impl ScriptedTestRunner {
    /// Creates a runner that always passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of a future run.
    pub fn push_outcome(&self, outcome: TestRunOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Returns the checkouts tests ran in, in order.
    #[must_use]
    pub fn runs(&self) -> Vec<Utf8PathBuf> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl TestRunner for ScriptedTestRunner {
    async fn run_tests(&self, checkout: &Utf8Path, _configured: Option<&str>) -> TestRunOutcome {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(checkout.to_owned());
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(TestRunOutcome::Passed)
    }
}
