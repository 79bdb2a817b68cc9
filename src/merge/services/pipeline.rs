//! Rebase, test and fast-forward merge of a task's feature branches.

use super::RepositoryLocks;
use crate::config::{CoordinatorConfig, RepositoryConfig};
use crate::merge::domain::{
    FastForwardOutcome, MergeFailure, MergeReport, MergeStep, RebaseOutcome, RetryPolicy,
    TestRunOutcome,
};
use crate::merge::ports::{GitError, GitOps, TestRunner};
use crate::task::domain::{BranchName, CommitSha, RepoBinding, RepoName, Task, TeamName};
use crate::workspace::ports::RepositoryResolver;
use camino::Utf8Path;
use std::sync::Arc;
use tracing::{info, warn};

fn retryable(repository: &RepoName, step: MergeStep, err: &GitError) -> MergeFailure {
    MergeFailure::retryable(repository.clone(), step, err.to_string())
}

/// Merges every repository of a task into its integration branch.
///
/// Each repository goes through the same sequence, and the first failing
/// step stops the task's merge:
///
/// 1. remove any agent worktree holding the feature branch;
/// 2. stash local changes in the repository checkout;
/// 3. rebase the feature branch onto the integration branch;
/// 4. run the repository's tests on the rebased branch;
/// 5. fast-forward the integration branch;
/// 6. delete the feature branch and prune worktree metadata.
///
/// Whatever happens, the checkout is returned to its original branch and
/// the stash is popped. Repositories with a recorded merge are skipped.
#[derive(Clone)]
pub struct MergePipeline {
    git: Arc<dyn GitOps>,
    tests: Arc<dyn TestRunner>,
    resolver: Arc<dyn RepositoryResolver>,
    config: Arc<CoordinatorConfig>,
    locks: RepositoryLocks,
}

impl MergePipeline {
    /// Creates a pipeline with its own lock table.
    #[must_use]
    pub fn new(
        git: Arc<dyn GitOps>,
        tests: Arc<dyn TestRunner>,
        resolver: Arc<dyn RepositoryResolver>,
        config: Arc<CoordinatorConfig>,
    ) -> Self {
        Self {
            git,
            tests,
            resolver,
            config,
            locks: RepositoryLocks::new(),
        }
    }

    /// Shares `locks` with other pipelines of the same coordinator.
    #[must_use]
    pub fn with_locks(mut self, locks: RepositoryLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Returns the retry policy configured for merge failures.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_merge_attempts)
    }

    /// Merges the task's unmerged repositories, recording each merge on
    /// the task as it lands.
    ///
    /// # Errors
    ///
    /// Returns the [`MergeFailure`] of the first repository that could not
    /// be merged. Repositories merged before it keep their recorded
    /// result.
    pub async fn merge_task(&self, task: &mut Task) -> Result<MergeReport, MergeFailure> {
        let team = task.team().clone();
        let task_id = task.id();
        let repositories: Vec<RepoName> = task
            .repositories()
            .iter()
            .map(|binding| binding.repository().clone())
            .collect();
        let _guards = self.locks.acquire(&team, &repositories).await;

        let mut report = MergeReport::default();
        for binding in task.repositories_mut() {
            if binding.is_merged() {
                report.already_merged.push(binding.repository().clone());
                continue;
            }
            let head = self.merge_repository(&team, binding).await?;
            info!(
                task = %task_id,
                repository = %binding.repository(),
                head = %head,
                "merged feature branch"
            );
            report.merged.push((binding.repository().clone(), head.clone()));
            binding.mark_merged(head);
        }
        Ok(report)
    }

    async fn merge_repository(
        &self,
        team: &TeamName,
        binding: &RepoBinding,
    ) -> Result<CommitSha, MergeFailure> {
        let repository = binding.repository();
        let branch = binding.branch();
        let repo = self.resolver.resolve_path(team, repository);
        let settings = self.config.repository(repository);

        self.release_worktree(&repo, repository, branch).await?;
        let original = self
            .git
            .current_branch(&repo)
            .await
            .map_err(|err| retryable(repository, MergeStep::Checkout, &err))?;
        let stashed = self
            .git
            .stash_push(&repo)
            .await
            .map_err(|err| retryable(repository, MergeStep::Stash, &err))?;

        let outcome = self.integrate(&repo, repository, branch, &settings).await;
        self.restore(&repo, repository, original.as_ref(), &settings.integration_branch, stashed)
            .await;
        outcome
    }

    async fn release_worktree(
        &self,
        repo: &Utf8Path,
        repository: &RepoName,
        branch: &BranchName,
    ) -> Result<(), MergeFailure> {
        let held = self
            .git
            .worktree_for_branch(repo, branch)
            .await
            .map_err(|err| retryable(repository, MergeStep::ReleaseWorktree, &err))?;
        if let Some(path) = held {
            self.git
                .remove_worktree(repo, &path)
                .await
                .map_err(|err| retryable(repository, MergeStep::ReleaseWorktree, &err))?;
            info!(repository = %repository, path = %path, "released worktree for merge");
        }
        Ok(())
    }

    async fn integrate(
        &self,
        repo: &Utf8Path,
        repository: &RepoName,
        branch: &BranchName,
        settings: &RepositoryConfig,
    ) -> Result<CommitSha, MergeFailure> {
        let integration = &settings.integration_branch;
        self.git
            .checkout(repo, branch)
            .await
            .map_err(|err| retryable(repository, MergeStep::Checkout, &err))?;

        match self.git.rebase(repo, integration).await {
            Ok(RebaseOutcome::Rebased) => {}
            Ok(RebaseOutcome::Conflict(files)) => {
                self.abort_rebase(repo, repository).await;
                return Err(MergeFailure::permanent(
                    repository.clone(),
                    MergeStep::Rebase,
                    format!("conflicts with {integration} in {}", files.join(", ")),
                ));
            }
            Err(err) => {
                self.abort_rebase(repo, repository).await;
                return Err(retryable(repository, MergeStep::Rebase, &err));
            }
        }

        match self
            .tests
            .run_tests(repo, settings.test_command.as_deref())
            .await
        {
            TestRunOutcome::Passed | TestRunOutcome::Skipped => {}
            TestRunOutcome::Failed(reason) => {
                return Err(MergeFailure::permanent(
                    repository.clone(),
                    MergeStep::Test,
                    format!("tests failed: {reason}"),
                ));
            }
            TestRunOutcome::TimedOut => {
                return Err(MergeFailure::permanent(
                    repository.clone(),
                    MergeStep::Test,
                    "tests timed out",
                ));
            }
            TestRunOutcome::Unavailable(reason) => {
                return Err(MergeFailure::retryable(
                    repository.clone(),
                    MergeStep::Test,
                    reason,
                ));
            }
        }

        self.git
            .checkout(repo, integration)
            .await
            .map_err(|err| retryable(repository, MergeStep::Checkout, &err))?;
        let head = match self.git.merge_fast_forward(repo, branch).await {
            Ok(FastForwardOutcome::Merged(head)) => head,
            Ok(FastForwardOutcome::NotFastForward) => {
                return Err(MergeFailure::permanent(
                    repository.clone(),
                    MergeStep::FastForward,
                    format!("{integration} cannot be fast-forwarded to {branch}"),
                ));
            }
            Err(err) => return Err(retryable(repository, MergeStep::FastForward, &err)),
        };

        if let Err(err) = self.git.delete_branch(repo, branch).await {
            warn!(
                repository = %repository,
                branch = %branch,
                error = %err,
                "failed to delete merged branch"
            );
        }
        if let Err(err) = self.git.prune_worktrees(repo).await {
            warn!(repository = %repository, error = %err, "failed to prune worktrees");
        }
        Ok(head)
    }

    async fn abort_rebase(&self, repo: &Utf8Path, repository: &RepoName) {
        if let Err(err) = self.git.abort_rebase(repo).await {
            warn!(repository = %repository, error = %err, "failed to abort rebase");
        }
    }

    async fn restore(
        &self,
        repo: &Utf8Path,
        repository: &RepoName,
        original: Option<&BranchName>,
        integration: &BranchName,
        stashed: bool,
    ) {
        let target = match original {
            Some(name) => match self.git.branch_exists(repo, name).await {
                Ok(true) => name,
                _ => integration,
            },
            None => integration,
        };
        if let Err(err) = self.git.checkout(repo, target).await {
            warn!(
                repository = %repository,
                branch = %target,
                error = %err,
                "failed to restore branch"
            );
        }
        if !stashed {
            return;
        }
        if let Err(err) = self.git.stash_pop(repo).await {
            warn!(repository = %repository, error = %err, "failed to restore stashed changes");
        }
    }
}
