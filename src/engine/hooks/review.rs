//! Review stage: gate on new commits and pick a reviewer.

use super::{StageContext, StageHooks, assignment::least_loaded};
use crate::dispatch::domain::AgentRole;
use crate::engine::domain::{HookError, HookResult};
use crate::task::domain::{AgentName, CommitSha, RepoName};
use async_trait::async_trait;
use tracing::info;

/// Gate message when a review is requested without new work.
pub const NO_NEW_COMMITS: &str = "No new commits since the last review request";

/// Records the commits under review.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewHooks;

#[async_trait]
impl StageHooks for ReviewHooks {
    async fn enter(&self, ctx: &mut StageContext<'_>) -> HookResult<()> {
        let team = ctx.task.team();
        let mut fresh: Vec<(RepoName, Vec<CommitSha>)> = Vec::new();
        for binding in ctx.task.repositories() {
            let settings = ctx.services.config.repository(binding.repository());
            let checkout = ctx.services.resolver.resolve_path(team, binding.repository());
            let commits = ctx
                .services
                .git
                .unreviewed_commits(
                    &checkout,
                    &settings.integration_branch,
                    binding.commits().last(),
                    binding.branch(),
                )
                .await
                .map_err(|err| {
                    HookError::action(format!(
                        "failed to list commits in {}: {err}",
                        binding.repository()
                    ))
                })?;
            let new_commits: Vec<CommitSha> = commits
                .into_iter()
                .filter(|sha| !binding.commits().contains(sha))
                .collect();
            if !new_commits.is_empty() {
                fresh.push((binding.repository().clone(), new_commits));
            }
        }

        if fresh.is_empty() {
            return Err(HookError::gate(NO_NEW_COMMITS));
        }
        let task_id = ctx.task.id();
        for (repository, commits) in fresh {
            if let Some(binding) = ctx.task.repository_mut(&repository) {
                let recorded = binding.record_commits(commits);
                info!(
                    task = %task_id,
                    repository = %repository,
                    commits = recorded,
                    "recorded commits for review"
                );
            }
        }
        ctx.task.record_review_request();
        Ok(())
    }

    async fn assign(&self, ctx: &mut StageContext<'_>) -> HookResult<Option<AgentName>> {
        if let Some(reviewer) = ctx.task.reviewer() {
            return Ok(Some(reviewer.clone()));
        }
        let implementer = ctx.task.implementer();
        let picked = least_loaded(
            ctx.services,
            ctx.task.team(),
            AgentRole::Reviewer,
            implementer.as_ref(),
        )
        .await?;
        if picked.is_some() {
            ctx.task.set_reviewer(picked.clone());
        }
        Ok(picked)
    }
}
