//! Implementation stage: per-task worktrees and a worker assignee.

use super::{StageContext, StageHooks, assignment::least_loaded};
use crate::dispatch::domain::AgentRole;
use crate::engine::domain::{HookError, HookResult};
use crate::task::domain::{AgentName, ApprovalStatus};
use crate::workflow::domain::StageKind;
use crate::workspace::ports::WorktreeKey;
use async_trait::async_trait;
use tracing::info;

/// Prepares worktrees on entry and keeps the work with one implementer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplementationHooks;

#[async_trait]
impl StageHooks for ImplementationHooks {
    async fn enter(&self, ctx: &mut StageContext<'_>) -> HookResult<()> {
        let team = ctx.task.team().clone();
        let task_id = ctx.task.id();
        let services = ctx.services;
        for binding in ctx.task.repositories_mut() {
            let settings = services.config.repository(binding.repository());
            let key = WorktreeKey::new(team.clone(), binding.repository().clone(), task_id);
            let path = services
                .worktrees
                .create(&key, binding.branch(), &settings.integration_branch)
                .await
                .map_err(|err| {
                    HookError::action(format!(
                        "failed to prepare worktree for {}: {err}",
                        binding.repository()
                    ))
                })?;
            if binding.base_sha().is_none() {
                let checkout = services.resolver.resolve_path(&team, binding.repository());
                let base = services
                    .git
                    .rev_parse(&checkout, settings.integration_branch.as_str())
                    .await
                    .map_err(|err| {
                        HookError::action(format!(
                            "failed to resolve {} in {}: {err}",
                            settings.integration_branch,
                            binding.repository()
                        ))
                    })?;
                binding.set_base_sha_once(base);
            }
            info!(
                task = %task_id,
                repository = %binding.repository(),
                worktree = %path,
                "worktree ready"
            );
        }

        if ctx.from.kind() == StageKind::Review {
            ctx.task.set_approval_status(ApprovalStatus::Rejected);
            ctx.task.set_rejection_reason(ctx.note.map(str::to_owned));
        }
        Ok(())
    }

    async fn assign(&self, ctx: &mut StageContext<'_>) -> HookResult<Option<AgentName>> {
        if let Some(implementer) = ctx.task.implementer() {
            return Ok(Some(implementer));
        }
        let chosen = match keep_agent_assignee(ctx).await? {
            Some(current) => Some(current),
            None => least_loaded(ctx.services, ctx.task.team(), AgentRole::Worker, None).await?,
        };
        if let Some(implementer) = &chosen {
            ctx.task.record_implementer(implementer);
        }
        Ok(chosen)
    }
}

async fn keep_agent_assignee(ctx: &StageContext<'_>) -> HookResult<Option<AgentName>> {
    let Some(assignee) = ctx.task.assignee() else {
        return Ok(None);
    };
    let agent = ctx
        .services
        .agents
        .find(ctx.task.team(), assignee)
        .await
        .map_err(|err| HookError::action(format!("failed to look up {assignee}: {err}")))?;
    Ok(agent
        .filter(|record| !record.is_human())
        .map(|record| record.name().clone()))
}
