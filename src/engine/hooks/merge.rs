//! Merge stage: approval bookkeeping and the merge pipeline action.

use super::{StageContext, StageHooks};
use crate::audit::domain::AuditEventKind;
use crate::engine::domain::{HookError, HookResult};
use crate::merge::domain::MergeDecision;
use crate::task::domain::ApprovalStatus;
use crate::workflow::domain::{StageKey, StageKind};
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// Metadata key holding the failure that escalated a merge.
pub const MERGE_FAILURE_METADATA_KEY: &str = "merge_failure";

/// Runs the merge pipeline when the scheduler drives the stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeHooks;

fn target_of_kind(ctx: &StageContext<'_>, kind: StageKind) -> HookResult<StageKey> {
    ctx.workflow
        .first_stage_of_kind(kind)
        .map(|stage| stage.key().clone())
        .ok_or_else(|| {
            HookError::action(format!(
                "workflow {} has no '{kind}' stage",
                ctx.workflow.workflow_ref()
            ))
        })
}

#[async_trait]
impl StageHooks for MergeHooks {
    async fn enter(&self, ctx: &mut StageContext<'_>) -> HookResult<()> {
        if ctx.from.key() != ctx.to.key() {
            ctx.task.set_approval_status(ApprovalStatus::Approved);
            ctx.task.reset_merge_attempts();
        }
        Ok(())
    }

    async fn action(&self, ctx: &mut StageContext<'_>) -> HookResult<Option<StageKey>> {
        let services = ctx.services;
        let team = ctx.task.team().clone();
        let task_id = ctx.task.id();

        let failure = match services.merge.merge_task(ctx.task).await {
            Ok(report) => {
                let merged = target_of_kind(ctx, StageKind::Merged)?;
                let heads = report
                    .merged
                    .iter()
                    .map(|(repository, head)| format!("{repository}@{head}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(task = %task_id, heads = %heads, "merge pipeline succeeded");
                services
                    .audit
                    .record(
                        &team,
                        Some(task_id),
                        AuditEventKind::MergeSucceeded,
                        format!("merged {heads}"),
                    )
                    .await;
                return Ok(Some(merged));
            }
            Err(failure) => failure,
        };

        services
            .audit
            .record(
                &team,
                Some(task_id),
                AuditEventKind::MergeFailed,
                failure.to_string(),
            )
            .await;
        match services.merge.retry_policy().on_failure(ctx.task, &failure) {
            MergeDecision::Retry { attempts } => {
                warn!(
                    task = %task_id,
                    attempts,
                    error = %failure,
                    "merge failed, retrying on a later tick"
                );
                Ok(Some(ctx.to.key().clone()))
            }
            MergeDecision::Escalate { attempts } => {
                let target = target_of_kind(ctx, StageKind::MergeFailed)?;
                ctx.task.set_metadata(
                    MERGE_FAILURE_METADATA_KEY,
                    json!({
                        "repository": failure.repository().as_str(),
                        "step": failure.step().as_str(),
                        "retryable": failure.is_retryable(),
                        "reason": failure.reason(),
                        "attempts": attempts,
                    }),
                );
                warn!(task = %task_id, attempts, error = %failure, "merge failed, escalating");
                Ok(Some(target))
            }
        }
    }
}
