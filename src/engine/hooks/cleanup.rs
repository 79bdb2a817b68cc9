//! Terminal stages release the task's worktrees.

use super::{StageContext, StageHooks};
use crate::engine::domain::HookResult;
use crate::workspace::ports::WorktreeKey;
use async_trait::async_trait;
use tracing::{info, warn};

/// Removes every worktree of the task; failures are logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupHooks;

#[async_trait]
impl StageHooks for CleanupHooks {
    async fn enter(&self, ctx: &mut StageContext<'_>) -> HookResult<()> {
        let task_id = ctx.task.id();
        for binding in ctx.task.repositories() {
            let key = WorktreeKey::new(
                ctx.task.team().clone(),
                binding.repository().clone(),
                task_id,
            );
            match ctx.services.worktrees.remove(&key).await {
                Ok(()) => {
                    info!(
                        task = %task_id,
                        repository = %binding.repository(),
                        "removed worktree"
                    );
                }
                Err(err) => warn!(
                    task = %task_id,
                    repository = %binding.repository(),
                    error = %err,
                    "failed to remove worktree"
                ),
            }
        }
        Ok(())
    }
}
