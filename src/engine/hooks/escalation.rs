//! Stages that hand a task to a human.

use super::{MERGE_FAILURE_METADATA_KEY, StageContext, StageHooks};
use crate::audit::domain::NotificationTemplate;
use crate::engine::domain::HookResult;
use crate::task::domain::AgentName;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

/// Renders `template`, falling back to the raw fields when rendering
/// fails.
pub(crate) fn render_notification(
    template: NotificationTemplate,
    fields: impl IntoIterator<Item = (&'static str, Value)>,
) -> String {
    let context: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect();
    template.render(&context).unwrap_or_else(|err| {
        warn!(template = template.name(), error = %err, "falling back to raw notification");
        format!(
            "{}: {}",
            template.name(),
            serde_json::to_string(&context).unwrap_or_default()
        )
    })
}

/// Notifies the responsible human once when the merge pipeline gives up.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeFailedHooks;

#[async_trait]
impl StageHooks for MergeFailedHooks {
    async fn enter(&self, ctx: &mut StageContext<'_>) -> HookResult<()> {
        let human = ctx.services.responsible_human(ctx.task).await;
        let reason = ctx
            .task
            .metadata()
            .get(MERGE_FAILURE_METADATA_KEY)
            .and_then(|failure| failure.get("reason"))
            .and_then(Value::as_str)
            .unwrap_or("the merge pipeline gave up")
            .to_owned();
        let body = render_notification(
            NotificationTemplate::MergeFailed,
            [
                ("task_id", Value::from(ctx.task.id().to_string())),
                ("title", Value::from(ctx.task.title())),
                ("attempts", Value::from(ctx.task.merge_attempts())),
                ("reason", Value::from(reason)),
                ("stage", Value::from(ctx.to.key().as_str())),
            ],
        );
        ctx.escalate_after_commit(human, body);
        Ok(())
    }

    async fn assign(&self, ctx: &mut StageContext<'_>) -> HookResult<Option<AgentName>> {
        Ok(Some(ctx.services.responsible_human(ctx.task).await))
    }
}

/// Assigns tasks diverted by a hook fault to the responsible human.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHooks;

#[async_trait]
impl StageHooks for ErrorHooks {
    async fn assign(&self, ctx: &mut StageContext<'_>) -> HookResult<Option<AgentName>> {
        Ok(Some(ctx.services.responsible_human(ctx.task).await))
    }
}
