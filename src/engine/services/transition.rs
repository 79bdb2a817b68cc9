//! The single path that changes a task's status.

use crate::audit::domain::{AuditEventKind, NotificationTemplate};
use crate::engine::domain::{
    AutoOutcome, HookError, HookResult, TransitionError, TransitionOutcome, TransitionRequest,
    TransitionResult,
};
use crate::engine::hooks::{
    HookSet, PendingEscalation, StageContext, StageServices, render_notification,
};
use crate::task::domain::{AgentName, Task, TaskId};
use crate::workflow::domain::{Stage, StageKey, WorkflowDef};
use crate::workflow::services::WorkflowRegistry;
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

fn stage<'w>(workflow: &'w WorkflowDef, key: &StageKey) -> TransitionResult<&'w Stage> {
    workflow
        .stage(key)
        .ok_or_else(|| TransitionError::UnknownStage {
            stage: key.clone(),
            workflow: workflow.workflow_ref(),
        })
}

/// Moves tasks between the stages of their pinned workflow.
///
/// Hooks work on a copy of the task. The copy is written back with a
/// revision check only once the move is settled, so a rejected gate
/// leaves nothing behind.
pub struct TransitionEngine<C>
where
    C: Clock + Send + Sync,
{
    workflows: WorkflowRegistry,
    hooks: HookSet,
    services: Arc<StageServices>,
    clock: Arc<C>,
}

impl<C> Clone for TransitionEngine<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            workflows: self.workflows.clone(),
            hooks: self.hooks.clone(),
            services: Arc::clone(&self.services),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> TransitionEngine<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an engine.
    #[must_use]
    pub const fn new(
        workflows: WorkflowRegistry,
        hooks: HookSet,
        services: Arc<StageServices>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            workflows,
            hooks,
            services,
            clock,
        }
    }

    /// Returns the collaborators shared with the hooks.
    #[must_use]
    pub fn services(&self) -> &StageServices {
        &self.services
    }

    /// Returns `true` when `task` rests in an auto stage of its pinned
    /// workflow.
    #[must_use]
    pub fn is_auto(&self, task: &Task) -> bool {
        self.workflows
            .resolve(task.workflow())
            .is_some_and(|workflow| workflow.is_auto(task.status()))
    }

    /// Moves a task to `request.target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::TerminalStage`] or
    /// [`TransitionError::NotAllowed`] when the workflow forbids the move,
    /// [`TransitionError::Gate`] when the target's gate rejects it (the
    /// task is unchanged), [`TransitionError::Action`] when a hook fault
    /// occurs in a workflow without an error stage, and
    /// [`TransitionError::Repository`] when persistence fails.
    pub async fn transition(
        &self,
        request: TransitionRequest,
    ) -> TransitionResult<TransitionOutcome> {
        let task = self.load_task(request.task_id).await?;
        let workflow = self.workflow_for(&task)?;
        self.apply(task, &workflow, &request.target, request.note.as_deref())
            .await
    }

    /// Runs the action of the auto stage the task rests in.
    ///
    /// A gate error from the action is logged and treated as a request to
    /// retry later.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TransitionEngine::transition`] for the move
    /// the action requests.
    pub async fn run_auto_action(&self, task_id: TaskId) -> TransitionResult<AutoOutcome> {
        let task = self.load_task(task_id).await?;
        let workflow = self.workflow_for(&task)?;
        let current = stage(&workflow, task.status())?;
        if !current.is_auto() || current.is_terminal() {
            return Ok(AutoOutcome::NotAuto);
        }

        let expected_revision = task.revision();
        let mut draft = task;
        let (requested, escalations) = {
            let mut ctx =
                StageContext::new(&mut draft, &workflow, current, current, &self.services);
            let result = self.hooks.hooks_for(current.kind()).action(&mut ctx).await;
            (result, ctx.take_escalations())
        };

        match requested {
            Ok(None) => Ok(AutoOutcome::Idle),
            Ok(Some(next)) if next == *current.key() => {
                draft.touch(&*self.clock);
                self.services
                    .tasks
                    .update(&draft, expected_revision)
                    .await?;
                info!(task = %task_id, stage = %current.key(), "auto action kept task in place");
                self.deliver(&draft, escalations).await;
                Ok(AutoOutcome::Stayed(Box::new(draft)))
            }
            Ok(Some(next)) => {
                let outcome = self.apply(draft, &workflow, &next, None).await?;
                self.deliver(outcome.task(), escalations).await;
                Ok(AutoOutcome::Transitioned(Box::new(outcome)))
            }
            Err(HookError::Gate(reason)) => {
                warn!(
                    task = %task_id,
                    stage = %current.key(),
                    reason = %reason,
                    "auto action deferred"
                );
                Ok(AutoOutcome::Idle)
            }
            Err(HookError::Action(reason)) => {
                let outcome = self
                    .escalate(draft, &workflow, current, current, reason)
                    .await?;
                Ok(AutoOutcome::Transitioned(Box::new(outcome)))
            }
        }
    }

    async fn load_task(&self, task_id: TaskId) -> TransitionResult<Task> {
        self.services
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(TransitionError::TaskNotFound(task_id))
    }

    fn workflow_for(&self, task: &Task) -> TransitionResult<Arc<WorkflowDef>> {
        self.workflows
            .resolve(task.workflow())
            .ok_or_else(|| TransitionError::WorkflowNotRegistered(task.workflow().clone()))
    }

    async fn apply(
        &self,
        task: Task,
        workflow: &WorkflowDef,
        target: &StageKey,
        note: Option<&str>,
    ) -> TransitionResult<TransitionOutcome> {
        let from = stage(workflow, task.status())?;
        if from.is_terminal() {
            return Err(TransitionError::TerminalStage(from.key().clone()));
        }
        let to = stage(workflow, target)?;
        if !workflow.allows(from.key(), to.key()) {
            return Err(TransitionError::NotAllowed {
                from: from.key().clone(),
                to: to.key().clone(),
            });
        }

        let expected_revision = task.revision();
        let mut draft = task.clone();
        let (settled, escalations) = {
            let mut ctx =
                StageContext::new(&mut draft, workflow, from, to, &self.services).with_note(note);
            self.run_exit(&mut ctx).await;
            let result = self.enter_and_assign(&mut ctx).await;
            (result, ctx.take_escalations())
        };

        match settled {
            Ok(assignee) => {
                if assignee.is_some() {
                    draft.set_assignee(assignee);
                }
                draft.move_to(to.key().clone(), to.is_terminal(), &*self.clock);
                draft.touch(&*self.clock);
                self.services
                    .tasks
                    .update(&draft, expected_revision)
                    .await?;
                info!(task = %draft.id(), from = %from.key(), to = %to.key(), "task moved");
                self.services
                    .audit
                    .record(
                        draft.team(),
                        Some(draft.id()),
                        AuditEventKind::StatusChanged,
                        format!("{} -> {}", from.key(), to.key()),
                    )
                    .await;
                self.deliver(&draft, escalations).await;
                Ok(TransitionOutcome::Moved(draft))
            }
            Err(HookError::Gate(reason)) => {
                warn!(
                    task = %task.id(),
                    from = %from.key(),
                    to = %to.key(),
                    reason = %reason,
                    "gate rejected transition"
                );
                self.services
                    .audit
                    .record(
                        task.team(),
                        Some(task.id()),
                        AuditEventKind::GateRejected,
                        format!("{} -> {} rejected: {reason}", from.key(), to.key()),
                    )
                    .await;
                Err(TransitionError::Gate(reason))
            }
            Err(HookError::Action(reason)) => self.escalate(task, workflow, from, to, reason).await,
        }
    }

    async fn run_exit(&self, ctx: &mut StageContext<'_>) {
        let Err(err) = self.hooks.hooks_for(ctx.from.kind()).exit(ctx).await else {
            return;
        };
        warn!(task = %ctx.task.id(), stage = %ctx.from.key(), error = %err, "exit hook failed");
        self.services
            .audit
            .record(
                ctx.task.team(),
                Some(ctx.task.id()),
                AuditEventKind::ExitHookFailed,
                format!("leaving {}: {err}", ctx.from.key()),
            )
            .await;
    }

    async fn enter_and_assign(&self, ctx: &mut StageContext<'_>) -> HookResult<Option<AgentName>> {
        let hooks = self.hooks.hooks_for(ctx.to.kind());
        hooks.enter(ctx).await?;
        hooks.assign(ctx).await
    }

    /// Forces `task` into the error stage after a hook fault in the move
    /// `from -> to`.
    async fn escalate(
        &self,
        task: Task,
        workflow: &WorkflowDef,
        from: &Stage,
        to: &Stage,
        reason: String,
    ) -> TransitionResult<TransitionOutcome> {
        error!(
            task = %task.id(),
            from = %from.key(),
            to = %to.key(),
            reason = %reason,
            "stage hook failed"
        );
        self.services
            .audit
            .record(
                task.team(),
                Some(task.id()),
                AuditEventKind::ActionFailed,
                format!("{} -> {}: {reason}", from.key(), to.key()),
            )
            .await;
        let human = self.services.responsible_human(&task).await;

        let Some(error_key) = workflow.error_stage() else {
            self.notify_action_failed(&task, from, to, task.status(), &reason, &human)
                .await;
            return Err(TransitionError::Action(reason));
        };
        let error_stage = stage(workflow, error_key)?;

        let expected_revision = task.revision();
        let mut draft = task;
        let assigned = {
            let mut ctx = StageContext::new(&mut draft, workflow, from, error_stage, &self.services)
                .with_note(Some(reason.as_str()));
            self.hooks
                .hooks_for(error_stage.kind())
                .assign(&mut ctx)
                .await
        };
        let assignee = match assigned {
            Ok(Some(assignee)) => assignee,
            Ok(None) => human.clone(),
            Err(err) => {
                warn!(task = %draft.id(), error = %err, "error stage assign failed");
                human.clone()
            }
        };
        draft.set_assignee(Some(assignee));
        draft.move_to(error_key.clone(), error_stage.is_terminal(), &*self.clock);
        draft.touch(&*self.clock);
        self.services
            .tasks
            .update(&draft, expected_revision)
            .await?;
        self.services
            .audit
            .record(
                draft.team(),
                Some(draft.id()),
                AuditEventKind::StatusChanged,
                format!("{} -> {} (forced)", from.key(), error_key),
            )
            .await;
        self.notify_action_failed(&draft, from, to, error_key, &reason, &human)
            .await;
        Ok(TransitionOutcome::Escalated {
            task: draft,
            reason,
        })
    }

    async fn deliver(&self, task: &Task, escalations: Vec<PendingEscalation>) {
        for pending in escalations {
            self.services
                .audit
                .escalate(task.team(), Some(task.id()), Some(&pending.recipient), &pending.body)
                .await;
        }
    }

    async fn notify_action_failed(
        &self,
        task: &Task,
        from: &Stage,
        to: &Stage,
        resting: &StageKey,
        reason: &str,
        human: &AgentName,
    ) {
        let body = render_notification(
            NotificationTemplate::ActionFailed,
            [
                ("task_id", Value::from(task.id().to_string())),
                ("title", Value::from(task.title())),
                ("from", Value::from(from.key().as_str())),
                ("to", Value::from(to.key().as_str())),
                ("reason", Value::from(reason)),
                ("stage", Value::from(resting.as_str())),
            ],
        );
        self.services
            .audit
            .escalate(task.team(), Some(task.id()), Some(human), &body)
            .await;
    }
}
