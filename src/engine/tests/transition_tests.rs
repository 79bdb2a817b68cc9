//! Tests for [`TransitionEngine::transition`] and the built-in hooks.

use super::support::{Coordinator, HUMAN, REVIEWER, WORKERS, agent, stage};
use crate::audit::domain::AuditEventKind;
use crate::dispatch::domain::{AgentRecord, AgentRole};
use crate::engine::domain::{
    HookError, HookResult, TransitionError, TransitionOutcome, TransitionRequest,
};
use crate::engine::hooks::{HookSet, NO_NEW_COMMITS, StageContext, StageHooks};
use crate::merge::adapters::memory::GitOperation;
use crate::task::domain::ApprovalStatus;
use crate::task::services::CreateTaskRequest;
use crate::workflow::domain::{
    StageDefinition, StageKind, WorkflowName, WorkflowVersion,
};
use async_trait::async_trait;
use eyre::{Result, ensure};
use rstest::{fixture, rstest};
use std::sync::Arc;

#[fixture]
fn coordinator() -> Coordinator {
    Coordinator::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn starting_work_picks_least_loaded_worker(coordinator: Coordinator) -> Result<()> {
    let [busy, idle] = WORKERS;
    coordinator
        .create(
            CreateTaskRequest::new(
                coordinator.team.as_str(),
                "Existing work",
                "standard",
                ["api".to_owned()],
            )
            .with_assignee(busy),
        )
        .await;
    let task = coordinator.create_task(&["web"]).await;

    let moved = coordinator.move_to(&task, "in_progress").await;

    ensure!(moved.status() == &stage("in_progress"));
    ensure!(moved.assignee() == Some(&agent(idle)));
    ensure!(moved.implementer() == Some(agent(idle)));
    ensure!(moved.revision() == task.revision() + 1);
    let binding = moved.repositories().first().expect("binding");
    let main_tip = coordinator
        .git
        .branch_tip(&coordinator.repo_path("web"), &coordinator.main);
    ensure!(binding.base_sha().cloned() == main_tip);
    ensure!(
        coordinator
            .git
            .worktrees(&coordinator.repo_path("web"))
            .contains_key(binding.branch())
    );
    ensure!(coordinator.reload(&task).await == moved);
    ensure!(coordinator.audit_kinds().contains(&AuditEventKind::StatusChanged));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn review_without_new_commits_is_gated(coordinator: Coordinator) -> Result<()> {
    let task = coordinator.create_task(&["web"]).await;
    let in_progress = coordinator.move_to(&task, "in_progress").await;

    let result = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage("in_review")))
        .await;

    ensure!(matches!(&result, Err(TransitionError::Gate(reason)) if reason == NO_NEW_COMMITS));
    let stored = coordinator.reload(&task).await;
    ensure!(stored == in_progress);
    ensure!(stored.status() == &stage("in_progress"));
    ensure!(coordinator.audit_kinds().contains(&AuditEventKind::GateRejected));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn requesting_review_records_commits(coordinator: Coordinator) -> Result<()> {
    let task = coordinator.create_task(&["api", "web"]).await;
    let in_progress = coordinator.move_to(&task, "in_progress").await;
    coordinator.commit_work(&in_progress);

    let in_review = coordinator.move_to(&in_progress, "in_review").await;

    ensure!(in_review.review_attempt() == 1);
    ensure!(in_review.approval_status() == ApprovalStatus::Pending);
    ensure!(in_review.assignee() == Some(&agent(REVIEWER)));
    for binding in in_review.repositories() {
        let tip = coordinator
            .git
            .branch_tip(&coordinator.repo_path(binding.repository().as_str()), binding.branch());
        ensure!(binding.commits().len() == 1);
        ensure!(binding.commits().last() == tip.as_ref());
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_review_needs_commits_after_the_first(coordinator: Coordinator) -> Result<()> {
    let task = coordinator.create_task(&["web"]).await;
    let in_progress = coordinator.move_to(&task, "in_progress").await;
    coordinator.commit_work(&in_progress);
    let in_review = coordinator.move_to(&in_progress, "in_review").await;
    let reworking = coordinator
        .engine
        .transition(
            TransitionRequest::new(task.id(), stage("in_progress"))
                .with_note("handle the empty body case"),
        )
        .await?
        .into_task();

    ensure!(reworking.approval_status() == ApprovalStatus::Rejected);
    ensure!(reworking.rejection_reason() == Some("handle the empty body case"));
    ensure!(reworking.assignee() == in_progress.assignee());

    let again = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage("in_review")))
        .await;
    ensure!(matches!(again, Err(TransitionError::Gate(_))));

    coordinator.commit_work(&reworking);
    let second = coordinator.move_to(&reworking, "in_review").await;
    ensure!(second.review_attempt() == 2);
    let binding = second.repositories().first().expect("binding");
    ensure!(binding.commits().len() == 2);
    ensure!(in_review.review_attempt() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rework_returns_to_the_same_reviewer(coordinator: Coordinator) -> Result<()> {
    coordinator.agents.register(AgentRecord::new(
        agent("reviewer-s"),
        coordinator.team.clone(),
        AgentRole::Reviewer,
    ))?;
    let task = coordinator.create_task(&["web"]).await;
    let in_progress = coordinator.move_to(&task, "in_progress").await;
    coordinator.commit_work(&in_progress);
    let in_review = coordinator.move_to(&in_progress, "in_review").await;
    ensure!(in_review.assignee() == Some(&agent(REVIEWER)));
    ensure!(in_review.reviewer() == Some(&agent(REVIEWER)));

    let reworking = coordinator.move_to(&in_review, "in_progress").await;
    coordinator
        .create(
            CreateTaskRequest::new(
                coordinator.team.as_str(),
                "Another review",
                "standard",
                ["api".to_owned()],
            )
            .with_assignee(REVIEWER),
        )
        .await;
    coordinator.commit_work(&reworking);
    let second = coordinator.move_to(&reworking, "in_review").await;

    ensure!(second.assignee() == Some(&agent(REVIEWER)));
    ensure!(coordinator.reload(&task).await.reviewer() == Some(&agent(REVIEWER)));
    Ok(())
}

#[rstest]
#[case("merged")]
#[case("in_review")]
#[tokio::test(flavor = "multi_thread")]
async fn edges_outside_the_graph_are_rejected(
    coordinator: Coordinator,
    #[case] target: &str,
) -> Result<()> {
    let task = coordinator.create_task(&["web"]).await;

    let result = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage(target)))
        .await;

    ensure!(matches!(result, Err(TransitionError::NotAllowed { .. })));
    ensure!(coordinator.reload(&task).await == task);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminal_tasks_do_not_move(coordinator: Coordinator) -> Result<()> {
    let task = coordinator.create_task(&["web"]).await;
    let cancelled = coordinator.move_to(&task, "cancelled").await;
    ensure!(cancelled.is_completed());

    let result = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage("todo")))
        .await;

    ensure!(matches!(result, Err(TransitionError::TerminalStage(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_task_is_reported(coordinator: Coordinator) {
    let missing = crate::task::domain::TaskId::new();
    let result = coordinator
        .engine
        .transition(TransitionRequest::new(missing, stage("in_progress")))
        .await;
    assert!(matches!(result, Err(TransitionError::TaskNotFound(id)) if id == missing));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hook_fault_diverts_task_to_error_stage(coordinator: Coordinator) -> Result<()> {
    let task = coordinator.create_task(&["web"]).await;
    coordinator.git.fail_next(GitOperation::AddWorktree, 1);

    let outcome = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage("in_progress")))
        .await?;

    let TransitionOutcome::Escalated { task: escalated, .. } = outcome else {
        eyre::bail!("expected escalation, got {outcome:?}");
    };
    ensure!(escalated.status() == &stage("error"));
    ensure!(escalated.assignee() == Some(&agent(HUMAN)));
    ensure!(coordinator.reload(&task).await == escalated);
    let sent = coordinator.notifier.sent()?;
    ensure!(sent.len() == 1);
    ensure!(sent.iter().all(|notification| notification.recipient == agent(HUMAN)));
    ensure!(coordinator.audit_kinds().contains(&AuditEventKind::ActionFailed));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hook_fault_without_error_stage_is_returned(coordinator: Coordinator) -> Result<()> {
    coordinator.registry.register(
        WorkflowName::new("lean")?,
        WorkflowVersion::new(1)?,
        &[
            StageDefinition::new(stage("todo"), "To do", StageKind::Manual),
            StageDefinition::new(stage("doing"), "Doing", StageKind::Implementation),
            StageDefinition::new(stage("done"), "Done", StageKind::Merged).terminal(),
        ],
    )?;
    let task = coordinator
        .create(CreateTaskRequest::new(
            coordinator.team.as_str(),
            "Lean task",
            "lean",
            ["web".to_owned()],
        ))
        .await;
    coordinator.git.fail_next(GitOperation::AddWorktree, 1);

    let result = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage("doing")))
        .await;

    ensure!(matches!(result, Err(TransitionError::Action(_))));
    ensure!(coordinator.reload(&task).await == task);
    ensure!(coordinator.notification_count() == 1);
    Ok(())
}

struct FailingExit;

#[async_trait]
impl StageHooks for FailingExit {
    async fn exit(&self, _ctx: &mut StageContext<'_>) -> HookResult<()> {
        Err(HookError::action("scratch directory vanished"))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn exit_failures_do_not_block_the_move() -> Result<()> {
    let coordinator = Coordinator::with_hooks(
        HookSet::standard().with_hooks(StageKind::Manual, Arc::new(FailingExit)),
    );
    let task = coordinator.create_task(&["web"]).await;

    let moved = coordinator.move_to(&task, "in_progress").await;

    ensure!(moved.status() == &stage("in_progress"));
    ensure!(coordinator.audit_kinds().contains(&AuditEventKind::ExitHookFailed));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_removes_worktrees(coordinator: Coordinator) -> Result<()> {
    let task = coordinator.create_task(&["web"]).await;
    coordinator.move_to(&task, "in_progress").await;
    ensure!(!coordinator.git.worktrees(&coordinator.repo_path("web")).is_empty());

    let cancelled = coordinator.move_to(&task, "cancelled").await;

    ensure!(cancelled.completed_at().is_some());
    ensure!(coordinator.git.worktrees(&coordinator.repo_path("web")).is_empty());
    Ok(())
}
