//! Tasks driven through the standard workflow by direct transitions.

use crate::test_helpers::{Coordinator, HUMAN, REVIEWER, WORKERS, agent, commit_work, stage};
use atelier::audit::domain::AuditEventKind;
use atelier::engine::domain::{AutoOutcome, TransitionError, TransitionRequest};
use atelier::task::domain::ApprovalStatus;
use eyre::{Result, bail, ensure};

#[tokio::test(flavor = "multi_thread")]
async fn two_repository_task_reaches_merged() -> Result<()> {
    let (coordinator, git, _) = Coordinator::in_memory()?;
    let task = coordinator.create_task(&["api", "web"]).await?;
    ensure!(task.status() == &stage("todo")?);

    let in_progress = coordinator.move_to(task.id(), "in_progress").await?;
    let [first_worker, _] = WORKERS;
    ensure!(in_progress.assignee() == Some(&agent(first_worker)?));
    ensure!(in_progress.repositories().iter().all(|binding| binding.base_sha().is_some()));

    commit_work(&coordinator, &git, &in_progress)?;
    let in_review = coordinator.move_to(task.id(), "in_review").await?;
    ensure!(in_review.assignee() == Some(&agent(REVIEWER)?));
    ensure!(in_review.approval_status() == ApprovalStatus::Pending);
    ensure!(in_review.review_attempt() == 1);

    coordinator.move_to(task.id(), "merging").await?;
    let outcome = coordinator.engine.run_auto_action(task.id()).await?;
    ensure!(matches!(outcome, AutoOutcome::Transitioned(_)));

    let merged = coordinator.reload(task.id()).await?;
    ensure!(merged.status() == &stage("merged")?);
    ensure!(merged.is_completed());
    ensure!(merged.repositories().iter().all(|binding| binding.is_merged()));
    for name in ["api", "web"] {
        ensure!(git.worktrees(&coordinator.repo_path(name)?).is_empty());
    }
    ensure!(coordinator.notification_count()? == 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_review_returns_to_the_same_implementer() -> Result<()> {
    let (coordinator, git, _) = Coordinator::in_memory()?;
    let task = coordinator.create_task(&["web"]).await?;
    let in_progress = coordinator.move_to(task.id(), "in_progress").await?;
    let implementer = in_progress.assignee().cloned();
    commit_work(&coordinator, &git, &in_progress)?;
    coordinator.move_to(task.id(), "in_review").await?;

    let rework = coordinator
        .engine
        .transition(
            TransitionRequest::new(task.id(), stage("in_progress")?)
                .with_note("missing error handling"),
        )
        .await?
        .into_task();

    ensure!(rework.assignee().cloned() == implementer);
    ensure!(rework.approval_status() == ApprovalStatus::Rejected);
    ensure!(rework.rejection_reason() == Some("missing error handling"));

    let gated = coordinator
        .engine
        .transition(TransitionRequest::new(task.id(), stage("in_review")?))
        .await;
    let Err(TransitionError::Gate(reason)) = gated else {
        bail!("expected the review gate to reject, got {gated:?}");
    };
    ensure!(reason.contains("No new commits"));

    commit_work(&coordinator, &git, &rework)?;
    let second = coordinator.move_to(task.id(), "in_review").await?;
    ensure!(second.review_attempt() == 2);
    ensure!(second.repositories().iter().all(|binding| binding.commits().len() == 2));
    ensure!(coordinator.audit_kinds()?.contains(&AuditEventKind::GateRejected));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_task_releases_its_worktrees() -> Result<()> {
    let (coordinator, git, _) = Coordinator::in_memory()?;
    let task = coordinator.create_task(&["api"]).await?;
    coordinator.move_to(task.id(), "in_progress").await?;
    ensure!(git.worktrees(&coordinator.repo_path("api")?).len() == 1);

    let cancelled = coordinator.move_to(task.id(), "cancelled").await?;

    ensure!(cancelled.is_completed());
    ensure!(git.worktrees(&coordinator.repo_path("api")?).is_empty());
    let open = coordinator.lifecycle.list_open(&coordinator.team).await?;
    ensure!(open.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_failures_notify_the_escalation_contact() -> Result<()> {
    let (coordinator, git, _) = Coordinator::in_memory()?;
    let task = coordinator.create_task(&["api"]).await?;
    let in_progress = coordinator.move_to(task.id(), "in_progress").await?;
    commit_work(&coordinator, &git, &in_progress)?;
    coordinator.move_to(task.id(), "in_review").await?;
    coordinator.move_to(task.id(), "merging").await?;
    git.script_conflict(&coordinator.repo_path("api")?, &["src/lib.rs"])?;

    coordinator.engine.run_auto_action(task.id()).await?;

    let failed = coordinator.reload(task.id()).await?;
    ensure!(failed.status() == &stage("merge_failed")?);
    ensure!(failed.assignee() == Some(&agent(HUMAN)?));
    let sent = coordinator.notifier.sent()?;
    let human = agent(HUMAN)?;
    ensure!(sent.len() == 1);
    ensure!(sent.iter().all(|notification| notification.recipient == human));
    Ok(())
}
