//! Agents driving a task to completion through dispatched turns.

use crate::test_helpers::{Coordinator, HUMAN, REVIEWER, WORKERS, agent, commit_work, stage};
use async_trait::async_trait;
use atelier::audit::domain::AuditEventKind;
use atelier::dispatch::adapters::memory::{InMemoryMailbox, InMemoryProcessMonitor};
use atelier::dispatch::domain::{AgentRecord, AgentRole, MailMessage, MessageBatch, TurnOutcome};
use atelier::dispatch::ports::{AgentRuntime, Mailbox};
use atelier::dispatch::services::{DispatchPorts, Dispatcher};
use atelier::merge::adapters::memory::InMemoryGit;
use chrono::Utc;
use eyre::{Result, bail, ensure, eyre};
use mockable::DefaultClock;
use std::sync::Arc;

/// Worker turns commit and request review; reviewer turns approve.
struct TeamRuntime {
    coordinator: Arc<Coordinator>,
    git: InMemoryGit,
    mailbox: InMemoryMailbox,
}

impl TeamRuntime {
    async fn work(&self, agent: &AgentRecord, batch: &MessageBatch) -> Result<()> {
        let task_id = batch
            .task_id()
            .ok_or_else(|| eyre!("turn without a task"))?;
        match agent.role() {
            AgentRole::Worker => {
                let task = self.coordinator.reload(task_id).await?;
                commit_work(&self.coordinator, &self.git, &task)?;
                let in_review = self.coordinator.move_to(task_id, "in_review").await?;
                let reviewer = in_review
                    .assignee()
                    .cloned()
                    .ok_or_else(|| eyre!("review stage should assign a reviewer"))?;
                self.mailbox
                    .deliver(MailMessage::new(
                        reviewer,
                        agent.name().clone(),
                        Some(task_id),
                        "ready for review",
                        Utc::now(),
                    ))
                    .await?;
            }
            AgentRole::Reviewer => {
                self.coordinator.move_to(task_id, "merging").await?;
            }
            AgentRole::Human => bail!("humans are never dispatched"),
        }
        Ok(())
    }
}

#[async_trait]
impl AgentRuntime for TeamRuntime {
    async fn run_turn(&self, agent: &AgentRecord, batch: &MessageBatch) -> TurnOutcome {
        match self.work(agent, batch).await {
            Ok(()) => TurnOutcome {
                tokens_in: 1_000,
                tokens_out: 250,
                cost_usd: 0.02,
                error: None,
            },
            Err(err) => TurnOutcome::failed(err.to_string()),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn agents_carry_a_task_from_assignment_to_merge() -> Result<()> {
    let (built, git, _) = Coordinator::in_memory()?;
    let coordinator = Arc::new(built);
    let mailbox = InMemoryMailbox::new();
    let runtime = TeamRuntime {
        coordinator: Arc::clone(&coordinator),
        git,
        mailbox: mailbox.clone(),
    };
    let ports = DispatchPorts {
        agents: Arc::new(coordinator.agents.clone()),
        mailbox: Arc::new(mailbox.clone()),
        runtime: Arc::new(runtime),
        monitor: Arc::new(InMemoryProcessMonitor::new()),
        tasks: Arc::new(coordinator.tasks.clone()),
        audit: coordinator.audit.clone(),
    };
    let mut dispatcher = Dispatcher::new(
        &coordinator.config,
        ports,
        Arc::clone(&coordinator.engine),
        Arc::new(DefaultClock),
    );

    let task = coordinator.create_task(&["api"]).await?;
    let assigned = coordinator.move_to(task.id(), "in_progress").await?;
    let [worker, _] = WORKERS;
    ensure!(assigned.assignee() == Some(&agent(worker)?));
    mailbox
        .deliver(MailMessage::new(
            agent(worker)?,
            agent(HUMAN)?,
            Some(task.id()),
            "please add a health endpoint",
            Utc::now(),
        ))
        .await?;

    let first = dispatcher.tick().await?;
    ensure!(first.dispatched_turns == vec![agent(worker)?]);
    dispatcher.drain().await;
    ensure!(coordinator.reload(task.id()).await?.status() == &stage("in_review")?);

    let second = dispatcher.tick().await?;
    ensure!(second.dispatched_turns == vec![agent(REVIEWER)?]);
    ensure!(second.auto_actions.is_empty());
    dispatcher.drain().await;
    ensure!(coordinator.reload(task.id()).await?.status() == &stage("merging")?);

    let third = dispatcher.tick().await?;
    ensure!(third.auto_actions == vec![task.id()]);
    let merged = coordinator.reload(task.id()).await?;
    ensure!(merged.status() == &stage("merged")?);

    ensure!(dispatcher.tick().await?.is_idle());
    ensure!(mailbox.messages()?.iter().all(|message| message.processed_at().is_some()));
    let kinds = coordinator.audit_kinds()?;
    let finished = kinds
        .iter()
        .filter(|kind| **kind == AuditEventKind::TurnFinished)
        .count();
    ensure!(finished == 2);
    ensure!(kinds.contains(&AuditEventKind::MergeSucceeded));
    ensure!(coordinator.notification_count()? == 0);
    Ok(())
}
