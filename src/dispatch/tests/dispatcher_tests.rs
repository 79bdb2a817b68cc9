//! Tests for the [`Dispatcher`] scheduling loop.

use crate::audit::adapters::memory::InMemoryEventLog;
use crate::audit::domain::{AuditEvent, AuditEventKind};
use crate::audit::services::AuditTrail;
use crate::dispatch::adapters::memory::{InMemoryMailbox, InMemoryProcessMonitor};
use crate::dispatch::domain::{AgentRecord, MailMessage, MessageBatch, TurnOutcome};
use crate::dispatch::ports::{AgentDirectory, AgentRuntime, Mailbox};
use crate::dispatch::services::{DispatchPorts, Dispatcher};
use crate::engine::tests::support::{Coordinator, HUMAN, REVIEWER, WORKERS, agent, stage};
use crate::task::domain::{AgentName, TaskId};
use async_trait::async_trait;
use chrono::Utc;
use eyre::{Result, ensure};
use mockable::DefaultClock;
use mockall::mock;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

mock! {
    Runtime {}

    #[async_trait]
    impl AgentRuntime for Runtime {
        async fn run_turn(&self, agent: &AgentRecord, batch: &MessageBatch) -> TurnOutcome;
    }
}

/// Runtime whose turns block until the test releases them.
struct GatedRuntime {
    gate: Semaphore,
    running: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl GatedRuntime {
    fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    fn release(&self, turns: usize) {
        self.gate.add_permits(turns);
    }
}

#[async_trait]
impl AgentRuntime for GatedRuntime {
    async fn run_turn(&self, _agent: &AgentRecord, _batch: &MessageBatch) -> TurnOutcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_running, Ordering::SeqCst);
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        TurnOutcome {
            tokens_in: 120,
            tokens_out: 40,
            cost_usd: 0.0125,
            error: None,
        }
    }
}

struct Harness {
    coordinator: Coordinator,
    mailbox: InMemoryMailbox,
    monitor: InMemoryProcessMonitor,
}

impl Harness {
    fn dispatcher(
        &self,
        runtime: Arc<dyn AgentRuntime>,
        max_concurrent: usize,
    ) -> Dispatcher<DefaultClock> {
        let mut config = (*self.coordinator.config).clone();
        config.max_concurrent = max_concurrent;
        let ports = DispatchPorts {
            agents: Arc::new(self.coordinator.agents.clone()),
            mailbox: Arc::new(self.mailbox.clone()),
            runtime,
            monitor: Arc::new(self.monitor.clone()),
            tasks: Arc::new(self.coordinator.tasks.clone()),
            audit: AuditTrail::new(
                Arc::new(self.coordinator.log.clone()),
                Arc::new(self.coordinator.notifier.clone()),
                Arc::new(DefaultClock),
            ),
        };
        Dispatcher::new(
            &config,
            ports,
            Arc::new(self.coordinator.engine.clone()),
            Arc::new(DefaultClock),
        )
    }

    async fn send(&self, to: &str, task_id: Option<TaskId>, body: &str) -> MailMessage {
        let message = MailMessage::new(agent(to), agent(HUMAN), task_id, body, Utc::now());
        self.mailbox
            .deliver(message.clone())
            .await
            .expect("delivery should succeed");
        message
    }

    async fn busy_pid(&self, name: &str) -> Option<u32> {
        self.coordinator
            .agents
            .find(&self.coordinator.team, &agent(name))
            .await
            .expect("lookup should succeed")
            .and_then(|record| record.busy_pid())
    }

    async fn mark_busy(&self, name: &str, pid: u32) {
        self.coordinator
            .agents
            .mark_busy(&self.coordinator.team, &agent(name), pid, Utc::now())
            .await
            .expect("agent should exist");
    }

    fn events(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        events_of(&self.coordinator.log, kind)
    }
}

fn events_of(log: &InMemoryEventLog, kind: AuditEventKind) -> Vec<AuditEvent> {
    log.events()
        .expect("events should be readable")
        .into_iter()
        .filter(|event| event.kind() == kind)
        .collect()
}

#[fixture]
fn harness() -> Harness {
    Harness {
        coordinator: Coordinator::new(),
        mailbox: InMemoryMailbox::new(),
        monitor: InMemoryProcessMonitor::new(),
    }
}

fn quick_runtime() -> Arc<dyn AgentRuntime> {
    let mut runtime = MockRuntime::new();
    runtime
        .expect_run_turn()
        .returning(|_, _| TurnOutcome::default());
    Arc::new(runtime)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn idle_tick_reports_nothing(harness: Harness) -> Result<()> {
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);
    ensure!(dispatcher.tick().await?.is_idle());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_in_dead_processes_are_reset(harness: Harness) -> Result<()> {
    let [dead, alive] = WORKERS;
    harness.mark_busy(dead, 4242).await;
    harness.mark_busy(alive, 4343).await;
    harness.monitor.start(4343);
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);

    let report = dispatcher.tick().await?;

    ensure!(report.reset_agents == vec![agent(dead)]);
    ensure!(harness.busy_pid(dead).await.is_none());
    ensure!(harness.busy_pid(alive).await == Some(4343));
    ensure!(harness.events(AuditEventKind::AgentReset).len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_claims_from_this_process_are_reset(harness: Harness) -> Result<()> {
    let own = std::process::id();
    harness.monitor.start(own);
    harness.mark_busy(REVIEWER, own).await;
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);

    let report = dispatcher.tick().await?;

    ensure!(report.reset_agents == vec![agent(REVIEWER)]);
    ensure!(harness.busy_pid(REVIEWER).await.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn busy_and_human_agents_are_not_dispatched(harness: Harness) -> Result<()> {
    let [busy, _] = WORKERS;
    harness.mark_busy(busy, 5151).await;
    harness.monitor.start(5151);
    harness.send(busy, None, "are you there?").await;
    harness.send(HUMAN, None, "escalation").await;
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);

    let report = dispatcher.tick().await?;

    ensure!(report.dispatched_turns.is_empty());
    ensure!(harness.mailbox.has_unread(&agent(busy)).await?);
    ensure!(harness.mailbox.has_unread(&agent(HUMAN)).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrency_never_exceeds_the_limit(harness: Harness) -> Result<()> {
    let [first_worker, second_worker] = WORKERS;
    for name in [REVIEWER, first_worker, second_worker] {
        harness.send(name, None, "pick up work").await;
    }
    let runtime = Arc::new(GatedRuntime::new());
    let mut dispatcher = harness.dispatcher(runtime.clone(), 2);

    let first = dispatcher.tick().await?;
    ensure!(first.dispatched_turns == vec![agent(REVIEWER), agent(first_worker)]);
    ensure!(first.deferred == 1);
    ensure!(harness.busy_pid(REVIEWER).await == Some(std::process::id()));

    let second = dispatcher.tick().await?;
    ensure!(second.dispatched_turns.is_empty());
    ensure!(second.deferred == 1);
    ensure!(dispatcher.active_turns() == 2);

    runtime.release(2);
    dispatcher.drain().await;
    ensure!(dispatcher.active_turns() == 0);
    ensure!(harness.busy_pid(REVIEWER).await.is_none());
    ensure!(!harness.mailbox.has_unread(&agent(REVIEWER)).await?);

    let third = dispatcher.tick().await?;
    ensure!(third.dispatched_turns == vec![agent(second_worker)]);
    runtime.release(1);
    dispatcher.drain().await;

    ensure!(runtime.started.load(Ordering::SeqCst) == 3);
    ensure!(runtime.peak.load(Ordering::SeqCst) <= 2);
    let finished = harness.events(AuditEventKind::TurnFinished);
    ensure!(finished.len() == 3);
    ensure!(finished.iter().all(|event| event.message().contains("$0.0125")));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn one_batch_is_handed_out_per_turn(harness: Harness) -> Result<()> {
    let [worker, _] = WORKERS;
    let task_id = Some(TaskId::new());
    let prompt = harness.send(worker, task_id, "implement the endpoint").await;
    let context = harness.send(worker, task_id, "remember the docs").await;
    let aside = harness.send(worker, None, "standup moved").await;

    let mut runtime = MockRuntime::new();
    runtime
        .expect_run_turn()
        .withf(move |_, batch| batch.message_ids() == vec![prompt.id(), context.id()])
        .times(1)
        .returning(|_, _| TurnOutcome::default());
    runtime
        .expect_run_turn()
        .withf(move |_, batch| batch.prompt().id() == aside.id())
        .times(1)
        .returning(|_, _| TurnOutcome::default());
    let mut dispatcher = harness.dispatcher(Arc::new(runtime), 4);

    dispatcher.tick().await?;
    dispatcher.drain().await;
    ensure!(harness.mailbox.has_unread(&agent(worker)).await?);

    dispatcher.tick().await?;
    dispatcher.drain().await;
    ensure!(!harness.mailbox.has_unread(&agent(worker)).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_turns_still_release_the_agent(harness: Harness) -> Result<()> {
    let [worker, _] = WORKERS;
    harness.send(worker, None, "fix the flaky test").await;
    let mut runtime = MockRuntime::new();
    runtime
        .expect_run_turn()
        .times(1)
        .returning(|_, _| TurnOutcome::failed("rate limited"));
    let mut dispatcher = harness.dispatcher(Arc::new(runtime), 4);

    let report = dispatcher.tick().await?;
    dispatcher.drain().await;

    ensure!(report.dispatched_turns == vec![agent(worker)]);
    ensure!(harness.busy_pid(worker).await.is_none());
    let stored = harness.mailbox.messages()?;
    ensure!(stored.iter().all(|message| message.processed_at().is_some()));
    let finished = harness.events(AuditEventKind::TurnFinished);
    ensure!(finished.iter().any(|event| event.message().contains("rate limited")));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auto_stage_tasks_run_their_action(harness: Harness) -> Result<()> {
    let task = harness.coordinator.task_ready_to_merge(&["web"]).await;
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);

    let report = dispatcher.tick().await?;

    ensure!(report.auto_actions == vec![task.id()]);
    ensure!(harness.coordinator.reload(&task).await.status() == &stage("merged"));
    ensure!(dispatcher.tick().await?.is_idle());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auto_actions_wait_for_capacity(harness: Harness) -> Result<()> {
    let task = harness.coordinator.task_ready_to_merge(&["api"]).await;
    let [worker, _] = WORKERS;
    harness.send(worker, None, "long running job").await;
    let runtime = Arc::new(GatedRuntime::new());
    let mut dispatcher = harness.dispatcher(runtime.clone(), 1);

    let first = dispatcher.tick().await?;
    ensure!(first.dispatched_turns.len() == 1);
    ensure!(first.auto_actions.is_empty());
    ensure!(first.deferred == 1);
    ensure!(harness.coordinator.reload(&task).await.status() == &stage("merging"));

    runtime.release(1);
    dispatcher.drain().await;
    let second = dispatcher.tick().await?;
    ensure!(second.auto_actions == vec![task.id()]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn steady_mail_does_not_starve_auto_actions(harness: Harness) -> Result<()> {
    let task = harness.coordinator.task_ready_to_merge(&["api"]).await;
    let [worker, _] = WORKERS;
    harness.send(worker, Some(TaskId::new()), "triage the first report").await;
    harness.send(worker, Some(TaskId::new()), "triage the second report").await;
    let runtime = Arc::new(GatedRuntime::new());
    let mut dispatcher = harness.dispatcher(runtime.clone(), 1);

    let first = dispatcher.tick().await?;
    ensure!(first.dispatched_turns == vec![agent(worker)]);
    ensure!(first.auto_actions.is_empty());
    runtime.release(1);
    dispatcher.drain().await;
    ensure!(harness.mailbox.has_unread(&agent(worker)).await?);

    let second = dispatcher.tick().await?;
    ensure!(second.auto_actions == vec![task.id()]);
    ensure!(harness.coordinator.reload(&task).await.status() == &stage("merged"));
    ensure!(second.dispatched_turns == vec![agent(worker)]);
    runtime.release(1);
    dispatcher.drain().await;
    ensure!(!harness.mailbox.has_unread(&agent(worker)).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_waits_for_running_turns(harness: Harness) -> Result<()> {
    let [worker, _] = WORKERS;
    harness.send(worker, None, "summarise the incident").await;
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);
    dispatcher.tick().await?;

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    dispatcher.run(shutdown).await;

    ensure!(dispatcher.active_turns() == 0);
    ensure!(harness.busy_pid(worker).await.is_none());
    ensure!(!harness.mailbox.has_unread(&agent(worker)).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unread_mail_for_unknown_agents_is_ignored(harness: Harness) -> Result<()> {
    let stranger = AgentName::new("contractor")?;
    harness
        .mailbox
        .deliver(MailMessage::new(stranger.clone(), agent(HUMAN), None, "hello", Utc::now()))
        .await?;
    let mut dispatcher = harness.dispatcher(quick_runtime(), 4);

    ensure!(dispatcher.tick().await?.dispatched_turns.is_empty());
    ensure!(harness.mailbox.has_unread(&stranger).await?);
    Ok(())
}
