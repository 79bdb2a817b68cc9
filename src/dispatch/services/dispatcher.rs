//! Cooperative polling loop that hands out agent turns and auto actions.

use crate::audit::{domain::AuditEventKind, services::AuditTrail};
use crate::config::CoordinatorConfig;
use crate::dispatch::domain::{
    AgentRecord, MessageBatch, MessageId, TickReport, TurnOutcome, batch_messages,
};
use crate::dispatch::ports::{
    AgentDirectory, AgentDirectoryError, AgentRuntime, Mailbox, MailboxError, ProcessMonitor,
};
use crate::engine::{domain::AutoOutcome, services::TransitionEngine};
use crate::task::domain::{AgentName, TaskId, TeamName};
use crate::task::ports::{TaskRepository, TaskRepositoryError};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that end a scheduling tick early.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The agent directory failed.
    #[error(transparent)]
    Agents(#[from] AgentDirectoryError),
    /// The mailbox failed.
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    /// Task storage failed.
    #[error(transparent)]
    Tasks(#[from] TaskRepositoryError),
}

/// Result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Collaborators the dispatcher polls and drives.
#[derive(Clone)]
pub struct DispatchPorts {
    /// Team agents and their busy state.
    pub agents: Arc<dyn AgentDirectory>,
    /// Message storage.
    pub mailbox: Arc<dyn Mailbox>,
    /// Runs agent turns.
    pub runtime: Arc<dyn AgentRuntime>,
    /// Checks whether recorded processes still exist.
    pub monitor: Arc<dyn ProcessMonitor>,
    /// Task storage, scanned for auto-stage tasks.
    pub tasks: Arc<dyn TaskRepository>,
    /// Audit trail.
    pub audit: AuditTrail,
}

struct TurnCompletion {
    agent: AgentName,
    task_id: Option<TaskId>,
    message_ids: Vec<MessageId>,
    outcome: TurnOutcome,
}

/// Single-team scheduler.
///
/// Each [`Dispatcher::tick`] reaps finished turns, resets agents whose
/// process died, then hands out work while permits remain: one message
/// batch per idle agent with unread mail and the action of every task
/// resting in an auto stage. The two kinds take turns going first from one
/// tick to the next, so neither starves the other at the concurrency
/// limit. Agent turns run on spawned tasks; auto actions run inline while
/// holding a permit.
pub struct Dispatcher<C>
where
    C: Clock + Send + Sync,
{
    team: TeamName,
    ports: DispatchPorts,
    engine: Arc<TransitionEngine<C>>,
    clock: Arc<C>,
    permits: Arc<Semaphore>,
    poll_interval: Duration,
    pid: u32,
    turns: JoinSet<TurnCompletion>,
    in_flight: HashMap<task::Id, AgentName>,
    auto_first: bool,
}

impl<C> Dispatcher<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a dispatcher for the configured team.
    #[must_use]
    pub fn new(
        config: &CoordinatorConfig,
        ports: DispatchPorts,
        engine: Arc<TransitionEngine<C>>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            team: config.team.clone(),
            ports,
            engine,
            clock,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            poll_interval: config.poll_interval(),
            pid: std::process::id(),
            turns: JoinSet::new(),
            in_flight: HashMap::new(),
            auto_first: false,
        }
    }

    /// Returns the number of agent turns currently running.
    #[must_use]
    pub fn active_turns(&self) -> usize {
        self.in_flight.len()
    }

    /// Runs one scheduling pass.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when agents, mail or tasks cannot be
    /// listed. Failures for a single candidate are logged and skipped.
    pub async fn tick(&mut self) -> DispatchResult<TickReport> {
        let mut report = TickReport::default();
        while let Some(joined) = self.turns.try_join_next_with_id() {
            self.reap(joined).await;
        }
        report.reset_agents = self.reconcile_liveness().await?;

        let mut candidates = Vec::new();
        for agent in self.ports.agents.list(&self.team).await? {
            let waiting = !agent.is_human()
                && agent.busy_pid().is_none()
                && !self.is_running(agent.name());
            if waiting && self.ports.mailbox.has_unread(agent.name()).await? {
                candidates.push(agent);
            }
        }
        let auto_tasks: Vec<TaskId> = self
            .ports
            .tasks
            .list_open(&self.team)
            .await?
            .iter()
            .filter(|task| self.engine.is_auto(task))
            .map(crate::task::domain::Task::id)
            .collect();

        let total = candidates.len().saturating_add(auto_tasks.len());
        let auto_first = self.auto_first;
        self.auto_first = !auto_first;
        let handled = if auto_first {
            let autos = self.run_auto_tasks(auto_tasks, &mut report).await;
            autos.saturating_add(self.dispatch_mail(candidates, &mut report).await)
        } else {
            let turns = self.dispatch_mail(candidates, &mut report).await;
            turns.saturating_add(self.run_auto_tasks(auto_tasks, &mut report).await)
        };
        report.deferred = total.saturating_sub(handled);
        if report.deferred > 0 {
            debug!(
                team = %self.team,
                deferred = report.deferred,
                "at capacity, deferring candidates"
            );
        }
        Ok(report)
    }

    /// Starts one turn per candidate while permits remain and returns how
    /// many candidates were taken.
    async fn dispatch_mail(
        &mut self,
        candidates: Vec<AgentRecord>,
        report: &mut TickReport,
    ) -> usize {
        let mut handled = 0_usize;
        for agent in candidates {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            handled = handled.saturating_add(1);
            let name = agent.name().clone();
            match self.dispatch_turn(agent, permit).await {
                Ok(true) => report.dispatched_turns.push(name),
                Ok(false) => {}
                Err(err) => warn!(agent = %name, error = %err, "failed to dispatch agent turn"),
            }
        }
        handled
    }

    /// Runs auto actions while permits remain and returns how many ran.
    async fn run_auto_tasks(&self, auto_tasks: Vec<TaskId>, report: &mut TickReport) -> usize {
        let mut handled = 0_usize;
        for task_id in auto_tasks {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            handled = handled.saturating_add(1);
            self.run_auto(task_id).await;
            drop(permit);
            report.auto_actions.push(task_id);
        }
        handled
    }

    /// Ticks at the configured interval until `shutdown` is cancelled, then
    /// waits for running turns to finish.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(team = %self.team, "dispatcher started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(team = %self.team, "shutdown requested, stopping dispatch");
                    break;
                }
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(report) if !report.is_idle() => info!(
                            team = %self.team,
                            turns = report.dispatched_turns.len(),
                            auto = report.auto_actions.len(),
                            reset = report.reset_agents.len(),
                            deferred = report.deferred,
                            "scheduling tick"
                        ),
                        Ok(_) => {}
                        Err(err) => {
                            warn!(
                                team = %self.team,
                                error = %err,
                                "scheduling tick failed"
                            );
                        }
                    }
                }
            }
        }
        self.drain().await;
    }

    /// Waits for every running turn and records its completion.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.turns.join_next_with_id().await {
            self.reap(joined).await;
        }
    }

    fn is_running(&self, name: &AgentName) -> bool {
        self.in_flight.values().any(|running| running == name)
    }

    async fn reconcile_liveness(&self) -> DispatchResult<Vec<AgentName>> {
        let mut reset = Vec::new();
        for agent in self.ports.agents.list(&self.team).await? {
            let Some(pid) = agent.busy_pid() else {
                continue;
            };
            let alive = if pid == self.pid {
                self.is_running(agent.name())
            } else {
                self.ports.monitor.is_alive(pid)
            };
            if alive {
                continue;
            }
            self.ports.agents.mark_idle(&self.team, agent.name()).await?;
            warn!(agent = %agent.name(), pid, "reset busy agent with no live process");
            self.ports
                .audit
                .record(
                    &self.team,
                    None,
                    AuditEventKind::AgentReset,
                    format!("{} was busy in dead process {pid}", agent.name()),
                )
                .await;
            reset.push(agent.name().clone());
        }
        Ok(reset)
    }

    async fn dispatch_turn(
        &mut self,
        agent: AgentRecord,
        permit: OwnedSemaphorePermit,
    ) -> DispatchResult<bool> {
        let messages = self.ports.mailbox.unprocessed(agent.name()).await?;
        let Some(batch) = batch_messages(messages).into_iter().next() else {
            return Ok(false);
        };
        let now = self.clock.utc();
        self.ports
            .agents
            .mark_busy(&self.team, agent.name(), self.pid, now)
            .await?;
        let message_ids = batch.message_ids();
        self.ports.mailbox.mark_seen(&message_ids, now).await?;

        info!(agent = %agent.name(), messages = batch.len(), "dispatching agent turn");
        self.ports
            .audit
            .record(
                &self.team,
                batch.task_id(),
                AuditEventKind::TurnDispatched,
                format!("{} received {} message(s)", agent.name(), batch.len()),
            )
            .await;

        let name = agent.name().clone();
        let runtime = Arc::clone(&self.ports.runtime);
        let handle = self
            .turns
            .spawn(run_turn(runtime, agent, batch, message_ids, permit));
        self.in_flight.insert(handle.id(), name);
        Ok(true)
    }

    async fn run_auto(&self, task_id: TaskId) {
        match self.engine.run_auto_action(task_id).await {
            Ok(AutoOutcome::Transitioned(outcome)) => {
                info!(task = %task_id, stage = %outcome.task().status(), "auto action moved task");
            }
            Ok(AutoOutcome::Stayed(_) | AutoOutcome::Idle | AutoOutcome::NotAuto) => {
                debug!(task = %task_id, "auto action left task in place");
            }
            Err(err) => warn!(task = %task_id, error = %err, "auto action failed"),
        }
    }

    async fn reap(&mut self, joined: Result<(task::Id, TurnCompletion), JoinError>) {
        let completion = match joined {
            Ok((id, completion)) => {
                self.in_flight.remove(&id);
                completion
            }
            Err(err) => {
                let agent = self.in_flight.remove(&err.id());
                warn!(error = %err, "agent turn task aborted");
                if let Some(name) = agent {
                    self.release(&name).await;
                }
                return;
            }
        };

        self.release(&completion.agent).await;
        let now = self.clock.utc();
        if let Err(err) = self
            .ports
            .mailbox
            .mark_processed(&completion.message_ids, now)
            .await
        {
            warn!(agent = %completion.agent, error = %err, "failed to mark messages processed");
        }

        let outcome = &completion.outcome;
        let summary = match &outcome.error {
            Some(error) => {
                warn!(agent = %completion.agent, error = %error, "agent turn reported an error");
                format!("{} turn failed: {error}", completion.agent)
            }
            None => format!(
                "{} turn finished: {} tokens in, {} tokens out, ${:.4}",
                completion.agent, outcome.tokens_in, outcome.tokens_out, outcome.cost_usd
            ),
        };
        self.ports
            .audit
            .record(
                &self.team,
                completion.task_id,
                AuditEventKind::TurnFinished,
                summary,
            )
            .await;
    }

    async fn release(&self, agent: &AgentName) {
        if let Err(err) = self.ports.agents.mark_idle(&self.team, agent).await {
            warn!(agent = %agent, error = %err, "failed to mark agent idle");
        }
    }
}

async fn run_turn(
    runtime: Arc<dyn AgentRuntime>,
    agent: AgentRecord,
    batch: MessageBatch,
    message_ids: Vec<MessageId>,
    permit: OwnedSemaphorePermit,
) -> TurnCompletion {
    let name = agent.name().clone();
    let task_id = batch.task_id();
    let turn = tokio::spawn(async move { runtime.run_turn(&agent, &batch).await });
    let outcome = turn
        .await
        .unwrap_or_else(|err| TurnOutcome::failed(format!("agent turn panicked: {err}")));
    drop(permit);
    TurnCompletion {
        agent: name,
        task_id,
        message_ids,
        outcome,
    }
}
