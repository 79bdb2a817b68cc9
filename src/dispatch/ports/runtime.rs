//! Agent runtime and process liveness ports.

use crate::dispatch::domain::{AgentRecord, MessageBatch, TurnOutcome};
use async_trait::async_trait;

/// Runs one bounded unit of agent work.
///
/// The coordinator does not inspect what the agent did beyond the
/// reported outcome.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Runs a turn for `agent` over `batch`.
    async fn run_turn(&self, agent: &AgentRecord, batch: &MessageBatch) -> TurnOutcome;
}

/// Answers whether a process still exists.
pub trait ProcessMonitor: Send + Sync {
    /// Returns `true` while `pid` is alive.
    fn is_alive(&self, pid: u32) -> bool;
}
