//! Results of agent turns and scheduling ticks.

use crate::task::domain::{AgentName, TaskId};

/// What an agent turn reported.
///
/// The coordinator only distinguishes success from failure; usage figures
/// are recorded for audit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TurnOutcome {
    /// Input tokens consumed.
    pub tokens_in: u64,
    /// Output tokens produced.
    pub tokens_out: u64,
    /// Reported cost in US dollars.
    pub cost_usd: f64,
    /// Failure reported by the runtime.
    pub error: Option<String>,
}

impl TurnOutcome {
    /// Creates an outcome describing a failed turn.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Returns `true` when no error was reported.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What one scheduling tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Busy agents reset because their process had died.
    pub reset_agents: Vec<AgentName>,
    /// Agents handed a turn.
    pub dispatched_turns: Vec<AgentName>,
    /// Auto-stage tasks whose action ran.
    pub auto_actions: Vec<TaskId>,
    /// Candidates left for a later tick for lack of capacity.
    pub deferred: usize,
}

impl TickReport {
    /// Returns `true` when the tick found nothing to do.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.reset_agents.is_empty()
            && self.dispatched_turns.is_empty()
            && self.auto_actions.is_empty()
            && self.deferred == 0
    }
}
