//! Shared world state for coordination BDD scenarios.

use crate::test_helpers::Coordinator;
use atelier::engine::domain::{TransitionOutcome, TransitionResult};
use atelier::merge::adapters::memory::InMemoryGit;
use atelier::task::domain::Task;
use rstest::fixture;

/// Scenario world for coordination behaviour tests.
pub struct CoordinationWorld {
    pub coordinator: Coordinator,
    pub git: InMemoryGit,
    pub task: Option<Task>,
    pub last_transition: Option<TransitionResult<TransitionOutcome>>,
}

impl CoordinationWorld {
    /// Creates a world over a fresh in-memory coordinator.
    #[must_use]
    pub fn new() -> Self {
        let (coordinator, git, _) =
            Coordinator::in_memory().expect("in-memory coordinator should wire");
        Self {
            coordinator,
            git,
            task: None,
            last_transition: None,
        }
    }

    /// Returns the scenario's task.
    pub fn task(&self) -> Result<&Task, eyre::Report> {
        self.task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }
}

impl Default for CoordinationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> CoordinationWorld {
    CoordinationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
