//! Retry policy applied after a failed merge attempt.

use super::MergeFailure;
use crate::task::domain::Task;

/// What the merge stage does after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Stay in the merge stage and try again on a later tick.
    Retry {
        /// Failed attempts so far.
        attempts: u32,
    },
    /// Give up and hand the task to a human.
    Escalate {
        /// Failed attempts so far.
        attempts: u32,
    },
}

/// Caps retryable merge failures per task.
///
/// The counter lives on the task, so the cap holds across coordinator
/// restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` retryable failures.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Returns the cap.
    #[must_use]
    pub const fn max_attempts(self) -> u32 {
        self.max_attempts
    }

    /// Records `failure` on `task` and decides whether to retry.
    ///
    /// Retryable failures increment the task's merge attempts; the task
    /// escalates once the count reaches the cap. Non-retryable failures
    /// escalate immediately without counting.
    pub fn on_failure(self, task: &mut Task, failure: &MergeFailure) -> MergeDecision {
        if !failure.is_retryable() {
            return MergeDecision::Escalate {
                attempts: task.merge_attempts(),
            };
        }
        let attempts = task.record_merge_attempt();
        if attempts < self.max_attempts {
            MergeDecision::Retry { attempts }
        } else {
            MergeDecision::Escalate { attempts }
        }
    }
}
