//! Stage hooks and the transition engine.
//!
//! The engine is the only code path that changes a task's status. Each
//! move runs the hooks of the stage kinds involved:
//!
//! - `exit` on the stage being left (best-effort);
//! - `enter` on the target, which may reject the move with a gate error or
//!   divert it to the workflow's error stage with an action error;
//! - `assign` on the target to pick the next assignee.
//!
//! Scheduler-driven stages also expose `action`, run by
//! [`services::TransitionEngine::run_auto_action`].

pub mod domain;
pub mod hooks;
pub mod services;

#[cfg(test)]
pub(crate) mod tests;
