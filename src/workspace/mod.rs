//! Repository checkouts and per-task worktrees.
//!
//! Every worktree is exclusively owned by one (team, repository, task)
//! triple and checks out that task's feature branch.
//!
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod ports;

#[cfg(test)]
mod tests;
