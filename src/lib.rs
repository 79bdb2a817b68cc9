//! Atelier: a workflow and merge coordinator for teams of coding agents.
//!
//! Tasks move through versioned, team-defined workflows. Each stage kind
//! contributes behaviour through hooks: preparing isolated git worktrees,
//! gating review on new commits, and merging feature branches into the
//! integration branch with a linear-history rebase and fast-forward
//! pipeline. A polling dispatcher hands queued mail to idle agents and
//! drives tasks resting in auto stages, bounded by a concurrency limit.
//!
//! # Architecture
//!
//! Atelier follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (git, database, memory)
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`workflow`]: Stage definitions, validation and the versioned registry
//! - [`task`]: The task aggregate and its persistence
//! - [`engine`]: Stage hooks and the transition algorithm
//! - [`merge`]: Git operations and the merge pipeline
//! - [`dispatch`]: Agent mail, turns and the scheduling loop
//! - [`workspace`]: Repository paths and per-task worktrees
//! - [`audit`]: Audit events, escalations and notification templates
//! - [`config`]: Coordinator configuration
//! - [`process`]: Subprocess execution under timeouts

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod merge;
pub mod process;
pub mod task;
pub mod workflow;
pub mod workspace;
