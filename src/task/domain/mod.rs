//! Domain model for tasks.
//!
//! A task is pinned to one workflow version at creation and carries the
//! per-repository state the merge pipeline needs to resume after a
//! restart. Infrastructure concerns stay outside of the domain boundary.

mod branch;
mod error;
mod ids;
mod task;

pub use branch::BranchName;
pub use error::{ParseApprovalStatusError, TaskDomainError};
pub use ids::{AgentName, CommitSha, RepoName, TaskId, TeamName};
pub use task::{
    ApprovalStatus, IMPLEMENTER_METADATA_KEY, NewTask, PersistedTaskData, RepoBinding, Task,
};
