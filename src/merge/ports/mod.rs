//! Port contracts for the merge pipeline.

mod git;
mod test_runner;

pub use git::{GitError, GitOps, GitResult};
pub use test_runner::TestRunner;
