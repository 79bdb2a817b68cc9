//! Domain types for the merge pipeline.

mod failure;
mod outcome;
mod policy;
mod test_command;

pub use failure::{MergeFailure, MergeStep};
pub use outcome::{FastForwardOutcome, MergeReport, RebaseOutcome, TestRunOutcome};
pub use policy::{MergeDecision, RetryPolicy};
pub use test_command::detect_test_command;
