//! Engine error and outcome types.

mod error;
mod outcome;

pub use error::{HookError, HookResult, TransitionError, TransitionResult};
pub use outcome::{AutoOutcome, TransitionOutcome, TransitionRequest};
