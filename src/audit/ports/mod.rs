//! Port contracts for the audit trail.

mod event_log;
mod notifier;

pub use event_log::{EventLog, EventLogError, EventLogResult};
pub use notifier::{Notifier, NotifierError, NotifierResult};
