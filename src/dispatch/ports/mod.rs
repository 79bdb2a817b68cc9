//! Port contracts consumed by the dispatcher.

mod agents;
mod mailbox;
mod runtime;

pub use agents::{AgentDirectory, AgentDirectoryError, AgentDirectoryResult};
pub use mailbox::{Mailbox, MailboxError, MailboxResult};
pub use runtime::{AgentRuntime, ProcessMonitor};
