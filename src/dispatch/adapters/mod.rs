//! Adapter implementations of the dispatch ports.

pub mod memory;
mod notifier;
#[cfg(unix)]
mod signal;

pub use notifier::MailboxNotifier;
#[cfg(unix)]
pub use signal::SignalMonitor;
