//! Agent dispatch and the scheduling loop.
//!
//! The dispatcher polls a team's agents and tasks at a fixed interval and
//! hands out bounded units of work: agent turns over batched mailbox
//! messages, and the actions of tasks resting in auto stages.
//!
//! - Agent records, messages and batching in [`domain`]
//! - Directory, mailbox, runtime and liveness ports in [`ports`]
//! - In-memory adapters, a signal-based monitor and a mailbox notifier in
//!   [`adapters`]
//! - The [`services::Dispatcher`] loop in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
