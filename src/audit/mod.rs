//! Append-only audit trail and human notifications.
//!
//! Every status change, gate rejection, merge outcome and escalation is
//! appended to an [`ports::EventLog`] independently of notification
//! delivery.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The recording service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
