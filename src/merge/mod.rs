//! Automated merge pipeline.
//!
//! Feature branches are rebased onto their integration branch, tested and
//! fast-forwarded; merge commits are never created. Failures are tagged
//! retryable or permanent and the [`domain::RetryPolicy`] decides when the
//! task escalates.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The pipeline service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
