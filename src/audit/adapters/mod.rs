//! Adapter implementations for the audit trail.

pub mod memory;
