//! Audit services.

mod trail;

pub use trail::AuditTrail;
