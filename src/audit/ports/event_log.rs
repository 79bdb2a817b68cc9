//! Append-only event log port.

use crate::audit::domain::AuditEvent;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for event log operations.
pub type EventLogResult<T> = Result<T, EventLogError>;

/// Append-only sink for audit events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] when the event could not be stored.
    async fn log_event(&self, event: &AuditEvent) -> EventLogResult<()>;
}

/// Errors returned by event log implementations.
#[derive(Debug, Clone, Error)]
pub enum EventLogError {
    /// Storage failure.
    #[error("event log error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl EventLogError {
    /// Wraps a storage error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
