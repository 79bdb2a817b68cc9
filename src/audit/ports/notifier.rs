//! Human notification port.

use crate::task::domain::AgentName;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for notification delivery.
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Delivers notifications to humans.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `body` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] when delivery fails.
    async fn notify(&self, recipient: &AgentName, body: &str) -> NotifierResult<()>;
}

/// Errors returned by notifier implementations.
#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    /// Delivery failure.
    #[error("notification delivery failed: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotifierError {
    /// Wraps a delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}
