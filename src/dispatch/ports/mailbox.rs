//! Mailbox port.

use crate::dispatch::domain::{MailMessage, MessageId};
use crate::task::domain::AgentName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for mailbox operations.
pub type MailboxResult<T> = Result<T, MailboxError>;

/// Timestamp-gated message rows.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Returns `true` when `agent` has delivered messages no turn has
    /// processed.
    async fn has_unread(&self, agent: &AgentName) -> MailboxResult<bool>;

    /// Returns `agent`'s unprocessed messages in delivery order.
    async fn unprocessed(&self, agent: &AgentName) -> MailboxResult<Vec<MailMessage>>;

    /// Delivers a message.
    async fn deliver(&self, message: MailMessage) -> MailboxResult<()>;

    /// Stamps `seen_at` on the given messages.
    async fn mark_seen(&self, ids: &[MessageId], at: DateTime<Utc>) -> MailboxResult<()>;

    /// Stamps `processed_at` on the given messages.
    async fn mark_processed(&self, ids: &[MessageId], at: DateTime<Utc>) -> MailboxResult<()>;
}

/// Errors returned by mailboxes.
#[derive(Debug, Clone, Error)]
pub enum MailboxError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl MailboxError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
