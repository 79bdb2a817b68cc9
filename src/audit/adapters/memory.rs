//! In-memory event log and notifier.

use crate::audit::{
    domain::AuditEvent,
    ports::{EventLog, EventLogError, EventLogResult, Notifier, NotifierError, NotifierResult},
};
use crate::task::domain::AgentName;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory event log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every recorded event in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] when the internal lock is poisoned.
    pub fn events(&self) -> EventLogResult<Vec<AuditEvent>> {
        let events = self.events.read().map_err(|err| {
            EventLogError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(events.clone())
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn log_event(&self, event: &AuditEvent) -> EventLogResult<()> {
        let mut events = self.events.write().map_err(|err| {
            EventLogError::persistence(std::io::Error::other(err.to_string()))
        })?;
        events.push(event.clone());
        Ok(())
    }
}

/// A notification captured by [`InMemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Recipient.
    pub recipient: AgentName,
    /// Rendered body.
    pub body: String,
}

/// Notifier that records deliveries in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delivered notification in order.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] when the internal lock is poisoned.
    pub fn sent(&self) -> NotifierResult<Vec<Notification>> {
        let sent = self
            .sent
            .read()
            .map_err(|err| NotifierError::delivery(std::io::Error::other(err.to_string())))?;
        Ok(sent.clone())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, recipient: &AgentName, body: &str) -> NotifierResult<()> {
        let mut sent = self
            .sent
            .write()
            .map_err(|err| NotifierError::delivery(std::io::Error::other(err.to_string())))?;
        sent.push(Notification {
            recipient: recipient.clone(),
            body: body.to_owned(),
        });
        Ok(())
    }
}
