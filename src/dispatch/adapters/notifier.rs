//! Notifier that delivers escalations to the recipient's mailbox.

use crate::audit::ports::{Notifier, NotifierError, NotifierResult};
use crate::dispatch::domain::MailMessage;
use crate::dispatch::ports::Mailbox;
use crate::task::domain::AgentName;
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;

/// Turns notifications into mailbox messages from a fixed sender.
#[derive(Clone)]
pub struct MailboxNotifier {
    mailbox: Arc<dyn Mailbox>,
    sender: AgentName,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl MailboxNotifier {
    /// Creates a notifier sending as `sender`.
    #[must_use]
    pub const fn new(
        mailbox: Arc<dyn Mailbox>,
        sender: AgentName,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            mailbox,
            sender,
            clock,
        }
    }
}

#[async_trait]
impl Notifier for MailboxNotifier {
    async fn notify(&self, recipient: &AgentName, body: &str) -> NotifierResult<()> {
        let message = MailMessage::new(
            recipient.clone(),
            self.sender.clone(),
            None,
            body,
            self.clock.utc(),
        );
        self.mailbox
            .deliver(message)
            .await
            .map_err(NotifierError::delivery)
    }
}
