//! Mailbox messages and dispatch batches.

use crate::task::domain::{AgentName, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a mailbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message addressed to one agent.
///
/// `delivered_at`, `seen_at` and `processed_at` gate dispatch: a message is
/// unread until a turn has processed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    id: MessageId,
    recipient: AgentName,
    sender: AgentName,
    task_id: Option<TaskId>,
    body: String,
    delivered_at: DateTime<Utc>,
    seen_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
}

impl MailMessage {
    /// Creates a delivered, unseen message.
    #[must_use]
    pub fn new(
        recipient: AgentName,
        sender: AgentName,
        task_id: Option<TaskId>,
        body: impl Into<String>,
        delivered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            recipient,
            sender,
            task_id,
            body: body.into(),
            delivered_at,
            seen_at: None,
            processed_at: None,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the recipient.
    #[must_use]
    pub const fn recipient(&self) -> &AgentName {
        &self.recipient
    }

    /// Returns the sender.
    #[must_use]
    pub const fn sender(&self) -> &AgentName {
        &self.sender
    }

    /// Returns the associated task.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the delivery time.
    #[must_use]
    pub const fn delivered_at(&self) -> DateTime<Utc> {
        self.delivered_at
    }

    /// Returns when a turn first picked the message up.
    #[must_use]
    pub const fn seen_at(&self) -> Option<DateTime<Utc>> {
        self.seen_at
    }

    /// Returns when a turn finished with the message.
    #[must_use]
    pub const fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    /// Returns `true` until a turn has processed the message.
    #[must_use]
    pub const fn is_unprocessed(&self) -> bool {
        self.processed_at.is_none()
    }

    /// Stamps `seen_at` unless already set.
    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.seen_at.get_or_insert(at);
    }

    /// Stamps `processed_at` unless already set.
    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        self.processed_at.get_or_insert(at);
    }
}

/// Messages handed to one agent turn.
///
/// The first message is the actionable prompt; the rest are context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBatch {
    prompt: MailMessage,
    context: Vec<MailMessage>,
}

impl MessageBatch {
    /// Returns the recipient.
    #[must_use]
    pub const fn recipient(&self) -> &AgentName {
        self.prompt.recipient()
    }

    /// Returns the shared task association.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.prompt.task_id()
    }

    /// Returns the actionable message.
    #[must_use]
    pub const fn prompt(&self) -> &MailMessage {
        &self.prompt
    }

    /// Returns context-only messages in delivery order.
    #[must_use]
    pub fn context(&self) -> &[MailMessage] {
        &self.context
    }

    /// Returns every message identifier, prompt first.
    #[must_use]
    pub fn message_ids(&self) -> Vec<MessageId> {
        std::iter::once(&self.prompt)
            .chain(&self.context)
            .map(MailMessage::id)
            .collect()
    }

    /// Returns the number of messages in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.context.len() + 1
    }

    /// Always `false`; a batch holds at least its prompt.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Groups unprocessed messages into dispatch batches.
///
/// Messages for the same recipient and task form one batch in delivery
/// order; messages without a task association are batched alone. Batches
/// are ordered by the delivery time of their prompt.
///
/// # Examples
///
///     use atelier::dispatch::domain::{MailMessage, batch_messages};
///     use atelier::task::domain::{AgentName, TaskId};
///     use chrono::Utc;
///
///     let bob = AgentName::new("bob").expect("valid");
///     let lead = AgentName::new("lead").expect("valid");
///     let task = Some(TaskId::new());
///     let now = Utc::now();
///     let batches = batch_messages(vec![
///         MailMessage::new(bob.clone(), lead.clone(), task, "implement", now),
///         MailMessage::new(bob.clone(), lead.clone(), None, "fyi", now),
///         MailMessage::new(bob, lead, task, "also this", now),
///     ]);
///     assert_eq!(batches.len(), 2);
///     assert_eq!(batches.first().map(|batch| batch.len()), Some(2));
#[must_use]
pub fn batch_messages(mut messages: Vec<MailMessage>) -> Vec<MessageBatch> {
    messages.retain(MailMessage::is_unprocessed);
    messages.sort_by_key(MailMessage::delivered_at);

    let mut batches: Vec<MessageBatch> = Vec::new();
    for message in messages {
        let joinable = message.task_id().and_then(|task_id| {
            batches.iter_mut().find(|batch| {
                batch.task_id() == Some(task_id) && batch.recipient() == message.recipient()
            })
        });
        match joinable {
            Some(batch) => batch.context.push(message),
            None => batches.push(MessageBatch {
                prompt: message,
                context: Vec::new(),
            }),
        }
    }
    batches
}
