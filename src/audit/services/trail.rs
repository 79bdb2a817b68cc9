//! Best-effort audit recording and human escalation.

use crate::audit::{
    domain::{AuditEvent, AuditEventKind},
    ports::{EventLog, Notifier},
};
use crate::task::domain::{AgentName, TaskId, TeamName};
use mockable::Clock;
use std::sync::Arc;
use tracing::{error, warn};

/// Records audit events and escalations without ever failing the caller.
///
/// The event is always appended before any notification is attempted, so
/// operational history survives notification outages.
#[derive(Clone)]
pub struct AuditTrail {
    log: Arc<dyn EventLog>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl AuditTrail {
    /// Creates an audit trail.
    #[must_use]
    pub const fn new(
        log: Arc<dyn EventLog>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            log,
            notifier,
            clock,
        }
    }

    /// Appends an event; failures are logged and swallowed.
    pub async fn record(
        &self,
        team: &TeamName,
        task_id: Option<TaskId>,
        kind: AuditEventKind,
        message: impl Into<String>,
    ) {
        let event = AuditEvent::new(team.clone(), task_id, kind, message, self.clock.utc());
        if let Err(err) = self.log.log_event(&event).await {
            warn!(
                team = %team,
                kind = %kind,
                error = %err,
                "failed to append audit event"
            );
        }
    }

    /// Records an escalation and then notifies `recipient`.
    ///
    /// Returns `true` when the notification was delivered. A missing
    /// recipient still records the event.
    pub async fn escalate(
        &self,
        team: &TeamName,
        task_id: Option<TaskId>,
        recipient: Option<&AgentName>,
        body: &str,
    ) -> bool {
        let message = match recipient {
            Some(name) => format!("escalated to {name}: {body}"),
            None => format!("escalated with no responsible human: {body}"),
        };
        self.record(team, task_id, AuditEventKind::Escalated, message)
            .await;

        let Some(name) = recipient else {
            error!(team = %team, "escalation has no responsible human");
            return false;
        };
        error!(team = %team, recipient = %name, "escalating to human");
        if let Err(err) = self.notifier.notify(name, body).await {
            warn!(
                team = %team,
                recipient = %name,
                error = %err,
                "failed to deliver escalation notification"
            );
            return false;
        }
        true
    }
}
