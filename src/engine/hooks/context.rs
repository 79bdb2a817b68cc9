//! What a hook can see and use.

use crate::audit::services::AuditTrail;
use crate::config::CoordinatorConfig;
use crate::dispatch::ports::AgentDirectory;
use crate::merge::{ports::GitOps, services::MergePipeline};
use crate::task::{
    domain::{AgentName, Task},
    ports::TaskRepository,
};
use crate::workflow::domain::{Stage, WorkflowDef};
use crate::workspace::ports::{RepositoryResolver, WorktreeManager};
use std::sync::Arc;
use tracing::warn;

/// Collaborators shared by every hook.
#[derive(Clone)]
pub struct StageServices {
    /// Team agents and their roles.
    pub agents: Arc<dyn AgentDirectory>,
    /// Task storage, used for workload queries.
    pub tasks: Arc<dyn TaskRepository>,
    /// Per-task worktrees.
    pub worktrees: Arc<dyn WorktreeManager>,
    /// Git access to repository checkouts.
    pub git: Arc<dyn GitOps>,
    /// Repository checkout locations.
    pub resolver: Arc<dyn RepositoryResolver>,
    /// Rebase, test and fast-forward pipeline.
    pub merge: MergePipeline,
    /// Audit trail and escalation channel.
    pub audit: AuditTrail,
    /// Coordinator settings.
    pub config: Arc<CoordinatorConfig>,
}

impl StageServices {
    /// Returns the human who answers for `task`: its DRI when that agent
    /// is human, otherwise the configured escalation contact.
    pub async fn responsible_human(&self, task: &Task) -> AgentName {
        let Some(dri) = task.dri() else {
            return self.config.escalation_contact.clone();
        };
        match self.agents.find(task.team(), dri).await {
            Ok(Some(agent)) if agent.is_human() => dri.clone(),
            Ok(_) => self.config.escalation_contact.clone(),
            Err(err) => {
                warn!(task = %task.id(), dri = %dri, error = %err, "failed to look up DRI");
                self.config.escalation_contact.clone()
            }
        }
    }
}

/// State handed to a hook for one transition or action.
///
/// For auto actions `from` and `to` are both the current stage.
pub struct StageContext<'a> {
    /// Working copy of the task; persisted only if the move succeeds.
    pub task: &'a mut Task,
    /// The task's pinned workflow.
    pub workflow: &'a WorkflowDef,
    /// Stage being left.
    pub from: &'a Stage,
    /// Stage being entered.
    pub to: &'a Stage,
    /// Note attached to the request.
    pub note: Option<&'a str>,
    /// Shared collaborators.
    pub services: &'a StageServices,
    /// Escalations sent once the task is stored.
    pub(crate) escalations: Vec<PendingEscalation>,
}

impl<'a> StageContext<'a> {
    /// Creates a context with no pending escalations.
    #[must_use]
    pub const fn new(
        task: &'a mut Task,
        workflow: &'a WorkflowDef,
        from: &'a Stage,
        to: &'a Stage,
        services: &'a StageServices,
    ) -> Self {
        Self {
            task,
            workflow,
            from,
            to,
            note: None,
            services,
            escalations: Vec::new(),
        }
    }

    /// Attaches the request note.
    #[must_use]
    pub const fn with_note(mut self, note: Option<&'a str>) -> Self {
        self.note = note;
        self
    }

    /// Queues an escalation to `recipient`, delivered only after the task
    /// has been written back.
    pub fn escalate_after_commit(&mut self, recipient: AgentName, body: String) {
        self.escalations.push(PendingEscalation { recipient, body });
    }

    /// Takes the queued escalations.
    pub(crate) fn take_escalations(&mut self) -> Vec<PendingEscalation> {
        std::mem::take(&mut self.escalations)
    }
}

/// A notification held back until the task is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEscalation {
    pub(crate) recipient: AgentName,
    pub(crate) body: String,
}
