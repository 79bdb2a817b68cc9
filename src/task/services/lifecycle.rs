//! Service layer for task creation, lookup and annotation.

use crate::audit::{domain::AuditEventKind, services::AuditTrail};
use crate::task::{
    domain::{AgentName, NewTask, RepoName, Task, TaskDomainError, TaskId, TeamName},
    ports::{TaskRepository, TaskRepositoryError},
};
use crate::workflow::{
    domain::{WorkflowName, WorkflowValidationError, WorkflowVersion},
    services::WorkflowRegistry,
};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    team: String,
    title: String,
    description: Option<String>,
    workflow: String,
    workflow_version: Option<u32>,
    repositories: Vec<String>,
    dri: Option<String>,
    reviewer: Option<String>,
    assignee: Option<String>,
}

impl CreateTaskRequest {
    /// Creates a request with the required fields. The task is pinned to
    /// the latest registered version of `workflow` unless
    /// [`CreateTaskRequest::with_workflow_version`] is used.
    #[must_use]
    pub fn new(
        team: impl Into<String>,
        title: impl Into<String>,
        workflow: impl Into<String>,
        repositories: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            team: team.into(),
            title: title.into(),
            description: None,
            workflow: workflow.into(),
            workflow_version: None,
            repositories: repositories.into_iter().collect(),
            dri: None,
            reviewer: None,
            assignee: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Pins an explicit workflow version.
    #[must_use]
    pub const fn with_workflow_version(mut self, version: u32) -> Self {
        self.workflow_version = Some(version);
        self
    }

    /// Sets the directly responsible individual.
    #[must_use]
    pub fn with_dri(mut self, dri: impl Into<String>) -> Self {
        self.dri = Some(dri.into());
        self
    }

    /// Sets the preferred reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = Some(reviewer.into());
        self
    }

    /// Sets the initial assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The workflow name or version is malformed.
    #[error(transparent)]
    Workflow(#[from] WorkflowValidationError),
    /// No version of the requested workflow is registered.
    #[error("workflow '{0}' is not registered")]
    UnknownWorkflow(WorkflowName),
    /// The requested workflow version is not registered.
    #[error("workflow '{name}' version {version} is not registered")]
    UnknownWorkflowVersion {
        /// Requested workflow.
        name: WorkflowName,
        /// Requested version.
        version: WorkflowVersion,
    },
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// No task exists with the given identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
#[derive(Clone)]
pub struct TaskLifecycleService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    workflows: WorkflowRegistry,
    audit: AuditTrail,
    clock: Arc<C>,
}

impl<R, C> TaskLifecycleService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        workflows: WorkflowRegistry,
        audit: AuditTrail,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            workflows,
            audit,
            clock,
        }
    }

    /// Creates a task in the initial stage of its pinned workflow.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when input validation fails, the
    /// workflow is not registered, or the repository rejects persistence.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        let team = TeamName::new(request.team)?;
        let name = WorkflowName::new(request.workflow)?;
        let version = request
            .workflow_version
            .map(WorkflowVersion::new)
            .transpose()?;
        let workflow = match version {
            Some(pinned) => self
                .workflows
                .load(&name, pinned)
                .ok_or(TaskLifecycleError::UnknownWorkflowVersion {
                    name,
                    version: pinned,
                })?,
            None => self
                .workflows
                .latest(&name)
                .ok_or(TaskLifecycleError::UnknownWorkflow(name))?,
        };

        let repositories = request
            .repositories
            .into_iter()
            .map(RepoName::new)
            .collect::<Result<Vec<_>, _>>()?;
        let new_task = NewTask {
            team,
            title: request.title,
            description: request.description.unwrap_or_default(),
            workflow: workflow.workflow_ref(),
            status: workflow.initial_stage().clone(),
            repositories,
            dri: optional_agent(request.dri)?,
            reviewer: optional_agent(request.reviewer)?,
            assignee: optional_agent(request.assignee)?,
        };
        let task = Task::new(new_task, &*self.clock)?;
        self.repository.store(&task).await?;

        info!(
            task = %task.id(),
            workflow = %task.workflow(),
            stage = %task.status(),
            "created task"
        );
        self.audit
            .record(
                task.team(),
                Some(task.id()),
                AuditEventKind::TaskCreated,
                format!("created '{}' in {} at {}", task.title(), task.workflow(), task.status()),
            )
            .await;
        Ok(task)
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn find_by_id(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_id(task_id).await?)
    }

    /// Lists a team's open tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn list_open(&self, team: &TeamName) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list_open(team).await?)
    }

    /// Sets a metadata entry on a task.
    ///
    /// Metadata is an audit field, so terminal tasks accept annotations too.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist
    /// or [`TaskLifecycleError::Repository`] when the write fails (including
    /// a concurrent modification).
    pub async fn annotate(
        &self,
        task_id: TaskId,
        key: impl Into<String>,
        value: Value,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))?;
        let expected_revision = task.revision();
        task.set_metadata(key, value);
        task.touch(&*self.clock);
        self.repository.update(&task, expected_revision).await?;
        Ok(task)
    }
}

fn optional_agent(value: Option<String>) -> Result<Option<AgentName>, TaskDomainError> {
    value.map(AgentName::new).transpose()
}
