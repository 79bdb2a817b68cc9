//! `PostgreSQL` repository implementation for task storage.

use super::{models::TaskRow, schema::tasks};
use crate::task::{
    domain::{
        AgentName, ApprovalStatus, PersistedTaskData, RepoBinding, Task, TaskId, TeamName,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use crate::workflow::domain::{StageKey, WorkflowName, WorkflowRef, WorkflowVersion};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_row(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task, expected_revision: u64) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_row(task)?;
        let expected =
            i64::try_from(expected_revision).map_err(TaskRepositoryError::persistence)?;

        self.run_blocking(move |connection| {
            let updated = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task_id.into_inner()))
                    .filter(tasks::revision.eq(expected)),
            )
            .set(&row)
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            if updated > 0 {
                return Ok(());
            }

            let current = tasks::table
                .filter(tasks::id.eq(task_id.into_inner()))
                .select(tasks::revision)
                .first::<i64>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            match current {
                None => Err(TaskRepositoryError::NotFound(task_id)),
                Some(actual) => Err(TaskRepositoryError::StaleRevision {
                    task_id,
                    expected: expected_revision,
                    actual: u64::try_from(actual).map_err(TaskRepositoryError::persistence)?,
                }),
            }
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list_open(&self, team: &TeamName) -> TaskRepositoryResult<Vec<Task>> {
        let team_name = team.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::team.eq(team_name))
                .filter(tasks::completed_at.is_null())
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }
}

fn to_row(task: &Task) -> TaskRepositoryResult<TaskRow> {
    let repositories =
        serde_json::to_value(task.repositories()).map_err(TaskRepositoryError::persistence)?;
    let metadata =
        serde_json::to_value(task.metadata()).map_err(TaskRepositoryError::persistence)?;

    Ok(TaskRow {
        id: task.id().into_inner(),
        team: task.team().as_str().to_owned(),
        title: task.title().to_owned(),
        description: task.description().to_owned(),
        workflow_name: task.workflow().name().as_str().to_owned(),
        workflow_version: i32::try_from(task.workflow().version().value())
            .map_err(TaskRepositoryError::persistence)?,
        status: task.status().as_str().to_owned(),
        assignee: task.assignee().map(|name| name.as_str().to_owned()),
        dri: task.dri().map(|name| name.as_str().to_owned()),
        reviewer: task.reviewer().map(|name| name.as_str().to_owned()),
        repositories,
        review_attempt: i32::try_from(task.review_attempt())
            .map_err(TaskRepositoryError::persistence)?,
        merge_attempts: i32::try_from(task.merge_attempts())
            .map_err(TaskRepositoryError::persistence)?,
        approval_status: task.approval_status().as_str().to_owned(),
        rejection_reason: task.rejection_reason().map(str::to_owned),
        completed_at: task.completed_at(),
        metadata,
        revision: i64::try_from(task.revision()).map_err(TaskRepositoryError::persistence)?,
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn optional_agent(value: Option<String>) -> TaskRepositoryResult<Option<AgentName>> {
    value
        .map(AgentName::new)
        .transpose()
        .map_err(TaskRepositoryError::persistence)
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let workflow_version = u32::try_from(row.workflow_version)
        .map_err(TaskRepositoryError::persistence)
        .and_then(|value| {
            WorkflowVersion::new(value).map_err(TaskRepositoryError::persistence)
        })?;
    let workflow_name =
        WorkflowName::new(row.workflow_name).map_err(TaskRepositoryError::persistence)?;
    let repositories = serde_json::from_value::<Vec<RepoBinding>>(row.repositories)
        .map_err(TaskRepositoryError::persistence)?;
    let metadata =
        serde_json::from_value(row.metadata).map_err(TaskRepositoryError::persistence)?;
    let approval_status = ApprovalStatus::try_from(row.approval_status.as_str())
        .map_err(TaskRepositoryError::persistence)?;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        team: TeamName::new(row.team).map_err(TaskRepositoryError::persistence)?,
        title: row.title,
        description: row.description,
        workflow: WorkflowRef::new(workflow_name, workflow_version),
        status: StageKey::new(row.status).map_err(TaskRepositoryError::persistence)?,
        assignee: optional_agent(row.assignee)?,
        dri: optional_agent(row.dri)?,
        reviewer: optional_agent(row.reviewer)?,
        repositories,
        review_attempt: u32::try_from(row.review_attempt)
            .map_err(TaskRepositoryError::persistence)?,
        merge_attempts: u32::try_from(row.merge_attempts)
            .map_err(TaskRepositoryError::persistence)?,
        approval_status,
        rejection_reason: row.rejection_reason,
        completed_at: row.completed_at,
        metadata,
        revision: u64::try_from(row.revision).map_err(TaskRepositoryError::persistence)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(Task::from_persisted(data))
}
