//! Diesel row models for task persistence.

use super::schema::tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row shape shared by reads, inserts and updates of task records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Owning team.
    pub team: String,
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Pinned workflow name.
    pub workflow_name: String,
    /// Pinned workflow version.
    pub workflow_version: i32,
    /// Current stage key.
    pub status: String,
    /// Current assignee.
    pub assignee: Option<String>,
    /// Directly responsible individual.
    pub dri: Option<String>,
    /// Preferred reviewer.
    pub reviewer: Option<String>,
    /// Per-repository bindings as JSON.
    pub repositories: Value,
    /// Number of review requests.
    pub review_attempt: i32,
    /// Number of failed merge attempts.
    pub merge_attempts: i32,
    /// Review outcome.
    pub approval_status: String,
    /// Reason given by the last rejecting reviewer.
    pub rejection_reason: Option<String>,
    /// Time a terminal stage was reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form metadata as JSON.
    pub metadata: Value,
    /// Optimistic-concurrency revision.
    pub revision: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
