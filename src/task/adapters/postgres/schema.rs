//! Diesel schema for task persistence.

diesel::table! {
    /// Task records pinned to a workflow version.
    tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Owning team.
        #[max_length = 64]
        team -> Varchar,
        /// Task title.
        title -> Text,
        /// Task description.
        description -> Text,
        /// Pinned workflow name.
        #[max_length = 64]
        workflow_name -> Varchar,
        /// Pinned workflow version.
        workflow_version -> Int4,
        /// Current stage key within the pinned workflow.
        #[max_length = 64]
        status -> Varchar,
        /// Current assignee.
        #[max_length = 64]
        assignee -> Nullable<Varchar>,
        /// Directly responsible individual.
        #[max_length = 64]
        dri -> Nullable<Varchar>,
        /// Preferred reviewer.
        #[max_length = 64]
        reviewer -> Nullable<Varchar>,
        /// Per-repository bindings.
        repositories -> Jsonb,
        /// Number of review requests.
        review_attempt -> Int4,
        /// Number of failed merge attempts.
        merge_attempts -> Int4,
        /// Review outcome.
        #[max_length = 20]
        approval_status -> Varchar,
        /// Reason given by the last rejecting reviewer.
        rejection_reason -> Nullable<Text>,
        /// Time a terminal stage was reached.
        completed_at -> Nullable<Timestamptz>,
        /// Free-form metadata.
        metadata -> Jsonb,
        /// Optimistic-concurrency revision.
        revision -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
