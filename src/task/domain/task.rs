//! Task aggregate root and its per-repository bindings.

use super::{
    AgentName, BranchName, CommitSha, ParseApprovalStatusError, RepoName, TaskDomainError,
    TaskId, TeamName,
};
use crate::workflow::domain::{StageKey, WorkflowRef};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Metadata key recording the agent that implemented the task.
pub const IMPLEMENTER_METADATA_KEY: &str = "implementer";

/// Review outcome recorded on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// No review has been requested yet.
    #[default]
    #[serde(rename = "none")]
    NotRequested,
    /// A review has been requested and is outstanding.
    Pending,
    /// The reviewer approved the work.
    Approved,
    /// The reviewer sent the work back.
    Rejected,
}

impl ApprovalStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequested => "none",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl TryFrom<&str> for ApprovalStatus {
    type Error = ParseApprovalStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" => Ok(Self::NotRequested),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseApprovalStatusError(value.to_owned())),
        }
    }
}

/// Per-repository state of a task: its feature branch, the integration
/// commit it was branched from, the commits submitted for review and the
/// merge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoBinding {
    repository: RepoName,
    branch: BranchName,
    base_sha: Option<CommitSha>,
    commits: Vec<CommitSha>,
    merged_sha: Option<CommitSha>,
}

impl RepoBinding {
    /// Creates a binding with no recorded commits.
    #[must_use]
    pub const fn new(repository: RepoName, branch: BranchName) -> Self {
        Self {
            repository,
            branch,
            base_sha: None,
            commits: Vec::new(),
            merged_sha: None,
        }
    }

    /// Returns the repository name.
    #[must_use]
    pub const fn repository(&self) -> &RepoName {
        &self.repository
    }

    /// Returns the feature branch.
    #[must_use]
    pub const fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Returns the integration commit the branch started from.
    #[must_use]
    pub const fn base_sha(&self) -> Option<&CommitSha> {
        self.base_sha.as_ref()
    }

    /// Returns commits already submitted for review, oldest first.
    #[must_use]
    pub fn commits(&self) -> &[CommitSha] {
        &self.commits
    }

    /// Returns the integration-branch head recorded after a merge.
    #[must_use]
    pub const fn merged_sha(&self) -> Option<&CommitSha> {
        self.merged_sha.as_ref()
    }

    /// Returns `true` once this repository has been merged.
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        self.merged_sha.is_some()
    }

    /// Records the base commit unless one is already set.
    ///
    /// Returns `true` when the value was recorded.
    pub fn set_base_sha_once(&mut self, sha: CommitSha) -> bool {
        if self.base_sha.is_some() {
            return false;
        }
        self.base_sha = Some(sha);
        true
    }

    /// Appends commits not previously recorded, preserving order.
    ///
    /// Returns the number of newly recorded commits.
    pub fn record_commits(&mut self, commits: impl IntoIterator<Item = CommitSha>) -> usize {
        let mut known: BTreeSet<String> =
            self.commits.iter().map(|sha| sha.as_str().to_owned()).collect();
        let before = self.commits.len();
        for commit in commits {
            if known.insert(commit.as_str().to_owned()) {
                self.commits.push(commit);
            }
        }
        self.commits.len() - before
    }

    /// Records the merge result.
    pub fn mark_merged(&mut self, sha: CommitSha) {
        self.merged_sha = Some(sha);
    }
}

/// Parameter object for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Owning team.
    pub team: TeamName,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Pinned workflow.
    pub workflow: WorkflowRef,
    /// Initial stage of the pinned workflow.
    pub status: StageKey,
    /// Repositories the task changes.
    pub repositories: Vec<RepoName>,
    /// Directly responsible individual.
    pub dri: Option<AgentName>,
    /// Preferred reviewer.
    pub reviewer: Option<AgentName>,
    /// Initial assignee.
    pub assignee: Option<AgentName>,
}

/// Task aggregate root.
///
/// The status is a stage key of the pinned workflow version and only the
/// transition engine changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    team: TeamName,
    title: String,
    description: String,
    workflow: WorkflowRef,
    status: StageKey,
    assignee: Option<AgentName>,
    dri: Option<AgentName>,
    reviewer: Option<AgentName>,
    repositories: Vec<RepoBinding>,
    review_attempt: u32,
    merge_attempts: u32,
    approval_status: ApprovalStatus,
    rejection_reason: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    metadata: BTreeMap<String, Value>,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning team.
    pub team: TeamName,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Pinned workflow.
    pub workflow: WorkflowRef,
    /// Current stage key.
    pub status: StageKey,
    /// Current assignee.
    pub assignee: Option<AgentName>,
    /// Directly responsible individual.
    pub dri: Option<AgentName>,
    /// Preferred reviewer.
    pub reviewer: Option<AgentName>,
    /// Per-repository bindings.
    pub repositories: Vec<RepoBinding>,
    /// Number of review requests.
    pub review_attempt: u32,
    /// Number of failed merge attempts.
    pub merge_attempts: u32,
    /// Review outcome.
    pub approval_status: ApprovalStatus,
    /// Reason given by the last rejecting reviewer.
    pub rejection_reason: Option<String>,
    /// Time a terminal stage was reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task resting in `new_task.status`.
    ///
    /// Every repository is bound to the task's feature branch
    /// (`task/<task-id>`).
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] for a blank title,
    /// [`TaskDomainError::NoRepositories`] when no repository is given, or
    /// [`TaskDomainError::DuplicateRepository`] when one is listed twice.
    pub fn new(new_task: NewTask, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        if new_task.repositories.is_empty() {
            return Err(TaskDomainError::NoRepositories);
        }

        let id = TaskId::new();
        let branch = BranchName::for_task(id);
        let mut seen = BTreeSet::new();
        let mut repositories = Vec::with_capacity(new_task.repositories.len());
        for repository in new_task.repositories {
            if !seen.insert(repository.clone()) {
                return Err(TaskDomainError::DuplicateRepository(repository));
            }
            repositories.push(RepoBinding::new(repository, branch.clone()));
        }

        let timestamp = clock.utc();
        Ok(Self {
            id,
            team: new_task.team,
            title: title.to_owned(),
            description: new_task.description.trim().to_owned(),
            workflow: new_task.workflow,
            status: new_task.status,
            assignee: new_task.assignee,
            dri: new_task.dri,
            reviewer: new_task.reviewer,
            repositories,
            review_attempt: 0,
            merge_attempts: 0,
            approval_status: ApprovalStatus::NotRequested,
            rejection_reason: None,
            completed_at: None,
            metadata: BTreeMap::new(),
            revision: 0,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            team: data.team,
            title: data.title,
            description: data.description,
            workflow: data.workflow,
            status: data.status,
            assignee: data.assignee,
            dri: data.dri,
            reviewer: data.reviewer,
            repositories: data.repositories,
            review_attempt: data.review_attempt,
            merge_attempts: data.merge_attempts,
            approval_status: data.approval_status,
            rejection_reason: data.rejection_reason,
            completed_at: data.completed_at,
            metadata: data.metadata,
            revision: data.revision,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning team.
    #[must_use]
    pub const fn team(&self) -> &TeamName {
        &self.team
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the pinned workflow reference.
    #[must_use]
    pub const fn workflow(&self) -> &WorkflowRef {
        &self.workflow
    }

    /// Returns the current stage key.
    #[must_use]
    pub const fn status(&self) -> &StageKey {
        &self.status
    }

    /// Returns the current assignee.
    #[must_use]
    pub const fn assignee(&self) -> Option<&AgentName> {
        self.assignee.as_ref()
    }

    /// Returns the directly responsible individual.
    #[must_use]
    pub const fn dri(&self) -> Option<&AgentName> {
        self.dri.as_ref()
    }

    /// Returns the preferred reviewer.
    #[must_use]
    pub const fn reviewer(&self) -> Option<&AgentName> {
        self.reviewer.as_ref()
    }

    /// Returns the per-repository bindings.
    #[must_use]
    pub fn repositories(&self) -> &[RepoBinding] {
        &self.repositories
    }

    /// Returns the binding for `repository`.
    #[must_use]
    pub fn repository(&self, repository: &RepoName) -> Option<&RepoBinding> {
        self.repositories
            .iter()
            .find(|binding| binding.repository() == repository)
    }

    /// Returns mutable access to the per-repository bindings.
    pub fn repositories_mut(&mut self) -> impl Iterator<Item = &mut RepoBinding> {
        self.repositories.iter_mut()
    }

    /// Returns mutable access to the binding for `repository`.
    pub fn repository_mut(&mut self, repository: &RepoName) -> Option<&mut RepoBinding> {
        self.repositories
            .iter_mut()
            .find(|binding| binding.repository() == repository)
    }

    /// Returns how many times review was requested.
    #[must_use]
    pub const fn review_attempt(&self) -> u32 {
        self.review_attempt
    }

    /// Returns the persisted count of failed merge attempts.
    #[must_use]
    pub const fn merge_attempts(&self) -> u32 {
        self.merge_attempts
    }

    /// Returns the review outcome.
    #[must_use]
    pub const fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    /// Returns the reason given by the last rejecting reviewer.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Returns when the task reached a terminal stage.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns `true` once the task has reached a terminal stage.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Returns the free-form metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Returns the agent recorded as implementer, if any.
    #[must_use]
    pub fn implementer(&self) -> Option<AgentName> {
        self.metadata
            .get(IMPLEMENTER_METADATA_KEY)
            .and_then(Value::as_str)
            .and_then(|name| AgentName::new(name).ok())
    }

    /// Returns the optimistic-concurrency revision.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets or clears the assignee.
    pub fn set_assignee(&mut self, assignee: Option<AgentName>) {
        self.assignee = assignee;
    }

    /// Sets or clears the directly responsible individual.
    pub fn set_dri(&mut self, dri: Option<AgentName>) {
        self.dri = dri;
    }

    /// Sets or clears the preferred reviewer.
    pub fn set_reviewer(&mut self, reviewer: Option<AgentName>) {
        self.reviewer = reviewer;
    }

    /// Records the agent that implemented the task.
    pub fn record_implementer(&mut self, implementer: &AgentName) {
        self.metadata.insert(
            IMPLEMENTER_METADATA_KEY.to_owned(),
            Value::String(implementer.as_str().to_owned()),
        );
    }

    /// Records a new review request and marks approval pending.
    pub fn record_review_request(&mut self) {
        self.review_attempt = self.review_attempt.saturating_add(1);
        self.approval_status = ApprovalStatus::Pending;
    }

    /// Sets the review outcome.
    pub fn set_approval_status(&mut self, status: ApprovalStatus) {
        self.approval_status = status;
    }

    /// Sets or clears the rejection reason.
    pub fn set_rejection_reason(&mut self, reason: Option<String>) {
        self.rejection_reason = reason;
    }

    /// Increments the failed-merge counter and returns its new value.
    pub fn record_merge_attempt(&mut self) -> u32 {
        self.merge_attempts = self.merge_attempts.saturating_add(1);
        self.merge_attempts
    }

    /// Resets the failed-merge counter.
    pub fn reset_merge_attempts(&mut self) {
        self.merge_attempts = 0;
    }

    /// Inserts or replaces a metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Moves the task to `status`, stamping `completed_at` for terminal
    /// stages.
    pub(crate) fn move_to(&mut self, status: StageKey, terminal: bool, clock: &impl Clock) {
        self.status = status;
        if terminal {
            self.completed_at = Some(clock.utc());
        }
    }

    /// Bumps the revision and `updated_at` ahead of a write.
    pub(crate) fn touch(&mut self, clock: &impl Clock) {
        self.revision = self.revision.saturating_add(1);
        self.updated_at = clock.utc();
    }
}
