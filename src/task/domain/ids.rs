//! Identifier and validated scalar types for the task domain.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for team and agent names.
const MAX_NAME_LENGTH: usize = 64;

/// Maximum length for repository names.
const MAX_REPO_NAME_LENGTH: usize = 100;

/// Unique identifier for a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a task identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for TaskId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.'
}

fn normalize_name(raw: &str, max_length: usize) -> Option<&str> {
    let normalized = raw.trim();
    let is_valid = !normalized.is_empty()
        && normalized.len() <= max_length
        && normalized.chars().all(is_name_char);
    is_valid.then_some(normalized)
}

/// Team identifier; every task, agent and worktree belongs to one team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamName(String);

impl TeamName {
    /// Creates a validated team name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTeamName`] when the value is empty,
    /// too long, or contains characters other than ASCII letters, digits,
    /// `-`, `_` or `.`.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        normalize_name(&raw, MAX_NAME_LENGTH)
            .map(|name| Self(name.to_owned()))
            .ok_or(TaskDomainError::InvalidTeamName(raw))
    }

    /// Returns the team name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TeamName {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TeamName> for String {
    fn from(value: TeamName) -> Self {
        value.0
    }
}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of an agent (automated worker, reviewer, or human).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    /// Creates a validated agent name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidAgentName`] under the same rules as
    /// [`TeamName::new`].
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        normalize_name(&raw, MAX_NAME_LENGTH)
            .map(|name| Self(name.to_owned()))
            .ok_or(TaskDomainError::InvalidAgentName(raw))
    }

    /// Returns the agent name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentName {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repository name, used as a single directory segment under the team root.
///
/// # Examples
///
///     use atelier::task::domain::RepoName;
///
///     assert!(RepoName::new("service-api").is_ok());
///     assert!(RepoName::new("..").is_err());
///     assert!(RepoName::new("owner/repo").is_err());
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

impl RepoName {
    /// Creates a validated repository name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidRepoName`] when the value is empty,
    /// `.` or `..`, too long, or contains a path separator or other
    /// unsupported character.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        match normalize_name(&raw, MAX_REPO_NAME_LENGTH) {
            Some(name) if name != "." && name != ".." => Ok(Self(name.to_owned())),
            _ => Err(TaskDomainError::InvalidRepoName(raw)),
        }
    }

    /// Returns the repository name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoName {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepoName> for String {
    fn from(value: RepoName) -> Self {
        value.0
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hexadecimal git object name, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    const MIN_LENGTH: usize = 7;
    const MAX_LENGTH: usize = 64;

    /// Creates a validated commit identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCommitSha`] when the value is not
    /// 7 to 64 hexadecimal characters.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();
        let is_valid = (Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&normalized.len())
            && normalized.chars().all(|ch| ch.is_ascii_hexdigit());
        if !is_valid {
            return Err(TaskDomainError::InvalidCommitSha(raw));
        }
        Ok(Self(normalized))
    }

    /// Wraps a value already known to be lowercase hexadecimal.
    pub(crate) fn from_hex_unchecked(value: String) -> Self {
        debug_assert!(Self::new(value.as_str()).is_ok(), "invalid commit sha {value}");
        Self(value)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommitSha {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommitSha> for String {
    fn from(value: CommitSha) -> Self {
        value.0
    }
}

impl AsRef<str> for CommitSha {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
