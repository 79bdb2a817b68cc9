//! Branch-name value object.

use super::{TaskDomainError, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a validated branch name.
const MAX_BRANCH_NAME_LENGTH: usize = 200;

/// Prefix of the feature branch created for every task.
const TASK_BRANCH_PREFIX: &str = "task/";

/// Validated git branch name.
///
/// Branch names must be non-empty after trimming, must not contain colons,
/// whitespace or `..`, must not start with `-`, and must not exceed
/// `MAX_BRANCH_NAME_LENGTH` characters.
///
/// # Examples
///
///     use atelier::task::domain::BranchName;
///
///     let name = BranchName::new("feature/my-branch").expect("valid");
///     assert_eq!(name.as_str(), "feature/my-branch");
///     assert!(BranchName::new("--force").is_err());
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Creates a validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidBranchName`] when the value breaks
    /// any of the rules above.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        if Self::is_invalid_branch_name(normalized) {
            return Err(TaskDomainError::InvalidBranchName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Creates a branch name from a built-in literal that already satisfies
    /// the rules.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(
            !Self::is_invalid_branch_name(value),
            "invalid built-in branch name {value}"
        );
        Self(value.to_owned())
    }

    /// Returns the feature branch used for `task_id` (`task/<task-id>`).
    #[must_use]
    pub fn for_task(task_id: TaskId) -> Self {
        Self(format!("{TASK_BRANCH_PREFIX}{task_id}"))
    }

    fn is_invalid_branch_name(name: &str) -> bool {
        let is_empty = name.is_empty();
        let contains_forbidden_char = name.contains(':') || name.chars().any(char::is_whitespace);
        let contains_parent_ref = name.contains("..");
        let looks_like_option = name.starts_with('-');
        let exceeds_length_limit = name.len() > MAX_BRANCH_NAME_LENGTH;

        is_empty
            || contains_forbidden_char
            || contains_parent_ref
            || looks_like_option
            || exceeds_length_limit
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
