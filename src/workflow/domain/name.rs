//! Workflow identity value objects.

use super::WorkflowValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a workflow name.
const MAX_WORKFLOW_NAME_LENGTH: usize = 64;

/// Validated workflow name.
///
/// Names are lowercase ASCII letters, digits, `-` and `_`.
///
/// # Examples
///
///     use atelier::workflow::domain::WorkflowName;
///
///     let name = WorkflowName::new("standard").expect("valid");
///     assert_eq!(name.as_str(), "standard");
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowName(String);

impl WorkflowName {
    /// Creates a validated workflow name.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowValidationError::InvalidWorkflowName`] when the value
    /// is empty, too long, or contains unsupported characters.
    pub fn new(value: impl Into<String>) -> Result<Self, WorkflowValidationError> {
        let raw = value.into();
        let normalized = raw.trim();
        let is_valid = !normalized.is_empty()
            && normalized.len() <= MAX_WORKFLOW_NAME_LENGTH
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(WorkflowValidationError::InvalidWorkflowName(raw));
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowName {
    type Error = WorkflowValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowName> for String {
    fn from(value: WorkflowName) -> Self {
        value.0
    }
}

impl fmt::Display for WorkflowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow version number, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct WorkflowVersion(u32);

impl WorkflowVersion {
    /// Creates a validated version.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowValidationError::InvalidVersion`] for zero.
    pub const fn new(value: u32) -> Result<Self, WorkflowValidationError> {
        if value == 0 {
            return Err(WorkflowValidationError::InvalidVersion(value));
        }
        Ok(Self(value))
    }

    /// Returns the numeric version.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for WorkflowVersion {
    type Error = WorkflowValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowVersion> for u32 {
    fn from(value: WorkflowVersion) -> Self {
        value.0
    }
}

impl fmt::Display for WorkflowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The (name, version) pair a task is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowRef {
    name: WorkflowName,
    version: WorkflowVersion,
}

impl WorkflowRef {
    /// Creates a workflow reference.
    #[must_use]
    pub const fn new(name: WorkflowName, version: WorkflowVersion) -> Self {
        Self { name, version }
    }

    /// Returns the workflow name.
    #[must_use]
    pub const fn name(&self) -> &WorkflowName {
        &self.name
    }

    /// Returns the pinned version.
    #[must_use]
    pub const fn version(&self) -> WorkflowVersion {
        self.version
    }
}

impl fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}
