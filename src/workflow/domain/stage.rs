//! Stage keys, behaviour kinds and stage definitions.

use super::{ParseStageKindError, WorkflowValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a stage key.
const MAX_STAGE_KEY_LENGTH: usize = 64;

/// Stable, author-supplied stage identifier.
///
/// Keys are never inferred from anything else; they are lowercase ASCII
/// letters, digits and `_`.
///
/// # Examples
///
///     use atelier::workflow::domain::StageKey;
///
///     let key = StageKey::new("in_review").expect("valid");
///     assert_eq!(key.as_str(), "in_review");
///     assert!(StageKey::new("InReview").is_err());
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageKey(String);

impl StageKey {
    /// Creates a validated stage key.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowValidationError::InvalidStageKey`] when the value is
    /// empty, too long, or contains anything but `[a-z0-9_]`.
    pub fn new(value: impl Into<String>) -> Result<Self, WorkflowValidationError> {
        let raw = value.into();
        let is_valid = !raw.is_empty()
            && raw.len() <= MAX_STAGE_KEY_LENGTH
            && raw
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
        if !is_valid {
            return Err(WorkflowValidationError::InvalidStageKey(raw));
        }
        Ok(Self(raw))
    }

    /// Creates a key from a built-in literal that already satisfies the rules.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid built-in stage key {value}");
        Self(value.to_owned())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StageKey {
    type Error = WorkflowValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StageKey> for String {
    fn from(value: StageKey) -> Self {
        value.0
    }
}

impl AsRef<str> for StageKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of stage behaviours.
///
/// Each kind selects one built-in hook implementation; workflow documents
/// may only name kinds from this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// No hooks; the task waits for an explicit transition.
    Manual,
    /// Active implementation work inside per-task worktrees.
    Implementation,
    /// Review of the committed work.
    Review,
    /// Automated merge pipeline.
    Merge,
    /// Work has been merged.
    Merged,
    /// The merge pipeline gave up and a human was notified.
    MergeFailed,
    /// Work was abandoned.
    Cancelled,
    /// A hook fault forced the task out of its lifecycle.
    Error,
}

impl StageKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Manual,
        Self::Implementation,
        Self::Review,
        Self::Merge,
        Self::Merged,
        Self::MergeFailed,
        Self::Cancelled,
        Self::Error,
    ];

    /// Returns the canonical document representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Implementation => "implementation",
            Self::Review => "review",
            Self::Merge => "merge",
            Self::Merged => "merged",
            Self::MergeFailed => "merge_failed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    /// Returns `true` when the kind implements an `action` hook.
    #[must_use]
    pub const fn has_action(self) -> bool {
        matches!(self, Self::Merge)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StageKind {
    type Error = ParseStageKindError;

    fn try_from(value: &str) -> Result<Self, ParseStageKindError> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseStageKindError(value.to_owned()))
    }
}

/// Author-supplied stage declaration, prior to compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stable stage key.
    pub key: StageKey,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Behaviour selected for this stage.
    #[serde(default = "default_kind")]
    pub kind: StageKind,
    /// Whether this stage ends the lifecycle.
    #[serde(default)]
    pub terminal: bool,
    /// Whether the scheduler drives this stage through its `action` hook.
    #[serde(default)]
    pub auto: bool,
    /// Explicit transitions; `None` requests the synthesized defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Vec<StageKey>>,
}

const fn default_kind() -> StageKind {
    StageKind::Manual
}

impl StageDefinition {
    /// Creates a non-terminal, non-auto stage with default transitions.
    #[must_use]
    pub fn new(key: StageKey, label: impl Into<String>, kind: StageKind) -> Self {
        Self {
            key,
            label: label.into(),
            kind,
            terminal: false,
            auto: false,
            transitions: None,
        }
    }

    /// Marks the stage terminal.
    #[must_use]
    pub const fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Marks the stage as scheduler-driven.
    #[must_use]
    pub const fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Declares explicit transitions.
    #[must_use]
    pub fn with_transitions(mut self, targets: impl IntoIterator<Item = StageKey>) -> Self {
        self.transitions = Some(targets.into_iter().collect());
        self
    }
}

/// A compiled stage node inside a [`super::WorkflowDef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    key: StageKey,
    label: String,
    kind: StageKind,
    terminal: bool,
    auto: bool,
}

impl Stage {
    pub(crate) fn from_definition(definition: &StageDefinition) -> Self {
        Self {
            key: definition.key.clone(),
            label: definition.label.trim().to_owned(),
            kind: definition.kind,
            terminal: definition.terminal,
            auto: definition.auto,
        }
    }

    /// Returns the stage key.
    #[must_use]
    pub const fn key(&self) -> &StageKey {
        &self.key
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the behaviour kind.
    #[must_use]
    pub const fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns `true` for terminal stages.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Returns `true` for scheduler-driven stages.
    #[must_use]
    pub const fn is_auto(&self) -> bool {
        self.auto
    }
}
