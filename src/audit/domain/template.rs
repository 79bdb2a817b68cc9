//! Notification bodies rendered with `minijinja`.

use minijinja::Environment;
use serde_json::{Map, Value};
use thiserror::Error;

const MERGE_FAILED: &str = concat!(
    "Task {{ task_id }} ({{ title }}) could not be merged",
    "{% if attempts %} after {{ attempts }} attempt(s){% endif %}: {{ reason }}. ",
    "It is waiting in '{{ stage }}' for you to take over.",
);

const ACTION_FAILED: &str = concat!(
    "Task {{ task_id }} ({{ title }}) hit a fault while moving from '{{ from }}' ",
    "to '{{ to }}': {{ reason }}. It was moved to '{{ stage }}' and assigned to you.",
);

/// Built-in notification templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    /// The merge pipeline gave up on a task.
    MergeFailed,
    /// A hook fault forced a task into the error stage.
    ActionFailed,
}

impl NotificationTemplate {
    /// Returns the template name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MergeFailed => "merge_failed",
            Self::ActionFailed => "action_failed",
        }
    }

    const fn source(self) -> &'static str {
        match self {
            Self::MergeFailed => MERGE_FAILED,
            Self::ActionFailed => ACTION_FAILED,
        }
    }

    /// Renders the template with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateRenderError`] when rendering fails.
    pub fn render(self, context: &Map<String, Value>) -> Result<String, TemplateRenderError> {
        Environment::new()
            .render_str(self.source(), context)
            .map_err(|error| TemplateRenderError {
                template: self.name(),
                reason: error.to_string(),
            })
    }
}

/// Error returned when a notification template cannot be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to render notification template '{template}': {reason}")]
pub struct TemplateRenderError {
    /// Template name.
    pub template: &'static str,
    /// Renderer message.
    pub reason: String,
}
