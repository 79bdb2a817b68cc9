//! Audit domain types.

mod event;
mod template;

pub use event::{AuditEvent, AuditEventKind};
pub use template::{NotificationTemplate, TemplateRenderError};
