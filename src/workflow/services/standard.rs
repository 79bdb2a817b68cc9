//! Built-in team workflow.

use super::WorkflowRegistry;
use crate::workflow::domain::{
    StageDefinition, StageKey, StageKind, WorkflowDef, WorkflowName, WorkflowValidationError,
    WorkflowVersion,
};
use std::sync::Arc;

/// Name under which the built-in workflow is registered.
pub const STANDARD_WORKFLOW: &str = "standard";

fn key(raw: &'static str) -> StageKey {
    StageKey::from_static(raw)
}

fn keys<const N: usize>(raw: [&'static str; N]) -> impl Iterator<Item = StageKey> {
    raw.into_iter().map(key)
}

/// Returns the stage list of the built-in workflow.
///
/// `todo → in_progress → in_review → merging (auto) → merged`, with
/// `merge_failed` and `error` as recovery stages and `cancelled` reachable
/// from every active stage.
#[must_use]
pub fn standard_stages() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new(key("todo"), "To do", StageKind::Manual)
            .with_transitions(keys(["in_progress", "cancelled"])),
        StageDefinition::new(key("in_progress"), "In progress", StageKind::Implementation)
            .with_transitions(keys(["in_review", "cancelled"])),
        StageDefinition::new(key("in_review"), "In review", StageKind::Review)
            .with_transitions(keys(["merging", "in_progress", "cancelled"])),
        StageDefinition::new(key("merging"), "Merging", StageKind::Merge)
            .auto()
            .with_transitions(keys(["merged", "merge_failed", "in_progress", "cancelled"])),
        StageDefinition::new(key("merged"), "Merged", StageKind::Merged).terminal(),
        StageDefinition::new(key("merge_failed"), "Merge failed", StageKind::MergeFailed)
            .with_transitions(keys(["in_progress", "merging", "cancelled"])),
        StageDefinition::new(key("cancelled"), "Cancelled", StageKind::Cancelled).terminal(),
        StageDefinition::new(key("error"), "Error", StageKind::Error)
            .with_transitions(keys(["todo", "in_progress", "in_review", "cancelled"])),
    ]
}

/// Registers the built-in workflow at `version`.
///
/// Registering a version that already holds the built-in stages is a
/// no-op.
///
/// # Errors
///
/// Returns [`WorkflowValidationError`] when `version` already holds a
/// different definition or is not above the latest registered version.
pub fn register_standard(
    registry: &WorkflowRegistry,
    version: WorkflowVersion,
) -> Result<Arc<WorkflowDef>, WorkflowValidationError> {
    let name = WorkflowName::new(STANDARD_WORKFLOW)?;
    registry.ensure_registered(name, version, &standard_stages())
}
