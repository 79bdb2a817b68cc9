//! Versioned, append-only workflow registry.

use crate::workflow::domain::{
    StageDefinition, WorkflowDef, WorkflowName, WorkflowRef, WorkflowValidationError,
    WorkflowVersion,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

type VersionMap = BTreeMap<WorkflowVersion, Arc<WorkflowDef>>;

/// Registry of compiled workflows owned by one coordinator.
///
/// Clones share the same underlying state. Registered definitions are never
/// replaced; lookups return the exact graph a task was pinned to.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: Arc<RwLock<HashMap<WorkflowName, VersionMap>>>,
}

impl WorkflowRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and registers a new workflow version.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowValidationError::VersionNotIncreasing`] when
    /// `version` is not strictly greater than the latest registered version
    /// for `name`, or any compilation error from [`WorkflowDef::compile`].
    pub fn register(
        &self,
        name: WorkflowName,
        version: WorkflowVersion,
        stages: &[StageDefinition],
    ) -> Result<Arc<WorkflowDef>, WorkflowValidationError> {
        let mut workflows = self
            .workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let latest = workflows
            .get(&name)
            .and_then(|versions| versions.keys().next_back().copied());
        if let Some(latest_version) = latest.filter(|latest_version| version <= *latest_version) {
            return Err(WorkflowValidationError::VersionNotIncreasing {
                name,
                version,
                latest: latest_version,
            });
        }

        let compiled = Arc::new(WorkflowDef::compile(name.clone(), version, stages)?);
        info!(workflow = %name, version = %version, "registered workflow");
        workflows
            .entry(name)
            .or_default()
            .insert(version, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Registers a workflow version unless an identical one already exists.
    ///
    /// Re-applying a document that compiles to the same digest returns the
    /// registered definition unchanged, which lets a restarted coordinator
    /// reload its workflow directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowValidationError::ConflictingDefinition`] when the
    /// version exists with a different digest, otherwise the same errors as
    /// [`WorkflowRegistry::register`].
    pub fn ensure_registered(
        &self,
        name: WorkflowName,
        version: WorkflowVersion,
        stages: &[StageDefinition],
    ) -> Result<Arc<WorkflowDef>, WorkflowValidationError> {
        if let Some(existing) = self.load(&name, version) {
            let candidate = WorkflowDef::compile(name.clone(), version, stages)?;
            if candidate.digest() == existing.digest() {
                return Ok(existing);
            }
            return Err(WorkflowValidationError::ConflictingDefinition { name, version });
        }
        self.register(name, version, stages)
    }

    /// Returns the exact registered version, if any.
    #[must_use]
    pub fn load(&self, name: &WorkflowName, version: WorkflowVersion) -> Option<Arc<WorkflowDef>> {
        let workflows = self
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        workflows
            .get(name)
            .and_then(|versions| versions.get(&version))
            .cloned()
    }

    /// Resolves a task's pinned workflow reference.
    #[must_use]
    pub fn resolve(&self, workflow: &WorkflowRef) -> Option<Arc<WorkflowDef>> {
        self.load(workflow.name(), workflow.version())
    }

    /// Returns the highest registered version of `name`.
    #[must_use]
    pub fn latest(&self, name: &WorkflowName) -> Option<Arc<WorkflowDef>> {
        let workflows = self
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        workflows
            .get(name)
            .and_then(|versions| versions.values().next_back())
            .cloned()
    }

    /// Returns all registered versions of `name` in ascending order.
    #[must_use]
    pub fn versions(&self, name: &WorkflowName) -> Vec<WorkflowVersion> {
        let workflows = self
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        workflows
            .get(name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }
}
