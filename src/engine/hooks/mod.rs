//! The stage hook contract and the built-in behaviours.
//!
//! Stages never point at user code. A workflow names a [`StageKind`] and
//! the [`HookSet`] maps each kind to one implementation of
//! [`StageHooks`].

mod assignment;
mod cleanup;
mod context;
mod escalation;
mod implementation;
mod merge;
mod review;

pub use cleanup::CleanupHooks;
pub use context::{StageContext, StageServices};
pub use escalation::{ErrorHooks, MergeFailedHooks};
pub use implementation::ImplementationHooks;
pub use merge::{MERGE_FAILURE_METADATA_KEY, MergeHooks};
pub use review::{NO_NEW_COMMITS, ReviewHooks};

pub(crate) use context::PendingEscalation;
pub(crate) use escalation::render_notification;

use crate::engine::domain::HookResult;
use crate::task::domain::AgentName;
use crate::workflow::domain::{StageKey, StageKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Behaviour attached to a stage kind.
///
/// Every hook is optional; the defaults do nothing.
#[async_trait]
pub trait StageHooks: Send + Sync {
    /// Runs before the task is recorded in the stage.
    ///
    /// # Errors
    ///
    /// [`crate::engine::domain::HookError::Gate`] blocks the transition;
    /// [`crate::engine::domain::HookError::Action`] routes the task to the
    /// error stage.
    async fn enter(&self, _ctx: &mut StageContext<'_>) -> HookResult<()> {
        Ok(())
    }

    /// Runs when the task leaves the stage. Failures are logged and the
    /// transition continues.
    ///
    /// # Errors
    ///
    /// Returns [`crate::engine::domain::HookError`] when cleanup fails.
    async fn exit(&self, _ctx: &mut StageContext<'_>) -> HookResult<()> {
        Ok(())
    }

    /// Picks the assignee once `enter` succeeded; `None` keeps the current
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::engine::domain::HookError`] when candidates cannot
    /// be looked up.
    async fn assign(&self, _ctx: &mut StageContext<'_>) -> HookResult<Option<AgentName>> {
        Ok(None)
    }

    /// Drives an auto stage. Returning a stage key requests a move there
    /// (the current key keeps the task in place); `None` retries on a
    /// later tick.
    ///
    /// # Errors
    ///
    /// Returns [`crate::engine::domain::HookError`] when the action fails.
    async fn action(&self, _ctx: &mut StageContext<'_>) -> HookResult<Option<StageKey>> {
        Ok(None)
    }
}

/// Hooks for stages that wait on an explicit transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualHooks;

#[async_trait]
impl StageHooks for ManualHooks {}

/// Whitelist mapping stage kinds to their hooks.
#[derive(Clone)]
pub struct HookSet {
    hooks: HashMap<StageKind, Arc<dyn StageHooks>>,
}

impl HookSet {
    /// Returns the built-in behaviour for every kind.
    #[must_use]
    pub fn standard() -> Self {
        let cleanup: Arc<dyn StageHooks> = Arc::new(CleanupHooks);
        let hooks = HashMap::from([
            (StageKind::Manual, Arc::new(ManualHooks) as Arc<dyn StageHooks>),
            (StageKind::Implementation, Arc::new(ImplementationHooks)),
            (StageKind::Review, Arc::new(ReviewHooks)),
            (StageKind::Merge, Arc::new(MergeHooks)),
            (StageKind::Merged, Arc::clone(&cleanup)),
            (StageKind::MergeFailed, Arc::new(MergeFailedHooks)),
            (StageKind::Cancelled, cleanup),
            (StageKind::Error, Arc::new(ErrorHooks)),
        ]);
        Self { hooks }
    }

    /// Replaces the behaviour of `kind`.
    #[must_use]
    pub fn with_hooks(mut self, kind: StageKind, hooks: Arc<dyn StageHooks>) -> Self {
        self.hooks.insert(kind, hooks);
        self
    }

    /// Returns the hooks for `kind`.
    #[must_use]
    pub fn hooks_for(&self, kind: StageKind) -> Arc<dyn StageHooks> {
        self.hooks
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(ManualHooks))
    }
}

impl Default for HookSet {
    fn default() -> Self {
        Self::standard()
    }
}
