//! In-memory worktree manager.

use super::DirectoryLayout;
use crate::task::domain::BranchName;
use crate::workspace::ports::{WorkspaceError, WorkspaceResult, WorktreeKey, WorktreeManager};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Tracks worktrees without touching the filesystem.
#[derive(Debug, Clone)]
pub struct InMemoryWorktreeManager {
    layout: DirectoryLayout,
    worktrees: Arc<RwLock<HashMap<WorktreeKey, BranchName>>>,
}

impl InMemoryWorktreeManager {
    /// Creates an empty manager whose paths follow `layout`.
    #[must_use]
    pub fn new(layout: DirectoryLayout) -> Self {
        Self {
            layout,
            worktrees: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the branch checked out for `key`, if a worktree exists.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the lock is poisoned.
    pub fn branch_for(&self, key: &WorktreeKey) -> WorkspaceResult<Option<BranchName>> {
        let guard = self
            .worktrees
            .read()
            .map_err(|err| WorkspaceError::io(std::io::Error::other(err.to_string())))?;
        Ok(guard.get(key).cloned())
    }

    /// Returns the number of live worktrees.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the lock is poisoned.
    pub fn worktree_count(&self) -> WorkspaceResult<usize> {
        let guard = self
            .worktrees
            .read()
            .map_err(|err| WorkspaceError::io(std::io::Error::other(err.to_string())))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl WorktreeManager for InMemoryWorktreeManager {
    fn path_for(&self, key: &WorktreeKey) -> Utf8PathBuf {
        self.layout.worktree_path_for(key)
    }

    async fn create(
        &self,
        key: &WorktreeKey,
        branch: &BranchName,
        _start_point: &BranchName,
    ) -> WorkspaceResult<Utf8PathBuf> {
        let mut guard = self
            .worktrees
            .write()
            .map_err(|err| WorkspaceError::io(std::io::Error::other(err.to_string())))?;
        guard
            .entry(key.clone())
            .or_insert_with(|| branch.clone());
        Ok(self.path_for(key))
    }

    async fn remove(&self, key: &WorktreeKey) -> WorkspaceResult<()> {
        let mut guard = self
            .worktrees
            .write()
            .map_err(|err| WorkspaceError::io(std::io::Error::other(err.to_string())))?;
        guard.remove(key);
        Ok(())
    }
}
