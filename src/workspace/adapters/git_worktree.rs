//! Worktree manager backed by `git worktree`.

use super::DirectoryLayout;
use crate::merge::ports::GitOps;
use crate::task::domain::BranchName;
use crate::workspace::ports::{WorkspaceResult, WorktreeKey, WorktreeManager};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Creates worktrees beside the repository checkouts of a
/// [`DirectoryLayout`].
#[derive(Clone)]
pub struct GitWorktreeManager {
    layout: DirectoryLayout,
    git: Arc<dyn GitOps>,
}

impl GitWorktreeManager {
    /// Creates a manager.
    #[must_use]
    pub const fn new(layout: DirectoryLayout, git: Arc<dyn GitOps>) -> Self {
        Self { layout, git }
    }
}

#[async_trait]
impl WorktreeManager for GitWorktreeManager {
    fn path_for(&self, key: &WorktreeKey) -> Utf8PathBuf {
        self.layout.worktree_path_for(key)
    }

    async fn create(
        &self,
        key: &WorktreeKey,
        branch: &BranchName,
        start_point: &BranchName,
    ) -> WorkspaceResult<Utf8PathBuf> {
        let repo = self.layout.repository_path(&key.team, &key.repository);
        if let Some(existing) = self.git.worktree_for_branch(&repo, branch).await? {
            debug!(task = %key.task_id, path = %existing, "reusing worktree");
            return Ok(existing);
        }

        let path = self.path_for(key);
        let start = if self.git.branch_exists(&repo, branch).await? {
            None
        } else {
            Some(start_point)
        };
        self.git.add_worktree(&repo, &path, branch, start).await?;
        info!(
            task = %key.task_id,
            repository = %key.repository,
            branch = %branch,
            path = %path,
            "created worktree"
        );
        Ok(path)
    }

    async fn remove(&self, key: &WorktreeKey) -> WorkspaceResult<()> {
        let repo = self.layout.repository_path(&key.team, &key.repository);
        let branch = BranchName::for_task(key.task_id);
        if let Some(path) = self.git.worktree_for_branch(&repo, &branch).await? {
            self.git.remove_worktree(&repo, &path).await?;
            info!(
                task = %key.task_id,
                repository = %key.repository,
                path = %path,
                "removed worktree"
            );
        }
        self.git.prune_worktrees(&repo).await?;
        Ok(())
    }
}
