//! On-disk layout of repositories and worktrees.

use crate::task::domain::{RepoName, TaskId, TeamName};
use crate::workspace::ports::{RepositoryResolver, WorktreeKey};
use camino::{Utf8Path, Utf8PathBuf};

const REPOS_DIR: &str = "repos";
const WORKTREES_DIR: &str = "worktrees";

/// Resolves paths beneath a single root directory:
///
/// ```text
/// <root>/<team>/repos/<repository>
/// <root>/<team>/worktrees/<repository>/<task-id>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    root: Utf8PathBuf,
}

impl DirectoryLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub const fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the checkout path of a team's repository.
    #[must_use]
    pub fn repository_path(&self, team: &TeamName, repository: &RepoName) -> Utf8PathBuf {
        self.root
            .join(team.as_str())
            .join(REPOS_DIR)
            .join(repository.as_str())
    }

    /// Returns the worktree path for a task.
    #[must_use]
    pub fn worktree_path(
        &self,
        team: &TeamName,
        repository: &RepoName,
        task_id: TaskId,
    ) -> Utf8PathBuf {
        self.root
            .join(team.as_str())
            .join(WORKTREES_DIR)
            .join(repository.as_str())
            .join(task_id.to_string())
    }

    pub(crate) fn worktree_path_for(&self, key: &WorktreeKey) -> Utf8PathBuf {
        self.worktree_path(&key.team, &key.repository, key.task_id)
    }
}

impl RepositoryResolver for DirectoryLayout {
    fn resolve_path(&self, team: &TeamName, repository: &RepoName) -> Utf8PathBuf {
        self.repository_path(team, repository)
    }
}
