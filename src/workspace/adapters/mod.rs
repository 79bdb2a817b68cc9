//! Adapter implementations of the workspace ports.

mod git_worktree;
mod layout;
pub mod memory;

pub use git_worktree::GitWorktreeManager;
pub use layout::DirectoryLayout;
