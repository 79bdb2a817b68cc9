//! Unit tests for directory layout and worktree managers.
