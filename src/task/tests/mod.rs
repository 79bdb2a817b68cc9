//! Unit tests for the task domain, repository and lifecycle service.
