//! Unit tests for workflow compilation, registration and loading.
