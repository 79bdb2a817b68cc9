//! Tests for the transition engine and the built-in hooks.

pub(crate) mod support;
mod transition_tests;
