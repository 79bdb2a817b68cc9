//! Transition engine service.

mod transition;

pub use transition::TransitionEngine;
