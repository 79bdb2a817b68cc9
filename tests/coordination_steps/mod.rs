//! Step definitions for coordination scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
