//! Declarative, versioned task workflows.
//!
//! A workflow is an ordered list of stage declarations compiled into an
//! immutable graph. Each stage names a behaviour from the closed
//! [`domain::StageKind`] whitelist instead of pointing at user code, and
//! every stage key is supplied by the author. The module follows the same
//! hexagonal layout as the rest of the crate:
//!
//! - Domain types and the compiler in [`domain`]
//! - The registry and built-in workflow in [`services`]
//! - TOML document loading in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
