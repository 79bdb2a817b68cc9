//! Error types for dispatch domain parsing.

use thiserror::Error;

/// Error returned while parsing agent roles from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent role: {0}")]
pub struct ParseAgentRoleError(pub String);
