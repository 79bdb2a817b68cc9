//! Merge pipeline services.

mod locks;
mod pipeline;

pub use locks::{RepositoryGuards, RepositoryLocks};
pub use pipeline::MergePipeline;
