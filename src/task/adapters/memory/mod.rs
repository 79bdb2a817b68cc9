//! In-memory adapters for tests and single-process coordinators.

mod task;

pub use task::InMemoryTaskRepository;
