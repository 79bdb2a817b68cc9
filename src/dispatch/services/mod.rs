//! The scheduling loop.

mod dispatcher;

pub use dispatcher::{DispatchError, DispatchPorts, DispatchResult, Dispatcher};
