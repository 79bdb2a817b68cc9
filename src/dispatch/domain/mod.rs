//! Domain types for agent dispatch.

mod agent;
mod error;
mod message;
mod turn;

pub use agent::{AgentRecord, AgentRole, AgentStatus};
pub use error::ParseAgentRoleError;
pub use message::{MailMessage, MessageBatch, MessageId, batch_messages};
pub use turn::{TickReport, TurnOutcome};
