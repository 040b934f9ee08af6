//! Agent loop and its collaborators.

pub mod approval;
pub mod checkpoint;
pub mod events;
mod runner;

pub use approval::{ApprovalHandler, ApprovalRequest, AutoApprove};
pub use checkpoint::{CheckpointStore, NoCheckpoints};
pub use events::{AgentEvent, EventSink};
pub use runner::{Agent, TurnOutcome};
