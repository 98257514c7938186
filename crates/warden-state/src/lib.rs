//! # warden-state
//!
//! The conversation and task state machine for one agent session.
//!
//! `AgentState` is the single unit of persistence: it is serialized as one
//! JSON document by [`StateStore`]. It performs no I/O itself.

pub mod message;
pub mod state;
pub mod store;
pub mod task;

pub use message::{Message, ToolCall};
pub use state::AgentState;
pub use store::StateStore;
pub use task::{TaskContext, TaskStatus};
