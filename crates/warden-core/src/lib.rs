//! # warden-core
//!
//! The bounded, policy-gated agent runtime.
//!
//! This crate provides:
//! - The trust-boundary traits (`Oracle`, `SecurityGate`, `ToolDispatcher`)
//! - The `RecoveryPolicy` that decides retry, degrade, or abort
//! - The `AgentLoop` that drives one task to a terminal state
//! - The `AgentHost` that owns state and serializes task execution
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{AgentLoop, LoopConfig, traits::{Oracle, ToolDispatcher}};
//!
//! let agent_loop = AgentLoop::new(oracle, registry, LoopConfig::from_config(&config));
//! let outcome = agent_loop.execute_task("list files", &mut state, None).await;
//! ```

pub mod agent_loop;
pub mod host;
pub mod recovery;
pub mod traits;

#[cfg(test)]
mod testing;

pub use agent_loop::{AgentLoop, LoopConfig};
pub use host::{AgentHost, AgentStatus, ShutdownReport};
pub use recovery::{RecoveryAction, RecoveryPolicy};
pub use traits::{Oracle, SecurityGate, ToolDispatcher, ToolOutput};
