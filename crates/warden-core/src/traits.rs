//! Core trait definitions for the warden execution pipeline.
//!
//! These three traits define the trust boundary:
//!
//! - `Oracle`: untrusted reasoning (a hosted model, a local model, or a heuristic)
//! - `SecurityGate`: trusted gate, consulted before any tool handler runs
//! - `ToolDispatcher`: trusted dispatch of a named tool call to its handler
//!
//! The agent loop only ever reaches a tool through `ToolDispatcher::execute`.
//! Implementations of that trait must consult a `SecurityGate` before invoking
//! a handler, so no proposed call can reach the operating system unchecked.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use warden_contracts::{
    error::WardenResult,
    oracle::{Arguments, OracleRequest, OracleResponse, ToolSpec},
};

/// The reasoning component that turns context into text and proposed calls.
///
/// Implementations are **untrusted**. The loop treats every proposed call as
/// an unvalidated request and every error as an `Oracle` error.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn respond(&self, request: OracleRequest) -> WardenResult<OracleResponse>;
}

/// The zero-trust gate evaluated before every tool dispatch.
///
/// Implementations are **trusted** and must be deterministic: the same call
/// against the same rule table always yields the same verdict. A rejection is
/// a `WardenError::Security` carrying the violation type.
pub trait SecurityGate: Send + Sync {
    fn check_tool_call(&self, tool_name: &str, arguments: &Arguments) -> WardenResult<()>;
}

/// What a successful dispatch hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub value: Value,
    /// Wall-clock time spent in the handler.
    pub duration_ms: u64,
}

impl ToolOutput {
    /// The value as observation text: strings verbatim, anything else as JSON.
    pub fn render(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Dispatches a named call to its registered handler.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Specs advertised to the oracle, in a stable order.
    fn tool_specs(&self) -> Vec<ToolSpec>;

    /// Registered tool names, in a stable order.
    fn tool_names(&self) -> Vec<String> {
        self.tool_specs().into_iter().map(|s| s.name).collect()
    }

    /// Look up, validate, gate, and run one call.
    ///
    /// Unknown names fail with `Tool { kind: UnknownTool }` before any
    /// security check runs.
    async fn execute(&self, name: &str, arguments: Arguments) -> WardenResult<ToolOutput>;
}
