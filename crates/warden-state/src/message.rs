//! Conversation message and tool-call records.
//!
//! Both are append-only from the runtime's point of view: once pushed into
//! `AgentState::messages` they are never edited, except that tool calls are
//! attached to the trailing assistant message while it is still the last one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_contracts::oracle::{Arguments, Role};

/// One executed (or attempted) tool invocation.
///
/// After execution exactly one of `result` / `error` is set and
/// `duration_ms` holds the measured wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Arguments,
    pub timestamp: DateTime<Utc>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl ToolCall {
    pub fn new(
        tool_name: impl Into<String>,
        arguments: Arguments,
        result: Option<String>,
        error: Option<String>,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            arguments,
            timestamp: Utc::now(),
            result,
            error,
            duration_ms,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Message {
    pub(crate) fn new(
        role: Role,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls,
            metadata,
        }
    }
}
