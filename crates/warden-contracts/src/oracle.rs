//! Reasoning oracle request and response types.
//!
//! The oracle is the untrusted component that turns conversation context into
//! text and proposed tool calls. The runtime never inspects how it reasons;
//! it only consumes these shapes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool arguments as passed to handlers: a JSON object.
pub type Arguments = Map<String, Value>;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

/// One entry in the message list handed to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A tool as advertised to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema-like object describing accepted arguments.
    pub input_schema: Value,
}

/// Everything the oracle receives for one iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleRequest {
    /// System context first, then the most recent conversation window.
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// A tool call the oracle wants executed. Untrusted until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: Arguments,
}

/// The oracle's answer for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    #[serde(default)]
    pub text_content: String,
    /// Executed strictly in order.
    #[serde(default)]
    pub tool_calls: Vec<ProposedCall>,
    #[serde(default)]
    pub is_complete: bool,
}

impl OracleResponse {
    /// A text-only response.
    pub fn text(content: impl Into<String>, is_complete: bool) -> Self {
        Self {
            text_content: content.into(),
            tool_calls: Vec::new(),
            is_complete,
        }
    }
}
