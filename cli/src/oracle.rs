//! A deterministic keyword oracle.
//!
//! Proposes at most one action for a prompt, then reports completion once
//! an observation for that action is in the context. Stands in for a model
//! client so the runtime can be driven end to end offline.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use warden_contracts::{
    error::WardenResult,
    oracle::{OracleRequest, OracleResponse, ProposedCall, Role},
};
use warden_core::traits::Oracle;

/// Longest observation excerpt repeated in the final answer.
const SUMMARY_CHARS: usize = 500;

#[derive(Debug, Default)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Oracle for HeuristicOracle {
    async fn respond(&self, request: OracleRequest) -> WardenResult<OracleResponse> {
        let Some(prompt_at) = request.messages.iter().rposition(|m| m.role == Role::User) else {
            return Ok(OracleResponse::text("Nothing to do. TASK_COMPLETE", true));
        };

        let observation = request.messages[prompt_at + 1..]
            .iter()
            .rev()
            .find(|m| m.role == Role::Tool);
        if let Some(observation) = observation {
            let summary: String = observation.content.chars().take(SUMMARY_CHARS).collect();
            return Ok(OracleResponse::text(format!("Task complete.\n{}", summary), true));
        }

        let prompt = request.messages[prompt_at].content.trim();
        let advertised = |name: &str| request.tools.iter().any(|t| t.name == name);

        match plan(prompt) {
            Some((tool, input)) if advertised(tool) => Ok(OracleResponse {
                text_content: format!("Calling {}.", tool),
                tool_calls: vec![ProposedCall {
                    id: "call_0".to_string(),
                    name: tool.to_string(),
                    input,
                }],
                is_complete: false,
            }),
            _ => Ok(OracleResponse::text(
                "I can list files, read a file, or run a command. TASK_COMPLETE",
                true,
            )),
        }
    }
}

/// The single tool call a prompt asks for, if any.
fn plan(prompt: &str) -> Option<(&'static str, Map<String, Value>)> {
    let lower = prompt.to_lowercase();

    if lower.contains("list files") || lower.contains("list the files") {
        return Some(("shell_exec", object(json!({ "command": "ls -la" }))));
    }
    if let Some(rest) = after_keyword(prompt, &lower, "read ") {
        let path = rest.split_whitespace().last()?;
        return Some(("file_read", object(json!({ "path": path }))));
    }
    if let Some(rest) = after_keyword(prompt, &lower, "run ") {
        let command = rest.trim();
        if !command.is_empty() {
            return Some(("shell_exec", object(json!({ "command": command }))));
        }
    }
    None
}

/// Text of `original` after the first occurrence of `keyword` in `lower`.
///
/// Byte offsets line up because `keyword` is ASCII and lowercasing an
/// ASCII-only prefix keeps its length; otherwise the match is skipped.
fn after_keyword<'a>(original: &'a str, lower: &str, keyword: &str) -> Option<&'a str> {
    let at = lower.find(keyword)?;
    if original.len() != lower.len() {
        return None;
    }
    original.get(at + keyword.len()..)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use warden_contracts::oracle::{ChatMessage, ToolSpec};

    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    fn request(messages: Vec<ChatMessage>) -> OracleRequest {
        OracleRequest {
            messages,
            tools: vec![spec("shell_exec"), spec("file_read")],
        }
    }

    #[tokio::test]
    async fn list_files_runs_ls() {
        let response = HeuristicOracle::new()
            .respond(request(vec![
                ChatMessage::new(Role::System, "instructions"),
                ChatMessage::new(Role::User, "Please list files here"),
            ]))
            .await
            .unwrap();
        assert!(!response.is_complete);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "shell_exec");
        assert_eq!(response.tool_calls[0].input["command"], json!("ls -la"));
    }

    #[tokio::test]
    async fn read_and_run_are_extracted() {
        let oracle = HeuristicOracle::new();
        let read = oracle
            .respond(request(vec![ChatMessage::new(Role::User, "read notes/todo.txt")]))
            .await
            .unwrap();
        assert_eq!(read.tool_calls[0].name, "file_read");
        assert_eq!(read.tool_calls[0].input["path"], json!("notes/todo.txt"));

        let run = oracle
            .respond(request(vec![ChatMessage::new(Role::User, "Run git status")]))
            .await
            .unwrap();
        assert_eq!(run.tool_calls[0].input["command"], json!("git status"));
    }

    #[tokio::test]
    async fn completes_after_observation() {
        let response = HeuristicOracle::new()
            .respond(request(vec![
                ChatMessage::new(Role::User, "list files"),
                ChatMessage::new(Role::Assistant, "Calling shell_exec."),
                ChatMessage::new(Role::Tool, "Tool shell_exec succeeded: a.txt"),
            ]))
            .await
            .unwrap();
        assert!(response.is_complete);
        assert!(response.tool_calls.is_empty());
        assert!(response.text_content.contains("a.txt"));
    }

    #[tokio::test]
    async fn unknown_prompt_answers_directly() {
        let response = HeuristicOracle::new()
            .respond(request(vec![ChatMessage::new(Role::User, "what is the weather")]))
            .await
            .unwrap();
        assert!(response.is_complete);
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn unadvertised_tool_is_not_proposed() {
        let response = HeuristicOracle::new()
            .respond(OracleRequest {
                messages: vec![ChatMessage::new(Role::User, "list files")],
                tools: vec![],
            })
            .await
            .unwrap();
        assert!(response.is_complete);
        assert!(response.tool_calls.is_empty());
    }
}
