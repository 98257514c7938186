//! Hand-written mocks shared by the loop and host tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map};

use warden_contracts::{
    error::{ToolErrorKind, ViolationType, WardenError, WardenResult},
    oracle::{Arguments, OracleRequest, OracleResponse, ProposedCall, ToolSpec},
};

use crate::agent_loop::LoopConfig;
use crate::recovery::RecoveryPolicy;
use crate::traits::{Oracle, ToolDispatcher, ToolOutput};

pub fn test_config() -> LoopConfig {
    LoopConfig {
        max_iterations: 10,
        task_timeout: Duration::from_secs(60),
        context_window: 20,
        recovery: RecoveryPolicy::new(3, Duration::ZERO),
    }
}

pub fn call(name: &str) -> ProposedCall {
    ProposedCall {
        id: format!("call-{}", name),
        name: name.to_string(),
        input: Map::new(),
    }
}

pub fn with_calls(text: &str, calls: Vec<ProposedCall>) -> OracleResponse {
    OracleResponse {
        text_content: text.to_string(),
        tool_calls: calls,
        is_complete: false,
    }
}

/// An oracle that replays a fixed script, then answers "still working".
pub struct ScriptedOracle {
    script: Mutex<VecDeque<WardenResult<OracleResponse>>>,
    pub requests: Arc<Mutex<Vec<OracleRequest>>>,
    delay: Duration,
}

impl ScriptedOracle {
    pub fn new(script: Vec<WardenResult<OracleResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Arc::new(Mutex::new(vec![])),
            delay: Duration::ZERO,
        }
    }

    /// Never completes.
    pub fn endless() -> Self {
        Self::new(vec![])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn respond(&self, request: OracleRequest) -> WardenResult<OracleResponse> {
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(OracleResponse::text("still working", false)))
    }
}

/// A dispatcher that knows a fixed set of tools and records every call.
pub struct RecordingDispatcher {
    known: Vec<&'static str>,
    /// Names rejected with a security violation.
    rejected: Vec<&'static str>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingDispatcher {
    pub fn new(known: Vec<&'static str>) -> Self {
        Self {
            known,
            rejected: vec![],
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn rejecting(mut self, name: &'static str) -> Self {
        self.rejected.push(name);
        self
    }
}

#[async_trait]
impl ToolDispatcher for RecordingDispatcher {
    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.known
            .iter()
            .map(|name| ToolSpec {
                name: name.to_string(),
                description: format!("mock {}", name),
                input_schema: json!({ "type": "object", "properties": {} }),
            })
            .collect()
    }

    async fn execute(&self, name: &str, _arguments: Arguments) -> WardenResult<ToolOutput> {
        self.calls.lock().unwrap().push(name.to_string());
        if !self.known.iter().any(|k| *k == name) {
            return Err(WardenError::Tool {
                tool_name: name.to_string(),
                kind: ToolErrorKind::UnknownTool,
                message: "no tool registered under this name".to_string(),
                elapsed_ms: None,
            });
        }
        if self.rejected.iter().any(|k| *k == name) {
            return Err(WardenError::security(
                ViolationType::ForbiddenPattern,
                "command contains forbidden pattern",
                name,
            ));
        }
        Ok(ToolOutput {
            value: json!(format!("ran {}", name)),
            duration_ms: 0,
        })
    }
}
