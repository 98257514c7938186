//! The per-session aggregate: conversation, current task, archived tasks, and
//! counters.
//!
//! Every mutation goes through a method on [`AgentState`]; fields are private
//! so the counter invariants cannot be broken from outside. The conversation
//! and task history only grow (except for an explicit `clear_conversation`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use warden_contracts::oracle::{Arguments, Role};
use warden_contracts::{WardenError, WardenResult};

use crate::message::{Message, ToolCall};
use crate::task::{TaskContext, TaskStatus};

/// Length of the prompt prefix used in a task's description.
const DESCRIPTION_PROMPT_CHARS: usize = 100;

/// Top-level keys a persisted state document must carry.
const REQUIRED_KEYS: &[&str] = &[
    "session_id",
    "agent_name",
    "agent_version",
    "created_at",
    "last_activity",
    "messages",
    "task_history",
    "working_directory",
    "environment_variables",
    "global_context",
    "total_iterations",
    "total_tool_calls",
    "total_errors",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    session_id: String,
    agent_name: String,
    agent_version: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,

    messages: Vec<Message>,
    current_task: Option<TaskContext>,
    task_history: Vec<TaskContext>,

    working_directory: String,
    environment_variables: BTreeMap<String, String>,
    global_context: Map<String, Value>,

    total_iterations: u64,
    total_tool_calls: u64,
    total_errors: u64,
    /// Calls and errors recorded while no task was current. Together with
    /// the per-task counters they sum to the session totals.
    #[serde(default)]
    unattributed_tool_calls: u64,
    #[serde(default)]
    unattributed_errors: u64,
}

impl AgentState {
    /// A fresh session with no messages and no task.
    pub fn new(
        agent_name: impl Into<String>,
        agent_version: impl Into<String>,
        working_directory: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            agent_name: agent_name.into(),
            agent_version: agent_version.into(),
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
            current_task: None,
            task_history: Vec::new(),
            working_directory: working_directory.into(),
            environment_variables: BTreeMap::new(),
            global_context: Map::new(),
            total_iterations: 0,
            total_tool_calls: 0,
            total_errors: 0,
            unattributed_tool_calls: 0,
            unattributed_errors: 0,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn agent_version(&self) -> &str {
        &self.agent_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_task(&self) -> Option<&TaskContext> {
        self.current_task.as_ref()
    }

    pub fn task_history(&self) -> &[TaskContext] {
        &self.task_history
    }

    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    pub fn environment_variables(&self) -> &BTreeMap<String, String> {
        &self.environment_variables
    }

    pub fn global_context(&self) -> &Map<String, Value> {
        &self.global_context
    }

    pub fn total_iterations(&self) -> u64 {
        self.total_iterations
    }

    pub fn total_tool_calls(&self) -> u64 {
        self.total_tool_calls
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    /// Tool calls recorded while no task was current.
    pub fn unattributed_tool_calls(&self) -> u64 {
        self.unattributed_tool_calls
    }

    /// Errors recorded while no task was current.
    pub fn unattributed_errors(&self) -> u64 {
        self.unattributed_errors
    }

    /// The most recent `max_messages` messages, oldest first.
    pub fn context_snapshot(&self, max_messages: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(max_messages);
        &self.messages[start..]
    }

    // ── Session-level mutation ───────────────────────────────────────────────

    pub fn set_environment_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.environment_variables.insert(key.into(), value.into());
        self.touch();
    }

    pub fn set_global_context(&mut self, key: impl Into<String>, value: Value) {
        self.global_context.insert(key.into(), value);
        self.touch();
    }

    /// Drop the conversation while keeping tasks and counters.
    pub fn clear_conversation(&mut self) {
        self.messages.clear();
        self.touch();
    }

    // ── Conversation ─────────────────────────────────────────────────────────

    /// Append a plain message and return its id.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> String {
        self.add_message_with(role, content, Vec::new(), Map::new())
    }

    /// Append a message carrying tool calls and metadata. Calls already on
    /// the message count toward the tool-call and error counters.
    pub fn add_message_with(
        &mut self,
        role: Role,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        metadata: Map<String, Value>,
    ) -> String {
        for call in &tool_calls {
            self.count_tool_call(call);
        }
        let message = Message::new(role, content, tool_calls, metadata);
        let id = message.id.clone();
        self.messages.push(message);
        self.touch();
        id
    }

    /// Record one tool call and return its id.
    ///
    /// The call is attached to the last message when that message is an
    /// assistant message; otherwise an empty assistant message is appended
    /// to hold it. A call with `error` set also counts as a task error.
    pub fn add_tool_call(
        &mut self,
        tool_name: impl Into<String>,
        arguments: Arguments,
        result: Option<String>,
        error: Option<String>,
        duration_ms: Option<u64>,
    ) -> String {
        let call = ToolCall::new(tool_name, arguments, result, error, duration_ms);
        let id = call.id.clone();
        self.count_tool_call(&call);

        let attach = matches!(self.messages.last(), Some(m) if m.role == Role::Assistant);
        if attach {
            if let Some(last) = self.messages.last_mut() {
                last.tool_calls.push(call);
            }
        } else {
            self.messages
                .push(Message::new(Role::Assistant, "", vec![call], Map::new()));
        }
        self.touch();
        id
    }

    fn count_tool_call(&mut self, call: &ToolCall) {
        self.total_tool_calls += 1;
        match self.current_task.as_mut() {
            Some(task) => task.tool_call_count += 1,
            None => self.unattributed_tool_calls += 1,
        }
        if let Some(error) = &call.error {
            let entry = format!("tool '{}' failed: {}", call.tool_name, error);
            self.count_error(&entry);
        }
    }

    fn count_error(&mut self, error: &str) {
        self.total_errors += 1;
        match self.current_task.as_mut() {
            Some(task) => {
                task.error_count += 1;
                task.push_error(error);
            }
            None => self.unattributed_errors += 1,
        }
    }

    // ── Task lifecycle ───────────────────────────────────────────────────────

    /// Archive the current task (whatever its status) and start a pending one.
    /// Returns the new task id.
    pub fn start_new_task(&mut self, initial_prompt: &str, max_iterations: u32) -> String {
        if let Some(previous) = self.current_task.take() {
            debug!(task_id = %previous.task_id, status = %previous.status, "archiving task");
            self.task_history.push(previous);
        }

        let prefix: String = initial_prompt.chars().take(DESCRIPTION_PROMPT_CHARS).collect();
        let task = TaskContext::new(format!("Execute: {}", prefix), initial_prompt, max_iterations);
        let id = task.task_id.clone();
        self.current_task = Some(task);
        self.touch();
        id
    }

    /// `pending → in_progress`. Returns false when there is no pending task.
    pub fn begin_task(&mut self) -> bool {
        self.transition_current(TaskStatus::InProgress)
    }

    /// Advance the current task by one iteration.
    ///
    /// This is the only place iteration counters move: both the task's
    /// `iteration_count` and the session's `total_iterations` increase by
    /// exactly one. Ignored when there is no active task.
    pub fn update_task_progress(
        &mut self,
        plan: Option<Vec<String>>,
        current_step: Option<String>,
        completed_step: Option<String>,
    ) {
        let Some(task) = self.current_task.as_mut() else {
            return;
        };
        if !task.is_active() {
            warn!(task_id = %task.task_id, status = %task.status, "progress update on finished task ignored");
            return;
        }
        if let Some(plan) = plan {
            task.current_plan = plan;
        }
        if let Some(step) = current_step {
            task.current_step = Some(step);
        }
        if let Some(step) = completed_step {
            task.completed_steps.push(step);
        }
        task.iteration_count += 1;
        task.updated_at = Utc::now();
        self.total_iterations += 1;
        self.touch();
    }

    /// Mark the current task completed and compute its success rate.
    pub fn complete_task(&mut self, final_result: impl Into<String>, artifacts: Map<String, Value>) {
        let final_result = final_result.into();
        if let Some(task) = self.active_task_mut("complete") {
            task.transition(TaskStatus::Completed);
            task.final_result = Some(final_result);
            task.artifacts.extend(artifacts);
            task.recompute_success_rate();
            self.touch();
        }
    }

    /// Mark the current task failed, recording `error`.
    pub fn fail_task(&mut self, error: &str) {
        if self.active_task_mut("fail").is_none() {
            return;
        }
        self.count_error(error);
        if let Some(task) = self.current_task.as_mut() {
            task.transition(TaskStatus::Failed);
            task.final_result = Some(error.to_string());
        }
        self.touch();
    }

    /// Mark the current task cancelled. Cancellation is not counted as an error.
    pub fn cancel_task(&mut self, reason: &str) {
        if let Some(task) = self.active_task_mut("cancel") {
            task.transition(TaskStatus::Cancelled);
            task.final_result = Some(reason.to_string());
            self.touch();
        }
    }

    /// Record a recoverable error against the current task without ending it.
    pub fn record_task_error(&mut self, error: &str) {
        if self.active_task_mut("record error on").is_some() {
            self.count_error(error);
            self.touch();
        }
    }

    fn active_task_mut(&mut self, action: &str) -> Option<&mut TaskContext> {
        match self.current_task.as_mut() {
            Some(task) if task.is_active() => Some(task),
            Some(task) => {
                warn!(task_id = %task.task_id, status = %task.status, action, "task already finished");
                None
            }
            None => None,
        }
    }

    fn transition_current(&mut self, next: TaskStatus) -> bool {
        let moved = match self.current_task.as_mut() {
            Some(task) => task.transition(next),
            None => false,
        };
        if moved {
            self.touch();
        }
        moved
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    // ── Serialization ────────────────────────────────────────────────────────

    /// Pretty-printed JSON form of the whole state.
    pub fn to_json(&self) -> WardenResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| WardenError::validation("state", format!("failed to serialize state: {}", e)))
    }

    /// Parse a state document. Missing keys and ill-typed values are reported
    /// as `Validation` errors naming the offending field.
    pub fn from_json(json: &str) -> WardenResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| WardenError::validation("document", format!("not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| WardenError::validation("document", "expected a JSON object"))?;
        if let Some(missing) = REQUIRED_KEYS.iter().find(|k| !object.contains_key(**k)) {
            return Err(WardenError::validation(*missing, "required field is missing"));
        }

        serde_json::from_value(value).map_err(|e| {
            let message = e.to_string();
            let field = field_name(&message).unwrap_or("state").to_string();
            WardenError::Validation { field, message }
        })
    }
}

/// The field named in a serde message such as ``missing field `x` ``.
fn field_name(message: &str) -> Option<&str> {
    let start = message.find("field `")? + "field `".len();
    let len = message[start..].find('`')?;
    let name = &message[start..start + len];
    (!name.is_empty()).then_some(name)
}
