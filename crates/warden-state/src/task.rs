//! Task lifecycle types.
//!
//! A task moves along `pending → in_progress → {completed, failed, cancelled}`.
//! Terminal states are final; `AgentState` refuses further transitions on a
//! task that has reached one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// `completed`, `failed`, and `cancelled` admit no outgoing transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self → next` is an edge of the status DAG.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::InProgress) => true,
            (Self::Pending | Self::InProgress, s) => s.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Progress and results of one task.
///
/// Archived tasks in `AgentState::task_history` are only reachable through
/// shared references, so they cannot be modified after archival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    pub initial_prompt: String,
    #[serde(default)]
    pub current_plan: Vec<String>,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    pub current_step: Option<String>,

    /// Completed iterations. Only `AgentState::update_task_progress` advances it.
    pub iteration_count: u32,
    pub max_iterations: u32,
    /// `completed_steps / (completed_steps + error_history)`, set on completion.
    pub success_rate: f64,

    pub final_result: Option<String>,
    #[serde(default)]
    pub artifacts: Map<String, Value>,
    #[serde(default)]
    pub error_history: Vec<String>,

    /// Tool calls recorded while this task was current.
    #[serde(default)]
    pub tool_call_count: u64,
    /// Errors counted toward `AgentState::total_errors` while this task was current.
    #[serde(default)]
    pub error_count: u64,
}

impl TaskContext {
    pub(crate) fn new(
        description: impl Into<String>,
        initial_prompt: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            initial_prompt: initial_prompt.into(),
            current_plan: Vec::new(),
            completed_steps: Vec::new(),
            current_step: None,
            iteration_count: 0,
            max_iterations,
            success_rate: 0.0,
            final_result: None,
            artifacts: Map::new(),
            error_history: Vec::new(),
            tool_call_count: 0,
            error_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Move to `next` if the DAG allows it. Returns false otherwise.
    pub(crate) fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        true
    }

    /// Append a timestamped entry to the error history.
    pub(crate) fn push_error(&mut self, error: &str) {
        let now = Utc::now();
        self.error_history.push(format!("{}: {}", now.to_rfc3339(), error));
        self.updated_at = now;
    }

    pub(crate) fn recompute_success_rate(&mut self) -> f64 {
        let succeeded = self.completed_steps.len();
        let total = succeeded + self.error_history.len();
        self.success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64
        };
        self.success_rate
    }
}
