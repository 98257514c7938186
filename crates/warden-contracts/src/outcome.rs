//! The structured result every task execution produces.

use serde::{Deserialize, Serialize};

/// What `execute_task` hands back to its caller.
///
/// Failures are values, not errors: a failed task still yields an outcome
/// with `success = false`, a human-readable `result`, and the task's error
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    /// Absent only when the task was refused before it started.
    pub task_id: Option<String>,
    pub result: String,
    pub iterations: u32,
    pub error_history: Vec<String>,
}

impl TaskOutcome {
    /// An outcome for a task that was never started.
    pub fn refused(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            task_id: None,
            result: reason.clone(),
            iterations: 0,
            error_history: vec![reason],
        }
    }
}
