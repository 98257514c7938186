//! The bounded agent loop: one task, many iterations, strictly sequential.
//!
//! Each iteration runs:
//!
//!   Deadline → Context → Oracle → Record → Tool calls (in order) → Observe → Completion → Progress
//!
//! Errors raised by a single tool call are recorded on that call and never
//! abort the iteration. Errors raised by the iteration itself go through the
//! [`RecoveryPolicy`]. The task deadline and the shutdown token are checked
//! only at iteration boundaries, so an in-flight oracle or tool call is never
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use warden_contracts::{
    config::WardenConfig,
    error::{WardenError, WardenResult},
    oracle::{ChatMessage, OracleRequest, Role},
    outcome::TaskOutcome,
};
use warden_state::AgentState;

use crate::recovery::{RecoveryAction, RecoveryPolicy};
use crate::traits::{Oracle, ToolDispatcher};

/// Phrases in the oracle's text that signal completion, matched case-insensitively.
pub const COMPLETION_PHRASES: &[&str] = &[
    "task complete",
    "task_complete",
    "task finished",
    "successfully completed",
    "objective achieved",
    "goal accomplished",
];

/// Longest tool output quoted back to the oracle in an observation.
const OBSERVATION_PREVIEW_CHARS: usize = 2000;

/// Error-history entries included in the task snapshot.
const SNAPSHOT_ERROR_ENTRIES: usize = 5;

const SYSTEM_PROMPT: &str = "You are an autonomous agent that completes tasks by reasoning and \
calling tools.

Work in cycles: reason about the task, call the tools you need, observe their results, and \
adapt. Every tool call is validated against a security policy before it runs. Rejected calls \
are reported back to you; change your approach rather than repeating them. File access is \
limited to approved directories, shell commands to an allow-list, and network access to \
approved domains.

When the task is done, say TASK_COMPLETE and summarise what was accomplished.";

/// Loop bounds and recovery thresholds.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub task_timeout: Duration,
    /// Number of recent messages included in each oracle request.
    pub context_window: usize,
    pub recovery: RecoveryPolicy,
}

impl LoopConfig {
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            max_iterations: config.agent.max_iterations,
            task_timeout: Duration::from_secs(config.agent.timeout_secs),
            context_window: config.agent.context_window,
            recovery: RecoveryPolicy::from_config(&config.recovery),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_config(&WardenConfig::default())
    }
}

/// Drives tasks against one oracle and one tool dispatcher.
pub struct AgentLoop {
    oracle: Arc<dyn Oracle>,
    tools: Arc<dyn ToolDispatcher>,
    config: LoopConfig,
    shutdown: CancellationToken,
}

impl AgentLoop {
    pub fn new(oracle: Arc<dyn Oracle>, tools: Arc<dyn ToolDispatcher>, config: LoopConfig) -> Self {
        Self {
            oracle,
            tools,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `token` as the shutdown signal checked before every iteration.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<dyn ToolDispatcher> {
        &self.tools
    }

    /// Run `prompt` as a new task on `state` until it completes, fails, times
    /// out, or is cancelled.
    ///
    /// Never returns an error: every way a task can end is reported through
    /// the returned [`TaskOutcome`], and the same ending is recorded on the
    /// task in `state`.
    pub async fn execute_task(
        &self,
        prompt: &str,
        state: &mut AgentState,
        max_iterations: Option<u32>,
    ) -> TaskOutcome {
        let started = Instant::now();
        let max_iterations = max_iterations.unwrap_or(self.config.max_iterations);

        let task_id = state.start_new_task(prompt, max_iterations);
        state.begin_task();
        state.add_message(Role::User, prompt);
        info!(task_id = %task_id, max_iterations, "task started");

        for iteration in 0..max_iterations {
            // ── Boundary checks ──────────────────────────────────────────────
            if self.shutdown.is_cancelled() {
                let reason = "Task cancelled: shutdown requested";
                info!(task_id = %task_id, iteration, "shutdown requested, cancelling task");
                state.cancel_task(reason);
                return outcome(state, false, reason.to_string());
            }

            if started.elapsed() > self.config.task_timeout {
                let err = WardenError::Timeout {
                    operation: "task".to_string(),
                    timeout_secs: self.config.task_timeout.as_secs(),
                };
                let message = format!("Task failed: {}", err);
                warn!(task_id = %task_id, iteration, "task deadline exceeded");
                state.fail_task(&err.to_string());
                return outcome(state, false, message);
            }

            debug!(task_id = %task_id, iteration = iteration + 1, max_iterations, "iteration starting");

            // ── Iteration body ───────────────────────────────────────────────
            match self.run_iteration(state, iteration).await {
                Ok(true) => {
                    let result = final_result(state);
                    state.complete_task(result.clone(), Map::new());
                    info!(
                        task_id = %task_id,
                        iterations = iteration + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "task completed"
                    );
                    return outcome(state, true, result);
                }
                Ok(false) => {}
                Err(err) => {
                    let message = format!("Error in iteration {}: {}", iteration + 1, err);
                    warn!(task_id = %task_id, iteration = iteration + 1, error = %err, "iteration failed");

                    match self.config.recovery.decide(&err, iteration) {
                        RecoveryAction::Retry { backoff } => {
                            state.record_task_error(&message);
                            debug!(task_id = %task_id, backoff_ms = backoff.as_millis() as u64, "retrying after transient error");
                            if !backoff.is_zero() {
                                tokio::time::sleep(backoff).await;
                            }
                        }
                        RecoveryAction::Degrade { notice } => {
                            state.record_task_error(&message);
                            state.add_message(Role::System, notice);
                        }
                        RecoveryAction::Abort => {
                            state.fail_task(&message);
                            return outcome(state, false, format!("Task failed: {}", message));
                        }
                    }
                }
            }
        }

        let message = format!("Task exceeded maximum iterations ({})", max_iterations);
        warn!(task_id = %task_id, max_iterations, "iteration bound reached without completion");
        state.fail_task(&message);
        outcome(state, false, message)
    }

    /// One perceive, think, act, observe cycle. Returns whether the task is
    /// complete.
    async fn run_iteration(&self, state: &mut AgentState, iteration: u32) -> WardenResult<bool> {
        let request = self.build_request(state)?;

        let response = self.oracle.respond(request).await.map_err(|e| match e {
            WardenError::Oracle { .. } => e,
            other => WardenError::Oracle {
                reason: other.to_string(),
            },
        })?;

        state.add_message(Role::Assistant, response.text_content.as_str());

        // Tool calls run strictly in order; a later call may depend on an
        // earlier one's side effects.
        let mut observations = Vec::with_capacity(response.tool_calls.len());
        let mut notices = Vec::new();
        let mut succeeded = Vec::new();

        for call in &response.tool_calls {
            let started = Instant::now();
            let result = self.tools.execute(&call.name, call.input.clone()).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    debug!(tool = %call.name, call_id = %call.id, duration_ms, "tool call succeeded");
                    let rendered = output.render();
                    observations.push(format!(
                        "Tool {} succeeded: {}",
                        call.name,
                        preview(&rendered, OBSERVATION_PREVIEW_CHARS)
                    ));
                    state.add_tool_call(
                        call.name.as_str(),
                        call.input.clone(),
                        Some(rendered),
                        None,
                        Some(duration_ms),
                    );
                    succeeded.push(call.name.clone());
                }
                Err(err) => {
                    warn!(tool = %call.name, call_id = %call.id, kind = ?err.kind(), error = %err, "tool call failed");
                    observations.push(format!("Tool {} failed: {}", call.name, err));
                    state.add_tool_call(
                        call.name.as_str(),
                        call.input.clone(),
                        None,
                        Some(err.to_string()),
                        Some(duration_ms),
                    );
                    if let RecoveryAction::Degrade { notice } =
                        self.config.recovery.decide(&err, iteration)
                    {
                        notices.push(notice);
                    }
                }
            }
        }

        if !observations.is_empty() {
            state.add_message(Role::Tool, observations.join("\n"));
        }
        for notice in notices {
            state.add_message(Role::System, notice);
        }

        let complete = response.is_complete || mentions_completion(&response.text_content);

        let completed_step = (!succeeded.is_empty())
            .then(|| format!("executed {}", succeeded.join(", ")));
        state.update_task_progress(None, Some(format!("iteration {}", iteration + 1)), completed_step);

        Ok(complete)
    }

    /// System prompt with a task snapshot, then the recent conversation window.
    fn build_request(&self, state: &AgentState) -> WardenResult<OracleRequest> {
        let snapshot = match state.current_task() {
            Some(task) => {
                let skip = task.error_history.len().saturating_sub(SNAPSHOT_ERROR_ENTRIES);
                json!({
                    "task_id": task.task_id,
                    "description": task.description,
                    "status": task.status,
                    "iteration": task.iteration_count,
                    "max_iterations": task.max_iterations,
                    "current_plan": task.current_plan,
                    "completed_steps": task.completed_steps,
                    "current_step": task.current_step,
                    "recent_errors": &task.error_history[skip..],
                    "working_directory": state.working_directory(),
                })
            }
            None => json!({ "working_directory": state.working_directory() }),
        };
        let snapshot = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            WardenError::validation("task_snapshot", format!("failed to serialize: {}", e))
        })?;

        let tools = self.tools.tool_specs();
        let tool_names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        let mut messages = Vec::with_capacity(self.config.context_window + 1);
        messages.push(ChatMessage::new(
            Role::System,
            format!(
                "{}\n\nCurrent task:\n{}\n\nAvailable tools: {}",
                SYSTEM_PROMPT,
                snapshot,
                tool_names.join(", ")
            ),
        ));
        messages.extend(
            state
                .context_snapshot(self.config.context_window)
                .iter()
                .map(|m| ChatMessage::new(m.role, m.content.as_str())),
        );

        Ok(OracleRequest { messages, tools })
    }
}

/// Whether `text` contains any of [`COMPLETION_PHRASES`], ignoring case.
pub fn mentions_completion(text: &str) -> bool {
    let lower = text.to_lowercase();
    COMPLETION_PHRASES.iter().any(|p| lower.contains(p))
}

/// Content of the last non-empty assistant message.
fn final_result(state: &AgentState) -> String {
    state
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant && !m.content.trim().is_empty())
        .map(|m| m.content.clone())
        .unwrap_or_else(|| "Task completed".to_string())
}

fn outcome(state: &AgentState, success: bool, result: String) -> TaskOutcome {
    let task = state.current_task();
    TaskOutcome {
        success,
        task_id: task.map(|t| t.task_id.clone()),
        result,
        iterations: task.map(|t| t.iteration_count).unwrap_or(0),
        error_history: task.map(|t| t.error_history.clone()).unwrap_or_default(),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
