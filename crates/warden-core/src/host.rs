//! The owning handle for one agent: state, loop, and persistence.
//!
//! `AgentHost` is what an outer surface (the CLI, or a server) holds. State
//! lives behind a `tokio::sync::Mutex`, so concurrent `execute_task` callers
//! queue and exactly one task is in flight at a time.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use warden_contracts::{error::WardenResult, outcome::TaskOutcome};
use warden_state::{AgentState, StateStore, TaskContext, TaskStatus};

use crate::agent_loop::AgentLoop;

/// Point-in-time view of the agent for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub session_id: String,
    pub agent_name: String,
    pub agent_version: String,
    pub current_task_id: Option<String>,
    pub current_task_status: Option<TaskStatus>,
    pub current_iteration: u32,
    pub total_iterations: u64,
    pub total_tool_calls: u64,
    pub total_errors: u64,
    pub message_count: usize,
    pub archived_tasks: usize,
    pub tools: Vec<String>,
    pub shutting_down: bool,
}

/// How `shutdown` went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// The in-flight task did not finish within the grace period.
    pub forced: bool,
    /// Final state was written to the store.
    pub persisted: bool,
}

pub struct AgentHost {
    state: Mutex<AgentState>,
    agent_loop: AgentLoop,
    store: StateStore,
    shutdown_grace: Duration,
}

impl AgentHost {
    pub fn new(
        state: AgentState,
        agent_loop: AgentLoop,
        store: StateStore,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            agent_loop,
            store,
            shutdown_grace,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn is_shutting_down(&self) -> bool {
        self.agent_loop.shutdown_token().is_cancelled()
    }

    /// Run one task, waiting for any task already in flight.
    ///
    /// Refused without starting a task once shutdown has been requested.
    /// State is persisted after the task ends; a failed write is logged and
    /// does not change the outcome.
    pub async fn execute_task(&self, prompt: &str, max_iterations: Option<u32>) -> TaskOutcome {
        if self.is_shutting_down() {
            return TaskOutcome::refused("Agent is shutting down; task not started");
        }

        let mut state = self.state.lock().await;
        // A queued caller may have waited through a shutdown request.
        if self.is_shutting_down() {
            return TaskOutcome::refused("Agent is shutting down; task not started");
        }

        let outcome = self
            .agent_loop
            .execute_task(prompt, &mut state, max_iterations)
            .await;

        if let Err(e) = self.store.save(&state) {
            warn!(path = %self.store.path().display(), error = %e, "failed to persist state after task");
        }
        outcome
    }

    /// Waits for any in-flight task before reading.
    pub async fn status(&self) -> AgentStatus {
        let state = self.state.lock().await;
        let task = state.current_task();
        AgentStatus {
            session_id: state.session_id().to_string(),
            agent_name: state.agent_name().to_string(),
            agent_version: state.agent_version().to_string(),
            current_task_id: task.map(|t| t.task_id.clone()),
            current_task_status: task.map(|t| t.status),
            current_iteration: task.map(|t| t.iteration_count).unwrap_or(0),
            total_iterations: state.total_iterations(),
            total_tool_calls: state.total_tool_calls(),
            total_errors: state.total_errors(),
            message_count: state.messages().len(),
            archived_tasks: state.task_history().len(),
            tools: self.agent_loop.tools().tool_names(),
            shutting_down: self.is_shutting_down(),
        }
    }

    /// The most recent `limit` tasks, oldest first, including the current one.
    pub async fn history(&self, limit: usize) -> Vec<TaskContext> {
        let state = self.state.lock().await;
        let all: Vec<&TaskContext> = state
            .task_history()
            .iter()
            .chain(state.current_task())
            .collect();
        let skip = all.len().saturating_sub(limit);
        all.into_iter().skip(skip).cloned().collect()
    }

    /// Archive the current session and replace it with a fresh one.
    ///
    /// Returns the archive path. The fresh state is persisted immediately.
    pub async fn reset_session(&self) -> WardenResult<PathBuf> {
        let mut state = self.state.lock().await;
        let archived = self.store.archive(&state)?;
        let fresh = AgentState::new(
            state.agent_name(),
            state.agent_version(),
            state.working_directory(),
        );
        *state = fresh;
        self.store.save(&state)?;
        info!(archive = %archived.display(), session_id = %state.session_id(), "session reset");
        Ok(archived)
    }

    /// Request shutdown, wait up to the grace period for the in-flight task,
    /// and persist final state.
    ///
    /// The in-flight task is cancelled at its next iteration boundary. When
    /// the grace period runs out first, the shutdown is reported as forced
    /// and persistence is left to the task, which saves on completion.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.agent_loop.shutdown_token().cancel();
        info!(grace_secs = self.shutdown_grace.as_secs(), "shutdown requested");

        match tokio::time::timeout(self.shutdown_grace, self.state.lock()).await {
            Ok(state) => {
                let persisted = match self.store.save(&state) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "failed to persist state on shutdown");
                        false
                    }
                };
                info!(persisted, "shutdown complete");
                ShutdownReport {
                    forced: false,
                    persisted,
                }
            }
            Err(_) => {
                warn!(grace_secs = self.shutdown_grace.as_secs(), "in-flight task did not finish, forcing shutdown");
                ShutdownReport {
                    forced: true,
                    persisted: false,
                }
            }
        }
    }
}
