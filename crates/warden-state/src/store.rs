//! File-backed persistence for [`AgentState`].
//!
//! Writes go to `<file>.json.tmp` first and are renamed into place, so a
//! crash mid-write leaves the previous document intact.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use warden_contracts::{WardenError, WardenResult};

use crate::state::AgentState;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist `state`, replacing any previous document atomically.
    pub fn save(&self, state: &AgentState) -> WardenResult<()> {
        debug!(path = %self.path.display(), session_id = %state.session_id(), "saving agent state");
        let mut buf = state.to_json()?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    pub fn load(&self) -> WardenResult<AgentState> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            WardenError::validation(
                "state_file",
                format!("failed to read '{}': {}", self.path.display(), e),
            )
        })?;
        AgentState::from_json(&contents)
    }

    /// Load the persisted session, or start a fresh one.
    ///
    /// A missing file yields a fresh state. A file that cannot be parsed is
    /// logged and also replaced by a fresh state; it is overwritten on the
    /// next `save`.
    pub fn load_or_create(
        &self,
        agent_name: &str,
        agent_version: &str,
        working_directory: &str,
    ) -> AgentState {
        if !self.exists() {
            info!(path = %self.path.display(), "no saved state, starting new session");
            return AgentState::new(agent_name, agent_version, working_directory);
        }
        match self.load() {
            Ok(state) => {
                info!(
                    path = %self.path.display(),
                    session_id = %state.session_id(),
                    messages = state.messages().len(),
                    "resumed session"
                );
                state
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "saved state unreadable, starting new session");
                AgentState::new(agent_name, agent_version, working_directory)
            }
        }
    }

    /// Where `archive` would write the given session.
    pub fn archive_path(&self, session_id: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("agent_state");
        self.path.with_file_name(format!("{}.{}.json", stem, session_id))
    }

    /// Write `state` to `<stem>.<session_id>.json` next to the live file.
    pub fn archive(&self, state: &AgentState) -> WardenResult<PathBuf> {
        let target = self.archive_path(state.session_id());
        let mut buf = state.to_json()?;
        buf.push('\n');
        write_atomic(&target, &buf)?;
        info!(path = %target.display(), session_id = %state.session_id(), "archived session");
        Ok(target)
    }
}

fn write_atomic(path: &Path, contents: &str) -> WardenResult<()> {
    let io_err = |what: &str, p: &Path, e: std::io::Error| {
        WardenError::validation("state_file", format!("{} '{}': {}", what, p.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err("create directory", parent, e))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(|e| io_err("write temp state", &tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| io_err("replace state", path, e))?;
    Ok(())
}
