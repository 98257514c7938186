//! Startup configuration for the warden runtime.
//!
//! Configuration is a TOML document whose sections are all optional; missing
//! keys fall back to the defaults below. `WardenConfig::validate` runs once at
//! startup and is the only place a `Configuration` error is produced for these
//! values, so no configuration problem can surface mid-task.
//!
//! ```toml
//! [agent]
//! max_iterations = 20
//! timeout_secs = 120
//!
//! [security]
//! allowed_domains = ["github.com"]
//! allowed_base_paths = ["/srv/agent"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{WardenError, WardenResult};

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub agent: AgentConfig,
    pub security: SecurityConfig,
    pub recovery: RecoveryConfig,
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Parse `s` as TOML. Does not validate; call [`validate`](Self::validate).
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s).map_err(|e| WardenError::Configuration {
            key: None,
            reason: format!("failed to parse configuration TOML: {}", e),
        })
    }

    /// Read and parse the file at `path`, then validate it.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Configuration {
            key: None,
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> WardenResult<()> {
        let agent = &self.agent;
        if agent.max_iterations == 0 {
            return Err(WardenError::config("agent.max_iterations", "must be at least 1"));
        }
        if agent.timeout_secs == 0 {
            return Err(WardenError::config("agent.timeout_secs", "must be at least 1"));
        }
        if agent.context_window == 0 {
            return Err(WardenError::config("agent.context_window", "must be at least 1"));
        }

        let security = &self.security;
        if security.max_file_size_mb == 0 {
            return Err(WardenError::config("security.max_file_size_mb", "must be at least 1"));
        }
        if security.max_argument_length == 0 {
            return Err(WardenError::config("security.max_argument_length", "must be at least 1"));
        }
        if security.allowed_base_paths.is_empty() {
            return Err(WardenError::config(
                "security.allowed_base_paths",
                "at least one allowed base path is required",
            ));
        }
        if let Some(path) = security.allowed_base_paths.iter().find(|p| !p.is_absolute()) {
            return Err(WardenError::config(
                "security.allowed_base_paths",
                format!("'{}' is not an absolute path", path.display()),
            ));
        }
        if security.allowed_domains.iter().any(|d| d.trim().is_empty()) {
            return Err(WardenError::config("security.allowed_domains", "empty domain entry"));
        }
        if security.blocked_ports.contains(&0) {
            return Err(WardenError::config("security.blocked_ports", "port 0 is not a valid port"));
        }
        Ok(())
    }
}

/// Agent identity and loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
    /// Upper bound on iterations per task.
    pub max_iterations: u32,
    /// Wall-clock budget per task, checked at every iteration boundary.
    pub timeout_secs: u64,
    /// How many recent messages go into each oracle context.
    pub context_window: usize,
    /// How long shutdown waits for an in-flight task.
    pub shutdown_grace_secs: u64,
    /// Where the session state is persisted.
    pub state_file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "warden".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_iterations: 50,
            timeout_secs: 300,
            context_window: 20,
            shutdown_grace_secs: 30,
            state_file: PathBuf::from("data/agent_state.json"),
        }
    }
}

/// Inputs to the security validator.
///
/// The fixed rule table (forbidden patterns, allowed commands) lives in the
/// policy crate; these are the deployment-specific knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hosts (and their subdomains) network and browser tools may reach.
    pub allowed_domains: BTreeSet<String>,
    pub blocked_ports: BTreeSet<u16>,
    pub max_file_size_mb: u64,
    /// Roots every file path must resolve under.
    pub allowed_base_paths: Vec<PathBuf>,
    /// Longest string any single tool argument may carry.
    pub max_argument_length: usize,
    /// Base for relative paths. Defaults to the first allowed base path.
    pub working_directory: Option<PathBuf>,
}

impl SecurityConfig {
    /// The directory relative paths are resolved against.
    pub fn effective_working_directory(&self) -> PathBuf {
        self.working_directory
            .clone()
            .or_else(|| self.allowed_base_paths.first().cloned())
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Maximum file content size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_domains: ["api.anthropic.com", "googleapis.com", "github.com", "pypi.org"]
                .into_iter()
                .map(String::from)
                .collect(),
            blocked_ports: [22, 23, 135, 139, 445, 1433, 3389].into_iter().collect(),
            max_file_size_mb: 100,
            allowed_base_paths: ["/app", "/tmp", "/home/agent", "/var/tmp/agent"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            max_argument_length: 10_000,
            working_directory: None,
        }
    }
}

/// Thresholds for the loop's recovery policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Transient errors are retried only while the iteration index is below this.
    pub transient_retry_iterations: u32,
    pub backoff_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            transient_retry_iterations: 3,
            backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `"info"` or `"warden_core=debug"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
