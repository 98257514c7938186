//! Runtime error types for the warden execution pipeline.
//!
//! All fallible operations in warden return `WardenResult<T>`. The variant set
//! is closed: each variant is one error kind, and the recovery policy in
//! `warden-core` dispatches on [`ErrorKind`] rather than on message text.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for the warden runtime.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A proposed action violated a security rule.
    ///
    /// Recorded on the tool call and fed back to the oracle; never fatal on
    /// its own.
    #[error("security violation ({violation}): {message}")]
    Security {
        violation: ViolationType,
        message: String,
        attempted_action: Option<String>,
    },

    /// A registered tool failed, is unknown, or is not implemented.
    #[error("tool '{tool_name}' failed ({kind}): {message}")]
    Tool {
        tool_name: String,
        kind: ToolErrorKind,
        message: String,
        /// Wall-clock time spent in the handler before it failed, when known.
        elapsed_ms: Option<u64>,
    },

    /// Structural mismatch: bad tool arguments or a malformed persisted state.
    #[error("validation failed for field '{field}': {message}")]
    Validation { field: String, message: String },

    /// A task or tool exceeded its deadline.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    /// Invalid startup configuration. Raised before any task starts.
    #[error("configuration error: {reason}")]
    Configuration { key: Option<String>, reason: String },

    /// The reasoning oracle could not produce a response.
    #[error("reasoning oracle failed: {reason}")]
    Oracle { reason: String },
}

impl WardenError {
    /// Shorthand for a `Security` error with an attempted action.
    pub fn security(
        violation: ViolationType,
        message: impl Into<String>,
        attempted_action: impl Into<String>,
    ) -> Self {
        Self::Security {
            violation,
            message: message.into(),
            attempted_action: Some(attempted_action.into()),
        }
    }

    /// Shorthand for a `Validation` error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a `Configuration` error naming the offending key.
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: Some(key.into()),
            reason: reason.into(),
        }
    }

    /// The taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Security { .. } => ErrorKind::Security,
            Self::Tool { .. } => ErrorKind::Tool,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Oracle { .. } => ErrorKind::Oracle,
        }
    }

    /// The violation type, if this is a security error.
    pub fn violation(&self) -> Option<ViolationType> {
        match self {
            Self::Security { violation, .. } => Some(*violation),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the warden crates.
pub type WardenResult<T> = Result<T, WardenError>;

/// Discriminant of [`WardenError`], used for recovery dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Security,
    Tool,
    Validation,
    Timeout,
    Configuration,
    Oracle,
}

/// Why a tool invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No handler is registered under the requested name.
    UnknownTool,
    /// The handler ran and reported a failure.
    ExecutionFailed,
    /// The tool is registered as a placeholder only.
    NotImplemented,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownTool => "unknown_tool",
            Self::ExecutionFailed => "execution_failed",
            Self::NotImplemented => "not_implemented",
        };
        f.write_str(s)
    }
}

/// The rule class a rejected action tripped.
///
/// Serialized in snake_case so audit output and error messages share one
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    UnauthorizedTool,
    EmptyCommand,
    ForbiddenPattern,
    InvalidCommand,
    UnauthorizedCommand,
    ParseError,
    UnauthorizedGitOperation,
    DangerousCode,
    EmptyPath,
    PathTraversal,
    SensitiveFileAccess,
    InvalidPath,
    OversizedContent,
    UnauthorizedProtocol,
    BlockedPort,
    InvalidUrl,
    UnauthorizedDomain,
    InvalidXpath,
    OversizedArgument,
}

impl ViolationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnauthorizedTool => "unauthorized_tool",
            Self::EmptyCommand => "empty_command",
            Self::ForbiddenPattern => "forbidden_pattern",
            Self::InvalidCommand => "invalid_command",
            Self::UnauthorizedCommand => "unauthorized_command",
            Self::ParseError => "parse_error",
            Self::UnauthorizedGitOperation => "unauthorized_git_operation",
            Self::DangerousCode => "dangerous_code",
            Self::EmptyPath => "empty_path",
            Self::PathTraversal => "path_traversal",
            Self::SensitiveFileAccess => "sensitive_file_access",
            Self::InvalidPath => "invalid_path",
            Self::OversizedContent => "oversized_content",
            Self::UnauthorizedProtocol => "unauthorized_protocol",
            Self::BlockedPort => "blocked_port",
            Self::InvalidUrl => "invalid_url",
            Self::UnauthorizedDomain => "unauthorized_domain",
            Self::InvalidXpath => "invalid_xpath",
            Self::OversizedArgument => "oversized_argument",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
