//! # warden-contracts
//!
//! Shared types, error taxonomy, and configuration for the warden runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, error types, and configuration parsing.

pub mod config;
pub mod error;
pub mod oracle;
pub mod outcome;

pub use error::{ErrorKind, ToolErrorKind, ViolationType, WardenError, WardenResult};

#[cfg(test)]
mod tests {
    use super::*;
    use config::WardenConfig;
    use oracle::{OracleResponse, Role};
    use outcome::TaskOutcome;

    // ── WardenError display messages ─────────────────────────────────────────

    #[test]
    fn error_security_display() {
        let err = WardenError::security(
            ViolationType::ForbiddenPattern,
            "command contains forbidden pattern",
            "rm -rf /",
        );
        let msg = err.to_string();
        assert!(msg.contains("forbidden_pattern"));
        assert!(msg.contains("command contains forbidden pattern"));
        assert_eq!(err.kind(), ErrorKind::Security);
        assert_eq!(err.violation(), Some(ViolationType::ForbiddenPattern));
    }

    #[test]
    fn error_tool_display() {
        let err = WardenError::Tool {
            tool_name: "file_nope".to_string(),
            kind: ToolErrorKind::UnknownTool,
            message: "not found in registry".to_string(),
            elapsed_ms: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("file_nope"));
        assert!(msg.contains("unknown_tool"));
        assert_eq!(err.kind(), ErrorKind::Tool);
        assert_eq!(err.violation(), None);
    }

    #[test]
    fn error_validation_names_field() {
        let err = WardenError::validation("path", "expected string");
        assert!(err.to_string().contains("'path'"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn error_timeout_display() {
        let err = WardenError::Timeout {
            operation: "task".to_string(),
            timeout_secs: 300,
        };
        assert_eq!(err.to_string(), "task timed out after 300s");
    }

    #[test]
    fn violation_type_serializes_snake_case() {
        let json = serde_json::to_string(&ViolationType::SensitiveFileAccess).unwrap();
        assert_eq!(json, "\"sensitive_file_access\"");
        assert_eq!(ViolationType::SensitiveFileAccess.to_string(), "sensitive_file_access");
    }

    // ── Oracle types ─────────────────────────────────────────────────────────

    #[test]
    fn oracle_response_defaults_missing_fields() {
        let response: OracleResponse =
            serde_json::from_str(r#"{ "text_content": "hello" }"#).unwrap();
        assert_eq!(response.text_content, "hello");
        assert!(response.tool_calls.is_empty());
        assert!(!response.is_complete);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn refused_outcome_is_failure() {
        let outcome = TaskOutcome::refused("shutdown in progress");
        assert!(!outcome.success);
        assert!(outcome.task_id.is_none());
        assert_eq!(outcome.error_history, vec!["shutdown in progress".to_string()]);
    }

    // ── Configuration ────────────────────────────────────────────────────────

    #[test]
    fn config_defaults_validate() {
        let config = WardenConfig::default();
        config.validate().unwrap();
        assert_eq!(config.agent.max_iterations, 50);
        assert!(config.security.allowed_domains.contains("github.com"));
        assert!(config.security.blocked_ports.contains(&22));
    }

    #[test]
    fn config_partial_toml_keeps_defaults() {
        let config = WardenConfig::from_toml_str(
            r#"
            [agent]
            max_iterations = 7

            [security]
            allowed_domains = ["example.org"]
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.agent.timeout_secs, 300);
        assert_eq!(config.security.allowed_domains.len(), 1);
        assert_eq!(config.recovery.transient_retry_iterations, 3);
    }

    #[test]
    fn config_zero_iterations_rejected() {
        let config = WardenConfig::from_toml_str("[agent]\nmax_iterations = 0\n").unwrap();
        match config.validate() {
            Err(WardenError::Configuration { key, .. }) => {
                assert_eq!(key.as_deref(), Some("agent.max_iterations"));
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn config_relative_base_path_rejected() {
        let config =
            WardenConfig::from_toml_str("[security]\nallowed_base_paths = [\"data\"]\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(WardenError::Configuration { .. })
        ));
    }

    #[test]
    fn config_parse_error() {
        match WardenConfig::from_toml_str("this is not valid toml ][[[") {
            Err(WardenError::Configuration { reason, .. }) => {
                assert!(reason.contains("failed to parse configuration TOML"));
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn config_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = WardenConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(WardenError::Configuration { .. })));
    }

    #[test]
    fn working_directory_defaults_to_first_base_path() {
        let config = WardenConfig::default();
        assert_eq!(
            config.security.effective_working_directory(),
            std::path::PathBuf::from("/app")
        );
    }
}
