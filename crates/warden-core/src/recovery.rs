//! The hierarchical recovery policy.
//!
//! Rules, first match wins:
//!
//! 1. transient (`Oracle`, `Tool`, `Timeout`) while the iteration index is
//!    below `transient_retry_iterations` → retry after a fixed backoff
//! 2. `Security` → continue, with a system notice for the next oracle call
//! 3. anything else → abort the task

use std::time::Duration;

use warden_contracts::config::RecoveryConfig;
use warden_contracts::error::{ErrorKind, WardenError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    Retry { backoff: Duration },
    Degrade { notice: String },
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    transient_retry_iterations: u32,
    backoff: Duration,
}

impl RecoveryPolicy {
    pub fn new(transient_retry_iterations: u32, backoff: Duration) -> Self {
        Self {
            transient_retry_iterations,
            backoff,
        }
    }

    pub fn from_config(config: &RecoveryConfig) -> Self {
        Self::new(
            config.transient_retry_iterations,
            Duration::from_millis(config.backoff_ms),
        )
    }

    /// Decide what to do about `error`, raised during zero-based `iteration`.
    pub fn decide(&self, error: &WardenError, iteration: u32) -> RecoveryAction {
        match error.kind() {
            ErrorKind::Oracle | ErrorKind::Tool | ErrorKind::Timeout
                if iteration < self.transient_retry_iterations =>
            {
                RecoveryAction::Retry {
                    backoff: self.backoff,
                }
            }
            ErrorKind::Security => RecoveryAction::Degrade {
                notice: format!("Security error occurred: {}. Please modify your approach.", error),
            },
            _ => RecoveryAction::Abort,
        }
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::from_config(&RecoveryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_contracts::error::{ToolErrorKind, ViolationType};

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::new(3, Duration::from_millis(10))
    }

    fn oracle_error() -> WardenError {
        WardenError::Oracle {
            reason: "connection reset".to_string(),
        }
    }

    #[test]
    fn transient_errors_retry_within_window() {
        let tool_error = WardenError::Tool {
            tool_name: "shell_exec".to_string(),
            kind: ToolErrorKind::ExecutionFailed,
            message: "exit 1".to_string(),
            elapsed_ms: Some(3),
        };
        for err in [oracle_error(), tool_error] {
            assert_eq!(
                policy().decide(&err, 2),
                RecoveryAction::Retry {
                    backoff: Duration::from_millis(10)
                }
            );
        }
    }

    #[test]
    fn transient_errors_abort_after_window() {
        assert_eq!(policy().decide(&oracle_error(), 3), RecoveryAction::Abort);
    }

    #[test]
    fn security_errors_degrade_at_any_iteration() {
        let err = WardenError::security(ViolationType::PathTraversal, "outside allowed roots", "../x");
        match policy().decide(&err, 40) {
            RecoveryAction::Degrade { notice } => {
                assert!(notice.contains("path_traversal"));
                assert!(notice.contains("modify your approach"));
            }
            other => panic!("expected Degrade, got {:?}", other),
        }
    }

    #[test]
    fn validation_and_configuration_errors_abort() {
        assert_eq!(
            policy().decide(&WardenError::validation("path", "expected string"), 0),
            RecoveryAction::Abort
        );
        assert_eq!(
            policy().decide(&WardenError::config("agent.max_iterations", "zero"), 0),
            RecoveryAction::Abort
        );
    }

    #[test]
    fn defaults_follow_recovery_config() {
        let policy = RecoveryPolicy::default();
        assert_eq!(
            policy.decide(&oracle_error(), 0),
            RecoveryAction::Retry {
                backoff: Duration::from_millis(1000)
            }
        );
        assert_eq!(policy.decide(&oracle_error(), 3), RecoveryAction::Abort);
    }
}
