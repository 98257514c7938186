//! # warden-policy
//!
//! Zero-trust validation of proposed tool calls.
//!
//! [`SecurityValidator`] implements the
//! [`SecurityGate`](warden_core::traits::SecurityGate) trait. Its rules come
//! from a TOML [`RuleTable`] (the embedded `policies/default.toml` unless a
//! deployment supplies its own) combined with the deployment's
//! `SecurityConfig` allow-lists.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_contracts::config::SecurityConfig;
//! use warden_policy::SecurityValidator;
//!
//! let validator = SecurityValidator::new(SecurityConfig::default())?;
//! validator.validate_shell_command("ls -la")?;
//! ```
//!
//! Rules are checked in a fixed order and the first failure is returned as
//! `WardenError::Security` carrying the violated rule class.

pub mod path;
pub mod rules;
pub mod validator;

pub use rules::{CompiledRules, RuleTable, DEFAULT_RULES};
pub use validator::SecurityValidator;

// ── Tests ─────────────────────────────────────────────────────────────────────
