//! Built-in tools.
//!
//! | Tool | Handler |
//! |---|---|
//! | `file_read`, `file_write`, `file_list` | blocking |
//! | `shell_exec` | async subprocess with timeout |
//! | `browser_navigate`, `browser_click`, `search_web` | placeholders, always `NotImplemented` |
//!
//! File tools resolve their paths through the same `SecurityValidator` the
//! registry gates with, so a handler only ever touches the checked path.

mod file;
mod placeholder;
mod shell;

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use warden_contracts::{
    error::{WardenError, WardenResult},
    oracle::Arguments,
};
use warden_policy::SecurityValidator;

use crate::handler::HandlerError;
use crate::registry::ToolRegistry;

pub use shell::{ShellExec, DEFAULT_TIMEOUT_SECS, MAX_OUTPUT_BYTES};

/// A registry gated by `validator` with every built-in tool registered.
pub fn default_registry(validator: Arc<SecurityValidator>) -> WardenResult<ToolRegistry> {
    let registry = ToolRegistry::new(validator.clone());
    register_builtin_tools(&registry, &validator)?;
    info!(tools = registry.len(), "tool registry initialized");
    Ok(registry)
}

pub fn register_builtin_tools(registry: &ToolRegistry, validator: &Arc<SecurityValidator>) -> WardenResult<()> {
    file::register(registry, validator)?;
    shell::register(registry, validator)?;
    placeholder::register(registry)
}

/// A required string argument. The registry's schema check normally
/// guarantees it; direct callers get a `Validation` error.
fn str_arg<'a>(arguments: &'a Arguments, key: &str) -> Result<&'a str, HandlerError> {
    match arguments.get(key) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(WardenError::validation(key, "expected a string argument").into()),
    }
}
