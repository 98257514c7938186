use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use warden_contracts::{
    error::{WardenError, WardenResult},
    oracle::Arguments,
};
use warden_policy::SecurityValidator;

use super::str_arg;
use crate::handler::{AsyncTool, HandlerResult, ToolHandler};
use crate::registry::{ToolMetadata, ToolRegistry};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Combined cap on captured stdout and stderr. Each stream gets half.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

pub(super) fn register(registry: &ToolRegistry, validator: &Arc<SecurityValidator>) -> WardenResult<()> {
    registry.register(
        "shell_exec",
        ToolHandler::non_blocking(ShellExec::new(Arc::clone(validator))),
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Command line run with sh -c" },
                "working_directory": { "type": "string" },
                "timeout": { "type": "integer", "minimum": 1, "description": "Seconds before the command is killed" }
            },
            "required": ["command"]
        }),
        ToolMetadata::new("Run an allow-listed shell command"),
    )
}

/// Runs one command line under `sh -c` with a deadline.
///
/// The child is killed when the deadline passes or the call is dropped.
/// Output past the cap is read and discarded so the child never blocks on a
/// full pipe.
pub struct ShellExec {
    validator: Arc<SecurityValidator>,
}

impl ShellExec {
    pub fn new(validator: Arc<SecurityValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl AsyncTool for ShellExec {
    async fn call(&self, arguments: Arguments) -> HandlerResult {
        let command = str_arg(&arguments, "command")?;
        let cwd = match arguments.get("working_directory").and_then(Value::as_str) {
            Some(dir) => self.validator.validate_file_path(dir, "access")?,
            None => self.validator.working_directory().to_path_buf(),
        };
        let timeout_secs = arguments
            .get("timeout")
            .and_then(Value::as_u64)
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        match tokio::fs::metadata(&cwd).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(format!("working directory '{}' is not a directory", cwd.display()).into()),
            Err(e) => return Err(format!("working directory '{}' is unavailable: {}", cwd.display(), e).into()),
        }
        debug!(command = %preview(command), cwd = %cwd.display(), timeout_secs, "spawning shell command");

        let started = Instant::now();
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn command: {}", e))?;

        let stdout = child.stdout.take().ok_or("failed to capture stdout")?;
        let stderr = child.stderr.take().ok_or("failed to capture stderr")?;
        let per_stream = MAX_OUTPUT_BYTES / 2;

        let run = async {
            let (out, err) = tokio::join!(read_capped(stdout, per_stream), read_capped(stderr, per_stream));
            (out, err, child.wait().await)
        };

        let ((out, out_truncated), (err, err_truncated), status) =
            match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
                Ok(finished) => finished,
                Err(_) => {
                    warn!(command = %preview(command), timeout_secs, "shell command timed out");
                    return Err(WardenError::Timeout {
                        operation: "shell_command".to_string(),
                        timeout_secs,
                    }
                    .into());
                }
            };
        let status = status?;
        let exit_code = status.code();

        if status.success() {
            debug!(duration_ms = started.elapsed().as_millis() as u64, "shell command succeeded");
        } else {
            warn!(exit_code = ?exit_code, "shell command exited unsuccessfully");
        }

        Ok(json!({
            "command": command,
            "exit_code": exit_code,
            "success": status.success(),
            "working_directory": cwd.display().to_string(),
            "stdout": String::from_utf8_lossy(&out),
            "stderr": String::from_utf8_lossy(&err),
            "truncated": out_truncated || err_truncated,
        }))
    }
}

/// Read to EOF, keeping at most `limit` bytes.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buf.len());
                if n > room {
                    truncated = true;
                }
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    (buf, truncated)
}

fn preview(command: &str) -> String {
    command.chars().take(100).collect()
}
