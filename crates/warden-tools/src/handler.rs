//! Tool handler abstraction.
//!
//! A handler is either blocking (a plain closure, run on tokio's blocking
//! pool so it cannot stall the loop) or non-blocking (an [`AsyncTool`],
//! awaited directly). Both return a [`HandlerResult`]; the registry turns
//! the boxed error into a `WardenError`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use warden_contracts::{
    error::{ToolErrorKind, WardenError, WardenResult},
    oracle::Arguments,
};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<Value, HandlerError>;

/// A tool whose work is itself asynchronous (subprocesses, sockets).
#[async_trait]
pub trait AsyncTool: Send + Sync {
    async fn call(&self, arguments: Arguments) -> HandlerResult;
}

type BlockingFn = dyn Fn(Arguments) -> HandlerResult + Send + Sync;

#[derive(Clone)]
pub enum ToolHandler {
    Blocking(Arc<BlockingFn>),
    NonBlocking(Arc<dyn AsyncTool>),
}

impl ToolHandler {
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    pub fn non_blocking<T: AsyncTool + 'static>(tool: T) -> Self {
        Self::NonBlocking(Arc::new(tool))
    }

    /// Run the handler. Returns the value and the elapsed milliseconds.
    ///
    /// A `WardenError` raised by the handler propagates unchanged. Any other
    /// error, and a panic in a blocking handler, becomes
    /// `Tool { kind: ExecutionFailed }` carrying the elapsed time.
    pub async fn invoke(&self, tool_name: &str, arguments: Arguments) -> WardenResult<(Value, u64)> {
        let started = Instant::now();
        let result = match self {
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(arguments)).await {
                    Ok(result) => result,
                    Err(join) => Err(format!("handler panicked: {}", join).into()),
                }
            }
            Self::NonBlocking(tool) => tool.call(arguments).await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => Ok((value, elapsed_ms)),
            Err(e) => Err(into_warden(tool_name, e, elapsed_ms)),
        }
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking(_) => f.write_str("ToolHandler::Blocking"),
            Self::NonBlocking(_) => f.write_str("ToolHandler::NonBlocking"),
        }
    }
}

fn into_warden(tool_name: &str, error: HandlerError, elapsed_ms: u64) -> WardenError {
    match error.downcast::<WardenError>() {
        Ok(domain) => *domain,
        Err(other) => WardenError::Tool {
            tool_name: tool_name.to_string(),
            kind: ToolErrorKind::ExecutionFailed,
            message: other.to_string(),
            elapsed_ms: Some(elapsed_ms),
        },
    }
}
