use async_trait::async_trait;
use serde_json::json;

use warden_contracts::{
    error::{ToolErrorKind, WardenError, WardenResult},
    oracle::Arguments,
};

use crate::handler::{AsyncTool, HandlerResult, ToolHandler};
use crate::registry::{ToolMetadata, ToolRegistry};

/// Advertised so the oracle can plan around them; every call fails.
struct Placeholder {
    name: &'static str,
}

#[async_trait]
impl AsyncTool for Placeholder {
    async fn call(&self, _arguments: Arguments) -> HandlerResult {
        Err(WardenError::Tool {
            tool_name: self.name.to_string(),
            kind: ToolErrorKind::NotImplemented,
            message: format!("tool '{}' is not yet implemented", self.name),
            elapsed_ms: None,
        }
        .into())
    }
}

pub(super) fn register(registry: &ToolRegistry) -> WardenResult<()> {
    let placeholders = [
        (
            "browser_navigate",
            "Navigate to a URL in the browser",
            json!({
                "type": "object",
                "properties": { "url": { "type": "string", "description": "URL to navigate to" } },
                "required": ["url"]
            }),
        ),
        (
            "browser_click",
            "Click an element on the page",
            json!({
                "type": "object",
                "properties": { "xpath": { "type": "string", "description": "XPath of the element" } },
                "required": ["xpath"]
            }),
        ),
        (
            "search_web",
            "Search the web for information",
            json!({
                "type": "object",
                "properties": { "query": { "type": "string", "description": "Search query" } },
                "required": ["query"]
            }),
        ),
    ];

    for (name, description, schema) in placeholders {
        registry.register(
            name,
            ToolHandler::non_blocking(Placeholder { name }),
            schema,
            ToolMetadata::placeholder(description),
        )?;
    }
    Ok(())
}
