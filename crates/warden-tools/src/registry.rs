//! `ToolRegistry`: the name to handler map and its dispatch pipeline.
//!
//! `execute` runs, in order:
//!
//! 1. lookup (`Tool { kind: UnknownTool }` if absent)
//! 2. argument schema check (`Validation`)
//! 3. the security gate (`Security`)
//! 4. the handler, timed
//!
//! The registry holds no task state. Entries are cloned out of the lock
//! before the handler runs, so registration never waits on a running tool.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use warden_contracts::{
    error::{ToolErrorKind, WardenError, WardenResult},
    oracle::{Arguments, ToolSpec},
};
use warden_core::traits::{SecurityGate, ToolDispatcher, ToolOutput};

use crate::handler::ToolHandler;
use crate::schema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolMetadata {
    pub description: String,
    /// False for placeholders that always fail with `NotImplemented`.
    pub implemented: bool,
}

impl ToolMetadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            implemented: true,
        }
    }

    pub fn placeholder(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            implemented: false,
        }
    }
}

/// Everything the registry knows about one tool, for listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub schema: Value,
    #[serde(flatten)]
    pub metadata: ToolMetadata,
}

struct Entry {
    handler: ToolHandler,
    schema: Value,
    validator: Validator,
    metadata: ToolMetadata,
}

pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<Entry>>>,
    gate: Arc<dyn SecurityGate>,
}

impl ToolRegistry {
    /// An empty registry that checks every call with `gate`.
    pub fn new(gate: Arc<dyn SecurityGate>) -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            gate,
        }
    }

    /// Register `handler` under `name`, replacing any existing entry.
    ///
    /// Fails with `Validation { field: "schema" }` when `schema` is not an
    /// object schema with `type` and `properties` or does not compile.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: ToolHandler,
        schema: Value,
        metadata: ToolMetadata,
    ) -> WardenResult<()> {
        let name = name.into();
        let validator = schema::compile(&schema)?;
        let entry = Arc::new(Entry {
            handler,
            schema,
            validator,
            metadata,
        });

        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.insert(name.clone(), entry).is_some() {
            warn!(tool = %name, "replacing existing tool registration");
        } else {
            debug!(tool = %name, "tool registered");
        }
        Ok(())
    }

    /// Returns whether `name` was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        if removed {
            debug!(tool = %name, "tool unregistered");
        }
        removed
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn schema_for(&self, name: &str) -> Option<Value> {
        self.read().get(name).map(|e| e.schema.clone())
    }

    pub fn info(&self, name: &str) -> Option<ToolInfo> {
        self.read().get(name).map(|e| ToolInfo {
            name: name.to_string(),
            schema: e.schema.clone(),
            metadata: e.metadata.clone(),
        })
    }

    /// `info` for every tool, sorted by name.
    pub fn infos(&self) -> Vec<ToolInfo> {
        self.read()
            .iter()
            .map(|(name, e)| ToolInfo {
                name: name.clone(),
                schema: e.schema.clone(),
                metadata: e.metadata.clone(),
            })
            .collect()
    }

    /// Run the full pipeline for one call.
    pub async fn execute(&self, name: &str, arguments: Arguments) -> WardenResult<ToolOutput> {
        let entry = self.read().get(name).cloned().ok_or_else(|| WardenError::Tool {
            tool_name: name.to_string(),
            kind: ToolErrorKind::UnknownTool,
            message: format!("tool '{}' is not registered", name),
            elapsed_ms: None,
        })?;

        schema::check_arguments(&entry.schema, &entry.validator, &arguments)?;
        self.gate.check_tool_call(name, &arguments)?;

        debug!(tool = %name, "dispatching tool call");
        match entry.handler.invoke(name, arguments).await {
            Ok((value, duration_ms)) => {
                debug!(tool = %name, duration_ms, "tool call succeeded");
                Ok(ToolOutput { value, duration_ms })
            }
            Err(e) => {
                debug!(tool = %name, error = %e, "tool call failed");
                Err(e)
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<Entry>>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.read()
            .iter()
            .map(|(name, e)| ToolSpec {
                name: name.clone(),
                description: e.metadata.description.clone(),
                input_schema: e.schema.clone(),
            })
            .collect()
    }

    fn tool_names(&self) -> Vec<String> {
        self.list()
    }

    async fn execute(&self, name: &str, arguments: Arguments) -> WardenResult<ToolOutput> {
        ToolRegistry::execute(self, name, arguments).await
    }
}
