// Tool trait and the registry that dispatches calls to it

use crate::protocol::{CallToolResult, ToolSchema};
use nefino_sdk::{ErrorKind, NefinoResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with raw arguments, returning the structured result
    async fn execute(&self, arguments: Value) -> NefinoResult<Value>;
}

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool schemas, sorted by name
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool and convert the outcome into a protocol result.
    ///
    /// Every failure, including an unknown tool name, becomes a tool error
    /// result; nothing here can fail the server.
    pub async fn call(&self, name: &str, arguments: Value) -> CallToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "Unknown tool requested");
            return CallToolResult::failure(
                ErrorKind::ValidationError.as_str(),
                format!("unknown tool: {}", name),
            );
        };

        let started = Instant::now();
        match tool.execute(arguments).await {
            Ok(value) => {
                info!(
                    tool = name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool call succeeded"
                );
                CallToolResult::structured(value)
            }
            Err(e) => {
                let kind = e.kind();
                warn!(
                    tool = name,
                    kind = kind.as_str(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool call failed"
                );
                CallToolResult::failure(kind.as_str(), e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
