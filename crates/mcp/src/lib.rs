// MCP (Model Context Protocol) server exposing the Nefino news API as tools
// to agent clients over stdio

pub mod config;
pub mod error;
pub mod health;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::McpServer;

use nefino_sdk::NefinoClient;
use std::sync::Arc;

/// Registry with every tool this server offers
pub fn default_registry(client: NefinoClient) -> tools::ToolRegistry {
    let mut registry = tools::ToolRegistry::new();
    registry.register(Arc::new(tools::GetNewsTool::new(client)));
    registry
}
