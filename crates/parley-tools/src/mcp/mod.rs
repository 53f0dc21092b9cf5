// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model Context Protocol clients, one set per user.
//!
//! MCP servers run with the credentials of the user they were opened for, so
//! clients are never shared between users. [`McpManager`] owns the per-user
//! clients and closes those left idle.

mod client;
mod manager;

pub use client::{HttpMcpClient, HttpMcpConnector};
pub use manager::{McpManager, McpTool, SWEEP_INTERVAL};

use std::sync::Arc;

use async_trait::async_trait;
use parley_config::model::McpServerConfig;
use parley_core::ParleyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// An open session with one MCP server.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, ParleyError>;

    /// Calls `name` and returns the text content of the result.
    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<String, ParleyError>;

    async fn close(&self);
}

/// Opens MCP sessions.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(
        &self,
        server: &McpServerConfig,
        user_id: &str,
    ) -> Result<Arc<dyn McpClient>, ParleyError>;
}
