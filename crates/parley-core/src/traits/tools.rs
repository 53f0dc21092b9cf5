// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tool registry seam between models and tool implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::LlmContext;
use crate::error::ParleyError;

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub schema: serde_json::Value,
}

/// Lists and resolves tools for one request.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    fn tool_specs(&self) -> Vec<ToolSpec>;

    /// Runs the named tool. Unknown names fail with [`ParleyError::UnknownTool`].
    async fn resolve_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        context: &LlmContext,
    ) -> Result<String, ParleyError>;
}
