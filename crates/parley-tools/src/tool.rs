// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and store.
//!
//! Argument schemas are generated from typed structs with `schemars`, and
//! arguments are deserialized into the same structs before a tool runs, so
//! the schema the model sees and the parser that checks its output cannot
//! drift apart.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{LlmContext, ParleyError, ToolResolver, ToolSpec};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, as presented to the model.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Runs the tool on behalf of the requesting user in `context`.
    async fn invoke(&self, arguments: &Value, context: &LlmContext) -> Result<String, ParleyError>;
}

/// JSON Schema for `T`, without the `$schema` and `title` keys.
pub fn schema_for<T: JsonSchema>() -> Value {
    let mut value = Value::from(schemars::schema_for!(T));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

/// Deserializes tool arguments, mapping failures to [`ParleyError::ToolResolve`].
pub fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ParleyError> {
    serde_json::from_value(arguments.clone()).map_err(|e| ParleyError::ToolResolve {
        name: tool.to_string(),
        message: format!("invalid arguments: {e}"),
    })
}

pub(crate) fn tool_error(tool: &str, message: impl Into<String>) -> ParleyError {
    ParleyError::ToolResolve {
        name: tool.to_string(),
        message: message.into(),
    }
}

/// The tools available to one request, indexed by name.
#[derive(Default, Clone)]
pub struct ToolStore {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

impl ToolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolResolver for ToolStore {
    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                schema: t.parameters_schema(),
            })
            .collect()
    }

    async fn resolve_tool(
        &self,
        name: &str,
        arguments: &Value,
        context: &LlmContext,
    ) -> Result<String, ParleyError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ParleyError::UnknownTool(name.to_string()))?;
        tool.invoke(arguments, context).await
    }
}
