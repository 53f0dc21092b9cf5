// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-request context handed to prompt templates, models, and tools.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::host::{Channel, Team, User};
use crate::traits::tools::{ToolResolver, ToolSpec};

/// Everything a prompt template or tool resolver may need to know about the
/// request that produced it.
///
/// Built once by the context builder and never mutated after a model call
/// starts. Serializes into the template context; the tool handle is skipped.
#[derive(Clone, Default, Serialize)]
pub struct LlmContext {
    /// Request time formatted as RFC 1123 in the requesting user's timezone.
    pub time: String,
    pub server_name: String,
    pub site_url: String,
    pub requesting_user: Option<User>,
    pub channel: Option<Channel>,
    pub team: Option<Team>,
    /// Display name of the answering bot.
    pub bot_name: String,
    pub bot_username: String,
    pub bot_user_id: String,
    pub custom_instructions: String,
    /// Free-form template variables.
    pub parameters: Map<String, Value>,
    #[serde(skip)]
    pub tools: Option<Arc<dyn ToolResolver>>,
}

impl LlmContext {
    /// Tool specs visible to the model, empty when no registry is installed.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .as_ref()
            .map(|tools| tools.tool_specs())
            .unwrap_or_default()
    }

    pub fn requesting_user_id(&self) -> Option<&str> {
        self.requesting_user.as_ref().map(|u| u.id.as_str())
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

impl fmt::Debug for LlmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmContext")
            .field("time", &self.time)
            .field("server_name", &self.server_name)
            .field(
                "requesting_user",
                &self.requesting_user.as_ref().map(|u| &u.username),
            )
            .field("channel", &self.channel.as_ref().map(|c| &c.id))
            .field("bot_username", &self.bot_username)
            .field("parameters", &self.parameters)
            .field("tools", &self.tools.is_some())
            .finish()
    }
}
