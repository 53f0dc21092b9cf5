// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request [`LlmContext`] construction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parley_core::host::{Channel, User};
use parley_core::{HostPlatform, LlmContext, ParleyError};
use parley_tools::{BuiltinTools, McpManager};
use serde_json::{Map, Value};
use tracing::debug;

use crate::bots::Bot;

const TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Formats `now` as RFC 1123 in `timezone`, falling back to UTC when the
/// zone is unknown or unset.
pub fn format_time(now: DateTime<Utc>, timezone: Option<&str>) -> String {
    match timezone.filter(|tz| !tz.is_empty()).and_then(|tz| tz.parse::<Tz>().ok()) {
        Some(tz) => now.with_timezone(&tz).format(TIME_FORMAT).to_string(),
        None => now.format(TIME_FORMAT).to_string(),
    }
}

/// Shared dependencies for building request contexts.
#[derive(Clone)]
pub struct LlmContextBuilder {
    host: Arc<dyn HostPlatform>,
    tools: BuiltinTools,
    mcp: Option<Arc<McpManager>>,
}

impl std::fmt::Debug for LlmContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmContextBuilder")
            .field("tools", &self.tools)
            .field("mcp", &self.mcp.is_some())
            .finish_non_exhaustive()
    }
}

impl LlmContextBuilder {
    pub fn new(
        host: Arc<dyn HostPlatform>,
        tools: BuiltinTools,
        mcp: Option<Arc<McpManager>>,
    ) -> Self {
        Self { host, tools, mcp }
    }

    /// Starts a context with no modifiers applied.
    pub fn context(&self) -> ContextRequest<'_> {
        ContextRequest {
            builder: self,
            server_info: false,
            user: None,
            channel: None,
            bot: None,
            parameters: Map::new(),
            default_tools: false,
        }
    }
}

/// One context under construction. Modifiers compose in any order.
pub struct ContextRequest<'a> {
    builder: &'a LlmContextBuilder,
    server_info: bool,
    user: Option<User>,
    channel: Option<Channel>,
    bot: Option<Arc<Bot>>,
    parameters: Map<String, Value>,
    default_tools: bool,
}

impl ContextRequest<'_> {
    pub fn with_server_info(mut self) -> Self {
        self.server_info = true;
        self
    }

    pub fn with_requesting_user(mut self, user: &User) -> Self {
        self.user = Some(user.clone());
        self
    }

    /// Sets the channel; its team is looked up at build time.
    pub fn with_channel(mut self, channel: &Channel) -> Self {
        self.channel = Some(channel.clone());
        self
    }

    pub fn with_bot(mut self, bot: &Arc<Bot>) -> Self {
        self.bot = Some(bot.clone());
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Installs the bot's tools.
    ///
    /// Nothing is installed when the bot disables tools. Server search is
    /// offered only in a DM with the bot, and MCP tools only when a
    /// requesting user is known.
    pub fn with_default_tools(mut self) -> Self {
        self.default_tools = true;
        self
    }

    pub async fn build(self) -> Result<LlmContext, ParleyError> {
        let host = &self.builder.host;
        let mut ctx = LlmContext {
            time: format_time(
                Utc::now(),
                self.user.as_ref().and_then(|u| u.timezone.as_deref()),
            ),
            ..Default::default()
        };

        if self.server_info {
            let settings = host.server_settings().await;
            ctx.server_name = settings.site_name;
            ctx.site_url = settings.site_url;
        }

        if let Some(channel) = &self.channel
            && !channel.team_id.is_empty()
        {
            match host.get_team(&channel.team_id).await {
                Ok(team) => ctx.team = Some(team),
                Err(e) => debug!(team_id = %channel.team_id, error = %e, "team lookup failed"),
            }
        }

        if let Some(bot) = &self.bot {
            ctx.bot_name = bot.display_name().to_string();
            ctx.bot_username = bot.username().to_string();
            ctx.bot_user_id = bot.user_id.clone();
            ctx.custom_instructions = bot.config.custom_instructions.clone();

            if self.default_tools && !bot.config.disable_tools {
                let in_bot_dm = self
                    .channel
                    .as_ref()
                    .is_some_and(|c| c.is_direct_with(&bot.user_id));
                let mut store = self.builder.tools.store(in_bot_dm);
                if let (Some(mcp), Some(user)) = (&self.builder.mcp, &self.user) {
                    for tool in mcp.tools_for_user(&user.id).await {
                        store.register(tool);
                    }
                }
                ctx.tools = Some(Arc::new(store));
            }
        }

        ctx.requesting_user = self.user;
        ctx.channel = self.channel;
        ctx.parameters = self.parameters;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_uses_user_timezone() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(
            format_time(now, Some("America/New_York")),
            "Mon, 19 Oct 2026 08:00:00 EDT"
        );
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(format_time(now, Some("Mars/Olympus")), "Mon, 19 Oct 2026 12:00:00 UTC");
        assert_eq!(format_time(now, None), "Mon, 19 Oct 2026 12:00:00 UTC");
    }
}
