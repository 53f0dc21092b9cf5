// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile lookup for another user of the server.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::host::Permission;
use parley_core::{HostPlatform, LlmContext, ParleyError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tool::{Tool, parse_args, schema_for, tool_error};

/// Presence values the host reports. Anything else is user-written text.
const KNOWN_STATUSES: &[&str] = &["online", "away", "dnd", "offline"];

#[derive(Debug, Deserialize, JsonSchema)]
struct LookupArgs {
    /// The username of the user to look up, without the leading @.
    username: String,
}

pub struct LookupUser {
    host: Arc<dyn HostPlatform>,
}

impl LookupUser {
    pub fn new(host: Arc<dyn HostPlatform>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Tool for LookupUser {
    fn name(&self) -> &str {
        "LookupMattermostUser"
    }

    fn description(&self) -> &str {
        "Look up a user of the chat server by username. Returns their name, position, and current presence."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<LookupArgs>()
    }

    async fn invoke(&self, arguments: &Value, context: &LlmContext) -> Result<String, ParleyError> {
        let args: LookupArgs = parse_args(self.name(), arguments)?;
        let requester = context
            .requesting_user_id()
            .ok_or_else(|| tool_error(self.name(), "no requesting user"))?;
        if !self
            .host
            .has_permission_to(requester, Permission::ViewMembers)
            .await
        {
            return Err(tool_error(self.name(), "user does not have permission to view members"));
        }

        let username = args.username.trim().trim_start_matches('@');
        let user = self
            .host
            .get_user_by_username(username)
            .await
            .map_err(|_| tool_error(self.name(), format!("user {username} not found")))?;
        let settings = self.host.server_settings().await;

        let mut out = String::new();
        let _ = writeln!(out, "Username: {}", user.username);
        if settings.show_full_name {
            let full_name = user.full_name();
            if !full_name.is_empty() {
                let _ = writeln!(out, "Full Name: {full_name}");
            }
        }
        if settings.show_email_address && !user.email.is_empty() {
            let _ = writeln!(out, "Email: {}", user.email);
        }
        if !user.nickname.is_empty() {
            let _ = writeln!(out, "Nickname: {}", user.nickname);
        }
        if !user.position.is_empty() {
            let _ = writeln!(out, "Position: {}", user.position);
        }
        if !user.locale.is_empty() {
            let _ = writeln!(out, "Locale: {}", user.locale);
        }
        if let Ok(status) = self.host.get_user_status(&user.id).await
            && KNOWN_STATUSES.contains(&status.status.as_str())
        {
            let _ = writeln!(out, "Status: {}", status.status);
        }
        Ok(out.trim_end().to_string())
    }
}
