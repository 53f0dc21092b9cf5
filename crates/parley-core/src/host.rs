// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host platform records as seen by the core.
//!
//! These mirror the chat server's post, channel, user, and file objects.
//! Timestamps are Unix milliseconds; `delete_at == 0` means "not deleted".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The default (user-authored) post type.
pub const POST_TYPE_DEFAULT: &str = "";

/// A chat post on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPost {
    pub id: String,
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub root_id: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub post_type: String,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl ChatPost {
    /// The root of the thread this post belongs to.
    pub fn thread_root(&self) -> &str {
        if self.root_id.is_empty() {
            &self.id
        } else {
            &self.root_id
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    /// True for `true` or the string `"true"`.
    pub fn prop_flag(&self, key: &str) -> bool {
        match self.props.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn prop_i64(&self, key: &str) -> Option<i64> {
        match self.props.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn set_prop(&mut self, key: &str, value: impl Into<Value>) {
        self.props.insert(key.to_string(), value.into());
    }

    pub fn remove_prop(&mut self, key: &str) {
        self.props.remove(key);
    }
}

/// Host channel kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub delete_at: i64,
}

impl Channel {
    pub fn is_direct(&self) -> bool {
        self.channel_type == ChannelType::Direct
    }

    /// The two member IDs of a direct channel, parsed from its name.
    pub fn direct_members(&self) -> Option<(&str, &str)> {
        if !self.is_direct() {
            return None;
        }
        self.name.split_once("__")
    }

    /// True when this is a DM and `user_id` is one of its two members.
    pub fn is_direct_with(&self, user_id: &str) -> bool {
        self.direct_members()
            .is_some_and(|(a, b)| a == user_id || b == user_id)
    }
}

/// Builds the canonical name of the direct channel between two users.
pub fn direct_channel_name(user_a: &str, user_b: &str) -> String {
    if user_a < user_b {
        format!("{user_a}__{user_b}")
    } else {
        format!("{user_b}__{user_a}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: String,
    pub user_id: String,
    #[serde(default)]
    pub delete_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub delete_at: i64,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Presence of a user. Custom status text is deliberately not modeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: String,
    pub status: String,
    #[serde(default)]
    pub manual: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub extension: String,
    pub mime_type: String,
    pub size: u64,
}

/// Server-wide settings the core reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub site_name: String,
    pub site_url: String,
    pub default_locale: String,
    pub show_full_name: bool,
    pub show_email_address: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            site_url: String::new(),
            default_locale: "en".to_string(),
            show_full_name: true,
            show_email_address: false,
        }
    }
}

/// Permissions the core checks on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadChannel,
    ViewMembers,
    ManageSystem,
}

/// Scope of a websocket broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
}

impl Broadcast {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            user_id: None,
        }
    }
}

/// A bot account the core asks the host to create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub username: String,
    pub display_name: String,
    pub description: String,
}

/// A request proxied to a sibling plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRequest {
    pub plugin_id: String,
    pub method: String,
    pub path: String,
    /// Acting user, forwarded so the sibling plugin applies its own ACLs.
    pub user_id: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResponse {
    pub status: u16,
    pub body: String,
}

/// Position in the `(create_at, id)` ordering of the host's post store.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostCursor {
    pub create_at: i64,
    pub id: String,
}

/// A post joined with its channel, as read for bulk indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexablePost {
    pub post: ChatPost,
    pub channel: Channel,
}

impl IndexablePost {
    pub fn cursor(&self) -> PostCursor {
        PostCursor {
            create_at: self.post.create_at,
            id: self.post.id.clone(),
        }
    }
}
