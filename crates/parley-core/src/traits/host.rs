// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host chat platform as consumed by the core.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ParleyError;
use crate::host::{
    BotIdentity, Broadcast, Channel, ChatPost, FileInfo, IndexablePost, Permission,
    PluginRequest, PluginResponse, PostCursor, ServerSettings, Team, TeamMember, User, UserStatus,
};

/// Capabilities the core requires from the chat server.
///
/// Authorization is never cached by the core; permission and membership
/// checks go through this trait on every request.
#[async_trait]
pub trait HostPlatform: Send + Sync + 'static {
    // --- posts ---

    async fn create_post(&self, post: ChatPost) -> Result<ChatPost, ParleyError>;

    async fn update_post(&self, post: ChatPost) -> Result<ChatPost, ParleyError>;

    async fn get_post(&self, post_id: &str) -> Result<ChatPost, ParleyError>;

    /// Creates `post` in the direct channel between `bot_id` and `user_id`.
    async fn dm(&self, bot_id: &str, user_id: &str, post: ChatPost)
    -> Result<ChatPost, ParleyError>;

    /// Every post of a thread, root included, in any order.
    async fn get_post_thread(&self, root_id: &str) -> Result<Vec<ChatPost>, ParleyError>;

    /// Posts created at or after `since` (ms), oldest first.
    async fn get_posts_since(
        &self,
        channel_id: &str,
        since: i64,
    ) -> Result<Vec<ChatPost>, ParleyError>;

    /// One page of posts older than `post_id`, newest first.
    async fn get_posts_before(
        &self,
        channel_id: &str,
        post_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ChatPost>, ParleyError>;

    async fn add_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        emoji_name: &str,
    ) -> Result<(), ParleyError>;

    // --- files ---

    async fn get_file_info(&self, file_id: &str) -> Result<FileInfo, ParleyError>;

    async fn read_file(&self, file_id: &str) -> Result<Vec<u8>, ParleyError>;

    async fn upload_file(
        &self,
        channel_id: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<FileInfo, ParleyError>;

    // --- users ---

    async fn get_user(&self, user_id: &str) -> Result<User, ParleyError>;

    async fn get_user_by_username(&self, username: &str) -> Result<User, ParleyError>;

    async fn get_user_status(&self, user_id: &str) -> Result<UserStatus, ParleyError>;

    async fn has_permission_to(&self, user_id: &str, permission: Permission) -> bool;

    async fn has_permission_to_channel(
        &self,
        user_id: &str,
        channel_id: &str,
        permission: Permission,
    ) -> bool;

    async fn get_team(&self, team_id: &str) -> Result<Team, ParleyError>;

    async fn get_team_member(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Option<TeamMember>, ParleyError>;

    // --- channels ---

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, ParleyError>;

    async fn get_direct_channel(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Channel, ParleyError>;

    /// Channels `user_id` is currently a member of, deleted channels included.
    async fn get_channels_for_user(&self, user_id: &str) -> Result<Vec<Channel>, ParleyError>;

    // --- bots ---

    /// Creates or updates a bot account, returning its user ID.
    async fn ensure_bot(&self, identity: &BotIdentity) -> Result<String, ParleyError>;

    /// Bot accounts previously created by this plugin.
    async fn list_owned_bots(&self) -> Result<Vec<User>, ParleyError>;

    async fn set_bot_active(&self, user_id: &str, active: bool) -> Result<(), ParleyError>;

    // --- key/value store ---

    async fn kv_get(&self, key: &str) -> Result<Option<Value>, ParleyError>;

    async fn kv_set(&self, key: &str, value: Value) -> Result<(), ParleyError>;

    /// Sets `key` to `value` only if it currently holds `expected`, where
    /// `None` means absent. Returns whether the write happened.
    async fn kv_compare_and_set(
        &self,
        key: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, ParleyError>;

    // --- websocket ---

    async fn publish_websocket_event(
        &self,
        event: &str,
        payload: Map<String, Value>,
        broadcast: Broadcast,
    );

    // --- cluster ---

    /// Blocks until the cluster-wide mutex `key` is held.
    async fn cluster_lock(&self, key: &str) -> Result<(), ParleyError>;

    async fn cluster_unlock(&self, key: &str);

    // --- server ---

    async fn server_settings(&self) -> ServerSettings;

    /// Whether the installation is licensed for more than one bot.
    fn is_multi_bot_licensed(&self) -> bool;

    /// Resolves a message from the host's catalog, falling back to `default`.
    fn localize(&self, _locale: &str, _id: &str, default: &str) -> String {
        default.to_string()
    }

    // --- sibling plugins ---

    async fn plugin_request(&self, request: PluginRequest) -> Result<PluginResponse, ParleyError>;

    // --- bulk reads for indexing ---

    /// Number of posts the indexer would consider, before eligibility rules.
    async fn count_indexable_posts(&self) -> Result<i64, ParleyError>;

    /// Up to `limit` posts strictly after `after` in `(create_at, id)` order.
    async fn get_indexable_posts(
        &self,
        after: Option<&PostCursor>,
        limit: usize,
    ) -> Result<Vec<IndexablePost>, ParleyError>;
}
