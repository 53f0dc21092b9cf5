// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory chat server implementing [`HostPlatform`].
//!
//! State lives behind one mutex. Builder-style `add_*` methods seed it and
//! accessor methods let tests inspect what the core wrote.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use parley_core::ParleyError;
use parley_core::host::{
    BotIdentity, Broadcast, Channel, ChannelType, ChatPost, FileInfo, IndexablePost, Permission,
    PluginRequest, PluginResponse, PostCursor, ServerSettings, Team, TeamMember, User, UserStatus,
    direct_channel_name,
};
use parley_core::traits::HostPlatform;
use serde_json::{Map, Value};
use tokio::sync::Notify;

/// A websocket event as published by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub event: String,
    pub payload: Map<String, Value>,
    pub broadcast: Broadcast,
}

#[derive(Debug, Default)]
struct State {
    posts: HashMap<String, ChatPost>,
    channels: HashMap<String, Channel>,
    channel_members: HashSet<(String, String)>,
    users: HashMap<String, User>,
    statuses: HashMap<String, UserStatus>,
    teams: HashMap<String, Team>,
    team_members: HashMap<(String, String), TeamMember>,
    permissions: HashSet<(String, Permission)>,
    files: HashMap<String, (FileInfo, Vec<u8>)>,
    kv: HashMap<String, Value>,
    events: Vec<PublishedEvent>,
    reactions: Vec<(String, String, String)>,
    owned_bots: Vec<String>,
    plugin_responses: HashMap<(String, String), PluginResponse>,
    plugin_requests: Vec<PluginRequest>,
    held_locks: HashSet<String>,
    fail_updates: bool,
}

#[derive(Debug)]
pub struct MockHost {
    state: Mutex<State>,
    settings: Mutex<ServerSettings>,
    clock: AtomicI64,
    licensed: AtomicBool,
    lock_released: Notify,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            settings: Mutex::new(ServerSettings {
                site_name: "Test Server".into(),
                site_url: "https://chat.example.com".into(),
                ..Default::default()
            }),
            clock: AtomicI64::new(1_000),
            licensed: AtomicBool::new(true),
            lock_released: Notify::new(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    // --- seeding ---

    pub fn add_user(&self, user: User) {
        self.state().users.insert(user.id.clone(), user);
    }

    /// Adds a plain user with the given ID and username.
    pub fn add_simple_user(&self, id: &str, username: &str) {
        self.add_user(User {
            id: id.into(),
            username: username.into(),
            ..Default::default()
        });
    }

    pub fn add_team(&self, team: Team) {
        self.state().teams.insert(team.id.clone(), team);
    }

    pub fn add_team_member(&self, team_id: &str, user_id: &str) {
        self.state().team_members.insert(
            (team_id.into(), user_id.into()),
            TeamMember {
                team_id: team_id.into(),
                user_id: user_id.into(),
                delete_at: 0,
            },
        );
    }

    pub fn add_channel(&self, channel: Channel) {
        self.state().channels.insert(channel.id.clone(), channel);
    }

    /// Adds an open channel in `team_id`.
    pub fn add_open_channel(&self, id: &str, team_id: &str, name: &str) {
        self.add_channel(Channel {
            id: id.into(),
            team_id: team_id.into(),
            name: name.into(),
            display_name: name.into(),
            channel_type: ChannelType::Open,
            delete_at: 0,
        });
    }

    /// Creates the direct channel between two users and adds both as members.
    pub fn add_direct_channel(&self, id: &str, user_a: &str, user_b: &str) -> Channel {
        let channel = Channel {
            id: id.into(),
            team_id: String::new(),
            name: direct_channel_name(user_a, user_b),
            display_name: String::new(),
            channel_type: ChannelType::Direct,
            delete_at: 0,
        };
        self.add_channel(channel.clone());
        self.add_channel_member(id, user_a);
        self.add_channel_member(id, user_b);
        channel
    }

    pub fn add_channel_member(&self, channel_id: &str, user_id: &str) {
        self.state()
            .channel_members
            .insert((channel_id.into(), user_id.into()));
    }

    pub fn remove_channel_member(&self, channel_id: &str, user_id: &str) {
        self.state()
            .channel_members
            .remove(&(channel_id.to_string(), user_id.to_string()));
    }

    pub fn grant(&self, user_id: &str, permission: Permission) {
        self.state()
            .permissions
            .insert((user_id.into(), permission));
    }

    /// Inserts a post verbatim, keeping its ID and timestamps.
    pub fn insert_post(&self, post: ChatPost) {
        self.state().posts.insert(post.id.clone(), post);
    }

    pub fn add_file(&self, info: FileInfo, data: Vec<u8>) {
        self.state().files.insert(info.id.clone(), (info, data));
    }

    pub fn set_status(&self, status: UserStatus) {
        self.state().statuses.insert(status.user_id.clone(), status);
    }

    pub fn set_plugin_response(&self, plugin_id: &str, path: &str, response: PluginResponse) {
        self.state()
            .plugin_responses
            .insert((plugin_id.into(), path.into()), response);
    }

    pub fn set_settings(&self, settings: ServerSettings) {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn set_licensed(&self, licensed: bool) {
        self.licensed.store(licensed, Ordering::SeqCst);
    }

    /// Makes `update_post` fail, to exercise persistence errors.
    pub fn set_fail_updates(&self, fail: bool) {
        self.state().fail_updates = fail;
    }

    pub fn kv_put(&self, key: &str, value: Value) {
        self.state().kv.insert(key.into(), value);
    }

    // --- inspection ---

    pub fn post(&self, post_id: &str) -> Option<ChatPost> {
        self.state().posts.get(post_id).cloned()
    }

    /// All posts in `channel_id`, oldest first.
    pub fn channel_posts(&self, channel_id: &str) -> Vec<ChatPost> {
        let mut posts: Vec<ChatPost> = self
            .state()
            .posts
            .values()
            .filter(|p| p.channel_id == channel_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| (a.create_at, &a.id).cmp(&(b.create_at, &b.id)));
        posts
    }

    /// All posts authored by `user_id`, oldest first.
    pub fn posts_by(&self, user_id: &str) -> Vec<ChatPost> {
        let mut posts: Vec<ChatPost> = self
            .state()
            .posts
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| (a.create_at, &a.id).cmp(&(b.create_at, &b.id)));
        posts
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.state().events.clone()
    }

    pub fn reactions(&self) -> Vec<(String, String, String)> {
        self.state().reactions.clone()
    }

    pub fn plugin_requests(&self) -> Vec<PluginRequest> {
        self.state().plugin_requests.clone()
    }

    pub fn kv(&self, key: &str) -> Option<Value> {
        self.state().kv.get(key).cloned()
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.state().users.get(user_id).cloned()
    }

    pub fn channel(&self, channel_id: &str) -> Option<Channel> {
        self.state().channels.get(channel_id).cloned()
    }

    pub fn owned_bot_ids(&self) -> Vec<String> {
        self.state().owned_bots.clone()
    }

    fn direct_channel(&self, user_a: &str, user_b: &str) -> Channel {
        let name = direct_channel_name(user_a, user_b);
        let existing = self
            .state()
            .channels
            .values()
            .find(|c| c.name == name)
            .cloned();
        match existing {
            Some(channel) => channel,
            None => self.add_direct_channel(&new_id(), user_a, user_b),
        }
    }
}

#[async_trait]
impl HostPlatform for MockHost {
    async fn create_post(&self, mut post: ChatPost) -> Result<ChatPost, ParleyError> {
        if post.id.is_empty() {
            post.id = new_id();
        }
        if post.create_at == 0 {
            post.create_at = self.tick();
        }
        self.state().posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    async fn update_post(&self, mut post: ChatPost) -> Result<ChatPost, ParleyError> {
        let mut state = self.state();
        if state.fail_updates {
            return Err(ParleyError::host("update rejected"));
        }
        if !state.posts.contains_key(&post.id) {
            return Err(ParleyError::NotFound(format!("post {}", post.id)));
        }
        post.update_at = self.tick();
        state.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    async fn get_post(&self, post_id: &str) -> Result<ChatPost, ParleyError> {
        self.post(post_id)
            .ok_or_else(|| ParleyError::NotFound(format!("post {post_id}")))
    }

    async fn dm(&self, bot_id: &str, user_id: &str, mut post: ChatPost) -> Result<ChatPost, ParleyError> {
        let channel = self.direct_channel(bot_id, user_id);
        post.channel_id = channel.id;
        post.user_id = bot_id.to_string();
        self.create_post(post).await
    }

    async fn get_post_thread(&self, root_id: &str) -> Result<Vec<ChatPost>, ParleyError> {
        Ok(self
            .state()
            .posts
            .values()
            .filter(|p| p.id == root_id || p.root_id == root_id)
            .cloned()
            .collect())
    }

    async fn get_posts_since(&self, channel_id: &str, since: i64) -> Result<Vec<ChatPost>, ParleyError> {
        Ok(self
            .channel_posts(channel_id)
            .into_iter()
            .filter(|p| p.create_at >= since)
            .collect())
    }

    async fn get_posts_before(
        &self,
        channel_id: &str,
        post_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ChatPost>, ParleyError> {
        let pivot = self.get_post(post_id).await?;
        let mut older: Vec<ChatPost> = self
            .channel_posts(channel_id)
            .into_iter()
            .filter(|p| (p.create_at, &p.id) < (pivot.create_at, &pivot.id))
            .collect();
        older.reverse();
        Ok(older.into_iter().skip(page * per_page).take(per_page).collect())
    }

    async fn add_reaction(&self, post_id: &str, user_id: &str, emoji_name: &str) -> Result<(), ParleyError> {
        self.state()
            .reactions
            .push((post_id.into(), user_id.into(), emoji_name.into()));
        Ok(())
    }

    async fn get_file_info(&self, file_id: &str) -> Result<FileInfo, ParleyError> {
        self.state()
            .files
            .get(file_id)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| ParleyError::NotFound(format!("file {file_id}")))
    }

    async fn read_file(&self, file_id: &str) -> Result<Vec<u8>, ParleyError> {
        self.state()
            .files
            .get(file_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| ParleyError::NotFound(format!("file {file_id}")))
    }

    async fn upload_file(&self, _channel_id: &str, name: &str, data: Vec<u8>) -> Result<FileInfo, ParleyError> {
        let info = FileInfo {
            id: new_id(),
            name: name.into(),
            extension: name.rsplit_once('.').map(|(_, e)| e.to_string()).unwrap_or_default(),
            mime_type: "application/octet-stream".into(),
            size: data.len() as u64,
        };
        self.add_file(info.clone(), data);
        Ok(info)
    }

    async fn get_user(&self, user_id: &str) -> Result<User, ParleyError> {
        self.user(user_id)
            .ok_or_else(|| ParleyError::NotFound(format!("user {user_id}")))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, ParleyError> {
        self.state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| ParleyError::NotFound(format!("user @{username}")))
    }

    async fn get_user_status(&self, user_id: &str) -> Result<UserStatus, ParleyError> {
        Ok(self
            .state()
            .statuses
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserStatus {
                user_id: user_id.into(),
                status: "online".into(),
                manual: false,
            }))
    }

    async fn has_permission_to(&self, user_id: &str, permission: Permission) -> bool {
        self.state()
            .permissions
            .contains(&(user_id.to_string(), permission))
    }

    async fn has_permission_to_channel(&self, user_id: &str, channel_id: &str, permission: Permission) -> bool {
        let state = self.state();
        match permission {
            Permission::ReadChannel => state
                .channel_members
                .contains(&(channel_id.to_string(), user_id.to_string())),
            other => state.permissions.contains(&(user_id.to_string(), other)),
        }
    }

    async fn get_team(&self, team_id: &str) -> Result<Team, ParleyError> {
        self.state()
            .teams
            .get(team_id)
            .cloned()
            .ok_or_else(|| ParleyError::NotFound(format!("team {team_id}")))
    }

    async fn get_team_member(&self, team_id: &str, user_id: &str) -> Result<Option<TeamMember>, ParleyError> {
        Ok(self
            .state()
            .team_members
            .get(&(team_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, ParleyError> {
        self.state()
            .channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| ParleyError::NotFound(format!("channel {channel_id}")))
    }

    async fn get_direct_channel(&self, user_a: &str, user_b: &str) -> Result<Channel, ParleyError> {
        Ok(self.direct_channel(user_a, user_b))
    }

    async fn get_channels_for_user(&self, user_id: &str) -> Result<Vec<Channel>, ParleyError> {
        let state = self.state();
        Ok(state
            .channel_members
            .iter()
            .filter(|(_, member)| member == user_id)
            .filter_map(|(channel_id, _)| state.channels.get(channel_id).cloned())
            .collect())
    }

    async fn ensure_bot(&self, identity: &BotIdentity) -> Result<String, ParleyError> {
        let mut state = self.state();
        let existing = state
            .users
            .values()
            .find(|u| u.username == identity.username)
            .map(|u| u.id.clone());
        let id = match existing {
            Some(id) => id,
            None => {
                let id = new_id();
                state.users.insert(
                    id.clone(),
                    User {
                        id: id.clone(),
                        username: identity.username.clone(),
                        is_bot: true,
                        ..Default::default()
                    },
                );
                id
            }
        };
        if let Some(user) = state.users.get_mut(&id) {
            user.nickname = identity.display_name.clone();
            user.is_bot = true;
            user.delete_at = 0;
        }
        if !state.owned_bots.contains(&id) {
            state.owned_bots.push(id.clone());
        }
        Ok(id)
    }

    async fn list_owned_bots(&self) -> Result<Vec<User>, ParleyError> {
        let state = self.state();
        Ok(state
            .owned_bots
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn set_bot_active(&self, user_id: &str, active: bool) -> Result<(), ParleyError> {
        let mut state = self.state();
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| ParleyError::NotFound(format!("user {user_id}")))?;
        user.delete_at = if active { 0 } else { 1 };
        Ok(())
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Value>, ParleyError> {
        Ok(self.kv(key))
    }

    async fn kv_set(&self, key: &str, value: Value) -> Result<(), ParleyError> {
        self.kv_put(key, value);
        Ok(())
    }

    async fn kv_compare_and_set(
        &self,
        key: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, ParleyError> {
        let mut state = self.state();
        if state.kv.get(key) != expected {
            return Ok(false);
        }
        state.kv.insert(key.into(), value);
        Ok(true)
    }

    async fn publish_websocket_event(&self, event: &str, payload: Map<String, Value>, broadcast: Broadcast) {
        self.state().events.push(PublishedEvent {
            event: event.into(),
            payload,
            broadcast,
        });
    }

    async fn cluster_lock(&self, key: &str) -> Result<(), ParleyError> {
        loop {
            let released = self.lock_released.notified();
            if self.state().held_locks.insert(key.to_string()) {
                return Ok(());
            }
            released.await;
        }
    }

    async fn cluster_unlock(&self, key: &str) {
        self.state().held_locks.remove(key);
        self.lock_released.notify_waiters();
    }

    async fn server_settings(&self) -> ServerSettings {
        self.settings.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn is_multi_bot_licensed(&self) -> bool {
        self.licensed.load(Ordering::SeqCst)
    }

    async fn plugin_request(&self, request: PluginRequest) -> Result<PluginResponse, ParleyError> {
        let mut state = self.state();
        let response = state
            .plugin_responses
            .get(&(request.plugin_id.clone(), request.path.clone()))
            .cloned();
        state.plugin_requests.push(request.clone());
        response.ok_or_else(|| ParleyError::NotFound(format!("plugin {}", request.plugin_id)))
    }

    async fn count_indexable_posts(&self) -> Result<i64, ParleyError> {
        Ok(self.state().posts.len() as i64)
    }

    async fn get_indexable_posts(
        &self,
        after: Option<&PostCursor>,
        limit: usize,
    ) -> Result<Vec<IndexablePost>, ParleyError> {
        let state = self.state();
        let mut posts: Vec<&ChatPost> = state
            .posts
            .values()
            .filter(|p| {
                after.is_none_or(|cursor| {
                    (p.create_at, p.id.as_str()) > (cursor.create_at, cursor.id.as_str())
                })
            })
            .collect();
        posts.sort_by(|a, b| (a.create_at, &a.id).cmp(&(b.create_at, &b.id)));
        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let channel = state.channels.get(&post.channel_id)?.clone();
                Some(IndexablePost {
                    post: post.clone(),
                    channel,
                })
            })
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dm_reuses_the_direct_channel() {
        let host = MockHost::new();
        let first = host.dm("bot", "alice", ChatPost::default()).await.unwrap();
        let second = host.dm("bot", "alice", ChatPost::default()).await.unwrap();
        assert_eq!(first.channel_id, second.channel_id);
        let channel = host.get_channel(&first.channel_id).await.unwrap();
        assert!(channel.is_direct_with("alice"));
        assert!(second.create_at > first.create_at);
    }

    #[tokio::test]
    async fn indexable_posts_page_by_cursor() {
        let host = MockHost::new();
        host.add_open_channel("c1", "t1", "town-square");
        for (id, at) in [("b", 5), ("a", 5), ("c", 7)] {
            host.insert_post(ChatPost {
                id: id.into(),
                create_at: at,
                channel_id: "c1".into(),
                message: id.into(),
                ..Default::default()
            });
        }
        let first = host.get_indexable_posts(None, 2).await.unwrap();
        let ids: Vec<_> = first.iter().map(|p| p.post.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let rest = host
            .get_indexable_posts(Some(&first[1].cursor()), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].post.id, "c");
    }

    #[tokio::test]
    async fn cluster_lock_excludes_second_holder() {
        let host = std::sync::Arc::new(MockHost::new());
        host.cluster_lock("k").await.unwrap();
        let waiter = {
            let host = host.clone();
            tokio::spawn(async move { host.cluster_lock("k").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        host.cluster_unlock("k").await;
        waiter.await.unwrap().unwrap();
    }
}
