// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streams model output into live-updating chat posts.
//!
//! At most one stream is registered per post ID. Every pump publishes a
//! `start` control event, one `next` event per text chunk carrying the full
//! message so far, and exactly one closing control event (`end`, `cancel`,
//! or `tool_call`).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::host::{Broadcast, ChatPost};
use parley_core::{HostPlatform, ParleyError, StreamEvent, TextStream, ToolCallStatus};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::props;

/// Websocket event carrying stream updates.
pub const POST_UPDATE_EVENT: &str = "postupdate";

pub const NO_RESULT_MESSAGE_ID: &str = "parley.stream.no_result";
pub const NO_RESULT_MESSAGE: &str = "Sorry! The LLM did not return a result.";
pub const GENERIC_ERROR_MESSAGE_ID: &str = "parley.stream.generic_error";
pub const GENERIC_ERROR_MESSAGE: &str =
    "Sorry! An error occurred while accessing the LLM. See server logs for details.";

/// Control values of a `postupdate` event.
pub mod control {
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const CANCEL: &str = "cancel";
    pub const TOOL_CALL: &str = "tool_call";
}

/// A post with a running pump.
#[derive(Debug)]
pub struct StreamingPost {
    /// The post as created, before any output was written.
    pub post: ChatPost,
    task: JoinHandle<ChatPost>,
}

impl StreamingPost {
    /// Waits for the pump to finish and returns the post as last persisted.
    pub async fn wait(self) -> Result<ChatPost, ParleyError> {
        self.task
            .await
            .map_err(|e| ParleyError::Internal(format!("stream task failed: {e}")))
    }
}

/// Owns the live streams, keyed by post ID.
#[derive(Clone)]
pub struct StreamingCoordinator {
    host: Arc<dyn HostPlatform>,
    contexts: Arc<DashMap<String, CancellationToken>>,
    persist_every: Arc<AtomicUsize>,
}

impl std::fmt::Debug for StreamingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCoordinator")
            .field("active", &self.contexts.len())
            .finish_non_exhaustive()
    }
}

impl StreamingCoordinator {
    /// `persist_every` is the snapshot interval in chunks; zero persists only
    /// at the end of the stream.
    pub fn new(host: Arc<dyn HostPlatform>, persist_every: usize) -> Self {
        Self {
            host,
            contexts: Arc::new(DashMap::new()),
            persist_every: Arc::new(AtomicUsize::new(persist_every)),
        }
    }

    pub fn set_persist_every(&self, chunks: usize) {
        self.persist_every.store(chunks, Ordering::Relaxed);
    }

    /// Creates `post` as the bot in its channel and streams into it.
    pub async fn stream_to_new_post(
        &self,
        bot_id: &str,
        requester_id: &str,
        stream: TextStream,
        mut post: ChatPost,
        responding_to: &str,
    ) -> Result<StreamingPost, ParleyError> {
        post.user_id = bot_id.to_string();
        post.set_prop(props::REQUESTER, requester_id);
        if !responding_to.is_empty() {
            post.set_prop(props::RESPONDING_TO, responding_to);
        }
        let created = self.host.create_post(post).await?;
        self.start(bot_id, requester_id, stream, created).await
    }

    /// Creates `post` in the DM between the bot and `user_id` and streams
    /// into it.
    pub async fn stream_to_new_dm(
        &self,
        bot_id: &str,
        stream: TextStream,
        user_id: &str,
        mut post: ChatPost,
        responding_to: &str,
    ) -> Result<StreamingPost, ParleyError> {
        post.set_prop(props::REQUESTER, user_id);
        if !responding_to.is_empty() {
            post.set_prop(props::RESPONDING_TO, responding_to);
        }
        let created = self.host.dm(bot_id, user_id, post).await?;
        self.start(bot_id, user_id, stream, created).await
    }

    /// Clears an existing bot post and streams fresh output into it.
    pub async fn stream_to_existing_post(
        &self,
        stream: TextStream,
        mut post: ChatPost,
    ) -> Result<StreamingPost, ParleyError> {
        let token = self.get_streaming_context(&post.id)?;
        post.message.clear();
        post.remove_prop(props::PENDING_TOOL_CALL);
        let post_id = post.id.clone();
        let post = match self.host.update_post(post).await {
            Ok(post) => post,
            Err(e) => {
                self.finish_streaming(&post_id);
                return Err(e);
            }
        };
        let requester = post.prop_str(props::REQUESTER).unwrap_or_default().to_string();
        let locale = self.locale_for(&post.user_id, &requester, &post.channel_id).await;
        Ok(self.spawn_pump(stream, post, token, locale))
    }

    async fn start(
        &self,
        bot_id: &str,
        requester_id: &str,
        stream: TextStream,
        post: ChatPost,
    ) -> Result<StreamingPost, ParleyError> {
        let token = self.get_streaming_context(&post.id)?;
        let locale = self.locale_for(bot_id, requester_id, &post.channel_id).await;
        Ok(self.spawn_pump(stream, post, token, locale))
    }

    fn spawn_pump(
        &self,
        stream: TextStream,
        post: ChatPost,
        token: CancellationToken,
        locale: String,
    ) -> StreamingPost {
        let pump = Pump {
            host: self.host.clone(),
            contexts: self.contexts.clone(),
            persist_every: self.persist_every.load(Ordering::Relaxed),
            locale,
        };
        let initial = post.clone();
        let task = tokio::spawn(pump.run(stream, post, token));
        StreamingPost {
            post: initial,
            task,
        }
    }

    /// Cancels the stream writing to `post_id`, if any.
    pub fn stop_streaming(&self, post_id: &str) {
        if let Some(token) = self.contexts.get(post_id) {
            token.cancel();
        }
    }

    /// Registers a stream for `post_id`.
    ///
    /// Fails with [`ParleyError::AlreadyStreaming`] while another stream owns
    /// the post.
    pub fn get_streaming_context(&self, post_id: &str) -> Result<CancellationToken, ParleyError> {
        match self.contexts.entry(post_id.to_string()) {
            Entry::Occupied(_) => Err(ParleyError::AlreadyStreaming(post_id.to_string())),
            Entry::Vacant(slot) => {
                let token = CancellationToken::new();
                slot.insert(token.clone());
                Ok(token)
            }
        }
    }

    pub fn finish_streaming(&self, post_id: &str) {
        self.contexts.remove(post_id);
    }

    pub fn is_streaming(&self, post_id: &str) -> bool {
        self.contexts.contains_key(post_id)
    }

    /// The requester's locale in a DM between the bot and the requester,
    /// the server default otherwise.
    async fn locale_for(&self, bot_id: &str, requester_id: &str, channel_id: &str) -> String {
        let default = self.host.server_settings().await.default_locale;
        let Ok(channel) = self.host.get_channel(channel_id).await else {
            return default;
        };
        let private = channel.direct_members().is_some_and(|(a, b)| {
            (a == bot_id && b == requester_id) || (a == requester_id && b == bot_id)
        });
        if !private {
            return default;
        }
        match self.host.get_user(requester_id).await {
            Ok(user) if !user.locale.is_empty() => user.locale,
            _ => default,
        }
    }
}

struct Pump {
    host: Arc<dyn HostPlatform>,
    contexts: Arc<DashMap<String, CancellationToken>>,
    persist_every: usize,
    locale: String,
}

impl Pump {
    async fn run(self, mut stream: TextStream, mut post: ChatPost, token: CancellationToken) -> ChatPost {
        self.control(&post, control::START, None).await;
        let mut chunks = 0usize;

        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(post_id = %post.id, "stream canceled");
                    post = self.persist(post).await;
                    self.control(&post, control::CANCEL, None).await;
                    break;
                }
                event = stream.recv() => event,
            };

            match event {
                Some(StreamEvent::Text(chunk)) => {
                    post.message.push_str(&chunk);
                    self.next(&post).await;
                    chunks += 1;
                    if self.persist_every > 0 && chunks % self.persist_every == 0 {
                        post = self.persist(post).await;
                    }
                }
                Some(StreamEvent::End) | None => {
                    if post.message.trim().is_empty() {
                        post.message =
                            self.host
                                .localize(&self.locale, NO_RESULT_MESSAGE_ID, NO_RESULT_MESSAGE);
                        self.next(&post).await;
                    }
                    post = self.persist(post).await;
                    self.control(&post, control::END, None).await;
                    break;
                }
                Some(StreamEvent::Error(e)) => {
                    error!(post_id = %post.id, error = %e, "model stream failed");
                    post.message =
                        self.host
                            .localize(&self.locale, GENERIC_ERROR_MESSAGE_ID, GENERIC_ERROR_MESSAGE);
                    self.next(&post).await;
                    post = self.persist(post).await;
                    self.control(&post, control::END, None).await;
                    break;
                }
                Some(StreamEvent::ToolCalls(mut calls)) => {
                    for call in &mut calls {
                        call.status = ToolCallStatus::Pending;
                    }
                    let encoded = match serde_json::to_string(&calls) {
                        Ok(encoded) => encoded,
                        Err(e) => {
                            error!(post_id = %post.id, error = %e, "encoding tool calls failed");
                            String::from("[]")
                        }
                    };
                    post.set_prop(props::PENDING_TOOL_CALL, encoded.clone());
                    post = self.persist(post).await;
                    self.control(&post, control::TOOL_CALL, Some(encoded)).await;
                    break;
                }
            }
        }

        self.contexts.remove(&post.id);
        post
    }

    async fn persist(&self, post: ChatPost) -> ChatPost {
        match self.host.update_post(post.clone()).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "persisting streamed post failed");
                post
            }
        }
    }

    async fn next(&self, post: &ChatPost) {
        let mut payload = Map::new();
        payload.insert("post_id".into(), Value::String(post.id.clone()));
        payload.insert("next".into(), Value::String(post.message.clone()));
        self.host
            .publish_websocket_event(POST_UPDATE_EVENT, payload, Broadcast::channel(&post.channel_id))
            .await;
    }

    async fn control(&self, post: &ChatPost, control: &str, tool_call: Option<String>) {
        let mut payload = Map::new();
        payload.insert("post_id".into(), Value::String(post.id.clone()));
        payload.insert("control".into(), Value::String(control.to_string()));
        if let Some(tool_call) = tool_call {
            payload.insert("tool_call".into(), Value::String(tool_call));
        }
        self.host
            .publish_websocket_event(POST_UPDATE_EVENT, payload, Broadcast::channel(&post.channel_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{ToolCall, ToolCallStatus};
    use parley_test_utils::MockHost;
    use serde_json::json;

    fn setup() -> (Arc<MockHost>, StreamingCoordinator) {
        let host = Arc::new(MockHost::new());
        host.add_open_channel("c1", "t1", "town-square");
        let coordinator = StreamingCoordinator::new(host.clone(), 0);
        (host, coordinator)
    }

    fn reply() -> ChatPost {
        ChatPost {
            channel_id: "c1".into(),
            ..Default::default()
        }
    }

    fn controls(host: &MockHost, post_id: &str) -> Vec<String> {
        host.events()
            .into_iter()
            .filter(|e| e.payload["post_id"] == post_id)
            .filter_map(|e| e.payload.get("control").and_then(Value::as_str).map(String::from))
            .collect()
    }

    #[test]
    fn one_stream_per_post() {
        let (_host, coordinator) = setup();
        coordinator.get_streaming_context("p1").unwrap();
        assert!(matches!(
            coordinator.get_streaming_context("p1"),
            Err(ParleyError::AlreadyStreaming(_))
        ));
        coordinator.finish_streaming("p1");
        coordinator.stop_streaming("p1");
        coordinator.stop_streaming("p1");
        coordinator.finish_streaming("p1");
        assert!(coordinator.get_streaming_context("p1").is_ok());
    }

    #[tokio::test]
    async fn text_is_broadcast_and_persisted() {
        let (host, coordinator) = setup();
        let stream = TextStream::from_events(vec![
            StreamEvent::Text("Hel".into()),
            StreamEvent::Text("lo".into()),
            StreamEvent::End,
        ]);
        let streaming = coordinator
            .stream_to_new_post("bot1", "alice", stream, reply(), "p0")
            .await
            .unwrap();
        let id = streaming.post.id.clone();
        let done = streaming.wait().await.unwrap();

        assert_eq!(done.message, "Hello");
        let stored = host.post(&id).unwrap();
        assert_eq!(stored.message, "Hello");
        assert_eq!(stored.user_id, "bot1");
        assert_eq!(stored.prop_str(props::REQUESTER), Some("alice"));
        assert_eq!(stored.prop_str(props::RESPONDING_TO), Some("p0"));

        let nexts: Vec<String> = host
            .events()
            .into_iter()
            .filter_map(|e| e.payload.get("next").and_then(Value::as_str).map(String::from))
            .collect();
        assert_eq!(nexts, vec!["Hel", "Hello"]);
        assert_eq!(controls(&host, &id), vec![control::START, control::END]);
        assert!(host
            .events()
            .iter()
            .all(|e| e.event == POST_UPDATE_EVENT && e.broadcast == Broadcast::channel("c1")));
        assert!(!coordinator.is_streaming(&id));
    }

    #[tokio::test]
    async fn empty_output_gets_a_notice() {
        let (host, coordinator) = setup();
        let streaming = coordinator
            .stream_to_new_post("bot1", "alice", TextStream::from_text("  "), reply(), "")
            .await
            .unwrap();
        let id = streaming.post.id.clone();
        streaming.wait().await.unwrap();
        assert_eq!(host.post(&id).unwrap().message, NO_RESULT_MESSAGE);
    }

    #[tokio::test]
    async fn provider_errors_replace_the_message() {
        let (host, coordinator) = setup();
        let stream = TextStream::from_events(vec![
            StreamEvent::Text("partial".into()),
            StreamEvent::Error(ParleyError::provider("boom")),
        ]);
        let streaming = coordinator
            .stream_to_new_post("bot1", "alice", stream, reply(), "")
            .await
            .unwrap();
        let id = streaming.post.id.clone();
        streaming.wait().await.unwrap();
        assert_eq!(host.post(&id).unwrap().message, GENERIC_ERROR_MESSAGE);
        assert_eq!(controls(&host, &id).last().map(String::as_str), Some(control::END));
    }

    #[tokio::test]
    async fn tool_calls_pause_the_stream() {
        let (host, coordinator) = setup();
        let call = ToolCall {
            id: "call-1".into(),
            name: "LookupMattermostUser".into(),
            description: String::new(),
            arguments: json!({"username": "bob"}),
            result: String::new(),
            status: ToolCallStatus::Success,
        };
        let stream = TextStream::from_events(vec![StreamEvent::ToolCalls(vec![call])]);
        let streaming = coordinator
            .stream_to_new_post("bot1", "alice", stream, reply(), "")
            .await
            .unwrap();
        let id = streaming.post.id.clone();
        streaming.wait().await.unwrap();

        let stored = host.post(&id).unwrap();
        let calls: Vec<ToolCall> =
            serde_json::from_str(stored.prop_str(props::PENDING_TOOL_CALL).unwrap()).unwrap();
        assert_eq!(calls[0].status, ToolCallStatus::Pending);
        assert_eq!(controls(&host, &id), vec![control::START, control::TOOL_CALL]);
        let event = host
            .events()
            .into_iter()
            .find(|e| e.payload.get("control") == Some(&json!(control::TOOL_CALL)))
            .unwrap();
        assert!(event.payload["tool_call"].as_str().unwrap().contains("call-1"));
    }

    #[tokio::test]
    async fn stop_persists_partial_output() {
        let (host, coordinator) = setup();
        let (sender, stream) = TextStream::channel();
        assert!(sender.text("partial").await);
        let streaming = coordinator
            .stream_to_new_post("bot1", "alice", stream, reply(), "")
            .await
            .unwrap();
        let id = streaming.post.id.clone();

        while !host.events().iter().any(|e| e.payload.contains_key("next")) {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            coordinator.get_streaming_context(&id),
            Err(ParleyError::AlreadyStreaming(_))
        ));
        coordinator.stop_streaming(&id);
        streaming.wait().await.unwrap();

        assert_eq!(host.post(&id).unwrap().message, "partial");
        assert_eq!(controls(&host, &id), vec![control::START, control::CANCEL]);
        assert!(sender.is_closed());
        coordinator.stop_streaming(&id);
    }

    #[tokio::test]
    async fn snapshots_are_persisted_every_n_chunks() {
        let (host, _) = setup();
        let coordinator = StreamingCoordinator::new(host.clone(), 2);
        let (sender, stream) = TextStream::channel();
        let streaming = coordinator
            .stream_to_new_post("bot1", "alice", stream, reply(), "")
            .await
            .unwrap();
        let id = streaming.post.id.clone();
        sender.text("a").await;
        sender.text("b").await;
        while host.post(&id).unwrap().message != "ab" {
            tokio::task::yield_now().await;
        }
        sender.end().await;
        streaming.wait().await.unwrap();
        assert_eq!(host.post(&id).unwrap().message, "ab");
    }

    #[tokio::test]
    async fn dm_locale_follows_the_requester() {
        let host = Arc::new(MockHost::new());
        host.add_user(parley_core::host::User {
            id: "alice".into(),
            username: "alice".into(),
            locale: "de".into(),
            ..Default::default()
        });
        let coordinator = StreamingCoordinator::new(host.clone(), 0);
        let streaming = coordinator
            .stream_to_new_dm("bot1", TextStream::from_text("hi"), "alice", ChatPost::default(), "")
            .await
            .unwrap();
        let channel = host.channel(&streaming.post.channel_id).unwrap();
        assert!(channel.is_direct_with("alice"));
        assert_eq!(coordinator.locale_for("bot1", "alice", &channel.id).await, "de");
        assert_eq!(coordinator.locale_for("bot1", "bob", &channel.id).await, "en");
        streaming.wait().await.unwrap();
    }
}
