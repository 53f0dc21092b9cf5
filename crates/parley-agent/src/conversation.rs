// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns chat threads into model conversations.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::host::{ChatPost, Permission};
use parley_core::{
    CompletionRequest, FileAttachment, GenerationOptions, HostPlatform, LanguageModel, LlmContext,
    ParleyError, Post, ToolCall, ToolCallStatus,
};
use parley_prompts::{Prompts, names};
use parley_storage::PostMetaStore;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bots::Bot;
use crate::props;

/// Output ceiling for generated titles.
pub const TITLE_MAX_TOKENS: u32 = 25;

/// Sorts a thread by creation time and drops everything after `current`.
///
/// `current` itself is excluded; callers append it last.
pub fn cut_thread(mut posts: Vec<ChatPost>, current: &ChatPost) -> Vec<ChatPost> {
    posts.sort_by(|a, b| (a.create_at, &a.id).cmp(&(b.create_at, &b.id)));
    posts.retain(|p| p.create_at <= current.create_at && p.id != current.id);
    posts
}

/// Tool calls recorded on a bot post that already carry a decision.
pub fn resolved_tool_calls(post: &ChatPost) -> Vec<ToolCall> {
    let Some(raw) = post.prop_str(props::PENDING_TOOL_CALL) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<ToolCall>>(raw) {
        Ok(calls) => calls
            .into_iter()
            .filter(|c| c.status != ToolCallStatus::Pending)
            .collect(),
        Err(e) => {
            warn!(post_id = %post.id, error = %e, "unreadable tool call prop");
            Vec::new()
        }
    }
}

/// Builds conversations from host threads.
#[derive(Clone)]
pub struct ConversationAssembler {
    host: Arc<dyn HostPlatform>,
    prompts: Arc<Prompts>,
}

impl std::fmt::Debug for ConversationAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationAssembler").finish_non_exhaustive()
    }
}

impl ConversationAssembler {
    pub fn new(host: Arc<dyn HostPlatform>, prompts: Arc<Prompts>) -> Self {
        Self { host, prompts }
    }

    pub fn prompts(&self) -> &Arc<Prompts> {
        &self.prompts
    }

    /// Assembles the conversation answering `current` in its thread.
    ///
    /// The system turn is the analysis prompt of a referenced thread when the
    /// thread root is a bot analysis post, and the direct message prompt
    /// otherwise. Posts later than `current` are never included.
    pub async fn assemble(
        &self,
        context: &LlmContext,
        bot: &Bot,
        current: &ChatPost,
    ) -> Result<Vec<Post>, ParleyError> {
        let root_id = current.thread_root().to_string();
        let thread = if current.root_id.is_empty() {
            Vec::new()
        } else {
            cut_thread(self.host.get_post_thread(&root_id).await?, current)
        };

        let mut posts = match thread.first().filter(|root| root.id == root_id) {
            Some(root) if root.user_id == bot.user_id && root.prop_str(props::REFERENCED_THREAD).is_some() => {
                self.referenced_analysis(context, root).await?
            }
            _ => vec![Post::system(
                self.prompts.format(names::DIRECT_MESSAGE_QUESTION, context)?,
            )],
        };

        for post in thread.iter().filter(|p| !p.is_deleted()) {
            posts.push(self.to_post(bot, post).await);
        }
        posts.push(self.to_post(bot, current).await);
        Ok(posts)
    }

    /// System and user turns replaying the analysis a root post was made from.
    async fn referenced_analysis(
        &self,
        context: &LlmContext,
        root: &ChatPost,
    ) -> Result<Vec<Post>, ParleyError> {
        let referenced_id = root.prop_str(props::REFERENCED_THREAD).unwrap_or_default();
        let prompt_type = root
            .prop_str(props::PROMPT_TYPE)
            .unwrap_or(names::SUMMARIZE_THREAD);
        let requester = context.requesting_user_id().unwrap_or_default();

        let referenced = self.host.get_post(referenced_id).await?;
        if !self
            .host
            .has_permission_to_channel(requester, &referenced.channel_id, Permission::ReadChannel)
            .await
        {
            return Err(ParleyError::PermissionLost(format!(
                "user {requester} can no longer read thread {referenced_id}"
            )));
        }

        let thread = self.format_thread(&referenced.id).await?;
        let mut analysis = context.clone();
        analysis.parameters.insert("thread".into(), Value::String(thread));
        Ok(vec![
            Post::system(self.prompts.format(prompt_type, &analysis)?),
            Post::user(self.prompts.format(names::THREAD_USER, &analysis)?),
        ])
    }

    async fn to_post(&self, bot: &Bot, post: &ChatPost) -> Post {
        if post.user_id == bot.user_id {
            return Post::assistant(post.message.clone()).with_tool_use(resolved_tool_calls(post));
        }
        let files = if bot.config.enable_vision {
            self.images(post, bot.config.max_file_size).await
        } else {
            Vec::new()
        };
        Post::user(post.message.clone()).with_files(files)
    }

    async fn images(&self, post: &ChatPost, max_size: u64) -> Vec<FileAttachment> {
        let mut files = Vec::new();
        for file_id in &post.file_ids {
            let info = match self.host.get_file_info(file_id).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(file_id = %file_id, error = %e, "file info lookup failed");
                    continue;
                }
            };
            if !info.mime_type.starts_with("image/") || info.size > max_size {
                debug!(file_id = %file_id, size = info.size, "skipping attachment");
                continue;
            }
            match self.host.read_file(file_id).await {
                Ok(data) => files.push(FileAttachment {
                    name: info.name,
                    mime_type: info.mime_type,
                    size: info.size,
                    data,
                }),
                Err(e) => warn!(file_id = %file_id, error = %e, "file read failed"),
            }
        }
        files
    }

    /// Renders a thread as `username: message` lines, oldest first.
    pub async fn format_thread(&self, root_id: &str) -> Result<String, ParleyError> {
        let mut posts = self.host.get_post_thread(root_id).await?;
        posts.sort_by(|a, b| (a.create_at, &a.id).cmp(&(b.create_at, &b.id)));
        self.format_posts(&posts).await
    }

    /// Renders posts as `username: message` lines in the given order,
    /// skipping deleted posts.
    pub async fn format_posts(&self, posts: &[ChatPost]) -> Result<String, ParleyError> {
        let mut usernames: HashMap<String, String> = HashMap::new();
        let mut lines = Vec::with_capacity(posts.len());
        for post in posts.iter().filter(|p| !p.is_deleted()) {
            if !usernames.contains_key(&post.user_id) {
                let name = match self.host.get_user(&post.user_id).await {
                    Ok(user) => user.username,
                    Err(e) => {
                        debug!(user_id = %post.user_id, error = %e, "unknown thread author");
                        "unknown".to_string()
                    }
                };
                usernames.insert(post.user_id.clone(), name);
            }
            let name = usernames.get(&post.user_id).map(String::as_str).unwrap_or("unknown");
            lines.push(format!("{name}: {}", post.message));
        }
        Ok(lines.join("\n"))
    }
}

/// Generates and stores conversation titles.
#[derive(Clone)]
pub struct TitleGenerator {
    prompts: Arc<Prompts>,
    meta: PostMetaStore,
}

impl std::fmt::Debug for TitleGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleGenerator").finish_non_exhaustive()
    }
}

impl TitleGenerator {
    pub fn new(prompts: Arc<Prompts>, meta: PostMetaStore) -> Self {
        Self { prompts, meta }
    }

    /// Asks `model` for a short title of `message` and stores it for
    /// `root_id`. Failures are logged and swallowed.
    pub async fn generate(
        &self,
        model: Arc<dyn LanguageModel>,
        context: LlmContext,
        root_id: &str,
        message: &str,
    ) {
        let title = match self.request_title(model, context, message).await {
            Ok(title) => title,
            Err(e) => {
                warn!(root_id = %root_id, error = %e, "title generation failed");
                return;
            }
        };
        self.save(root_id, &title).await;
    }

    async fn request_title(
        &self,
        model: Arc<dyn LanguageModel>,
        mut context: LlmContext,
        message: &str,
    ) -> Result<String, ParleyError> {
        let system = self.prompts.format(names::TITLE_THREAD, &context)?;
        context.tools = None;
        let request = CompletionRequest::new(vec![Post::system(system), Post::user(message)], context);
        let options = GenerationOptions::default().with_max_generated_tokens(TITLE_MAX_TOKENS);
        let raw = model.chat_completion_no_stream(request, options).await?;
        let title = raw.trim().trim_matches('"').trim().to_string();
        if title.is_empty() {
            return Err(ParleyError::provider("empty title"));
        }
        Ok(title)
    }

    /// Stores a fixed title. Failures are logged and swallowed.
    pub async fn save(&self, root_id: &str, title: &str) {
        if let Err(e) = self.meta.upsert_title(root_id, title).await {
            warn!(root_id = %root_id, error = %e, "saving title failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_test_utils::{MockModel, MockReply};
    use proptest::prelude::*;

    fn post(id: &str, create_at: i64) -> ChatPost {
        ChatPost {
            id: id.into(),
            create_at,
            root_id: "root".into(),
            ..Default::default()
        }
    }

    #[test]
    fn cut_thread_sorts_and_drops_future_posts() {
        let thread = vec![post("c", 30), post("a", 10), post("d", 40), post("b", 20)];
        let current = post("b", 20);
        let ids: Vec<_> = cut_thread(thread, &current).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn resolved_tool_calls_skip_pending() {
        let mut p = post("p", 1);
        let calls = vec![
            ToolCall {
                id: "1".into(),
                name: "a".into(),
                description: String::new(),
                arguments: serde_json::json!({}),
                result: "ok".into(),
                status: ToolCallStatus::Success,
            },
            ToolCall {
                id: "2".into(),
                name: "b".into(),
                description: String::new(),
                arguments: serde_json::json!({}),
                result: String::new(),
                status: ToolCallStatus::Pending,
            },
        ];
        p.set_prop(props::PENDING_TOOL_CALL, serde_json::to_string(&calls).unwrap());
        let resolved = resolved_tool_calls(&p);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "1");
    }

    proptest! {
        #[test]
        fn cut_thread_never_keeps_later_posts(
            times in proptest::collection::vec(0i64..1000, 1..40),
            pick in any::<prop::sample::Index>(),
        ) {
            let thread: Vec<ChatPost> = times
                .iter()
                .enumerate()
                .map(|(i, t)| post(&format!("p{i}"), *t))
                .collect();
            let current = thread[pick.index(thread.len())].clone();
            let kept = cut_thread(thread, &current);
            prop_assert!(kept.iter().all(|p| p.create_at <= current.create_at));
            prop_assert!(kept.iter().all(|p| p.id != current.id));
            prop_assert!(kept.windows(2).all(|w| w[0].create_at <= w[1].create_at));
        }
    }

    async fn titles() -> (TitleGenerator, PostMetaStore) {
        let db = parley_storage::Database::open_in_memory().await.unwrap();
        let meta = PostMetaStore::new(db);
        let prompts = Arc::new(Prompts::new().unwrap());
        (TitleGenerator::new(prompts, meta.clone()), meta)
    }

    #[tokio::test]
    async fn titles_are_trimmed_and_stored() {
        let (titles, meta) = titles().await;
        let model = Arc::new(MockModel::with_replies(vec![MockReply::text(" \"Deploy checklist\" ")]));
        titles
            .generate(model.clone(), LlmContext::default(), "root1", "what do we check before deploys?")
            .await;
        assert_eq!(meta.get_title("root1").await.unwrap().as_deref(), Some("Deploy checklist"));
        assert_eq!(model.options()[0].max_generated_tokens, Some(TITLE_MAX_TOKENS));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failed_title_generation_is_logged() {
        let (titles, meta) = titles().await;
        let model = Arc::new(MockModel::with_replies(vec![MockReply::Error("down".into())]));
        titles
            .generate(model, LlmContext::default(), "root1", "hello")
            .await;
        assert!(meta.get_title("root1").await.unwrap().is_none());
        assert!(logs_contain("title generation failed"));
    }
}
