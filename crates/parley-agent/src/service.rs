// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The facade the host plugin drives.
//!
//! [`Service`] wires every component from injected adapters and exposes one
//! method per host hook or user action.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use chrono::{TimeZone, Utc};
use parley_config::ConfigStore;
use parley_config::model::ParleyConfig;
use parley_core::host::{Channel, ChatPost, Permission, User};
use parley_core::{
    CompletionRequest, GenerationOptions, HostPlatform, LlmContext, ParleyError, Post,
    ToolCallStatus, TextStream,
};
use parley_llm::ModelFactory;
use parley_prompts::{Prompts, names};
use parley_search::{EmbeddingSearch, JobManager, JobStatus, PostIndexer, SqliteVectorStore};
use parley_storage::{Database, PostMetaStore};
use parley_tools::{BuiltinTools, McpConnector, McpManager, ToolStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::{ChannelAnalysis, ThreadAnalysis, TranscriptSummarizer, channel_posts};
use crate::bots::{Bot, BotRegistry};
use crate::context::{LlmContextBuilder, format_time};
use crate::conversation::{ConversationAssembler, TitleGenerator};
use crate::emoji::EmojiReactor;
use crate::props;
use crate::router::{self, Route};
use crate::streaming::{StreamingCoordinator, StreamingPost};
use crate::tool_calls;

pub const PERMISSION_LOST_MESSAGE_ID: &str = "parley.thread.permission_lost";
pub const PERMISSION_LOST_MESSAGE: &str =
    "Sorry, you no longer have access to the thread this conversation is about.";

/// A completion requested by a sibling plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterPluginRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub bot_username: Option<String>,
    #[serde(rename = "requesterUserID")]
    pub requester_user_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Everything the service needs from its host process.
pub struct ServiceDeps {
    pub host: Arc<dyn HostPlatform>,
    pub config: Arc<ConfigStore>,
    pub factory: Arc<dyn ModelFactory>,
    pub db: Database,
    /// Transport for MCP servers; `None` disables MCP tools.
    pub mcp_connector: Option<Arc<dyn McpConnector>>,
}

pub struct Service {
    host: Arc<dyn HostPlatform>,
    config: Arc<ConfigStore>,
    bots: BotRegistry,
    prompts: Arc<Prompts>,
    contexts: LlmContextBuilder,
    assembler: ConversationAssembler,
    streaming: StreamingCoordinator,
    titles: TitleGenerator,
    transcripts: TranscriptSummarizer,
    emoji: EmojiReactor,
    indexer: Option<PostIndexer>,
    jobs: Option<JobManager>,
    mcp: Option<Arc<McpManager>>,
    mcp_sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("bots", &self.bots)
            .field("streaming", &self.streaming)
            .field("search", &self.indexer.is_some())
            .field("mcp", &self.mcp.is_some())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Wires the components. Bots are not created until [`activate`](Self::activate).
    pub fn new(deps: ServiceDeps) -> Result<Arc<Self>, ParleyError> {
        let ServiceDeps {
            host,
            config,
            factory,
            db,
            mcp_connector,
        } = deps;
        let snapshot = config.snapshot();
        let prompts = Arc::new(Prompts::new()?);

        let search = if snapshot.embedding_search.enabled {
            let search_config = &snapshot.embedding_search;
            let embedder = factory.embedding_provider(search_config)?;
            let store = SqliteVectorStore::new(db.clone(), search_config.dimensions);
            Some(Arc::new(EmbeddingSearch::new(
                Arc::new(store),
                embedder,
                host.clone(),
                search_config.chunking.clone(),
            )))
        } else {
            None
        };

        let mcp = match mcp_connector {
            Some(connector) if snapshot.mcp.enabled => {
                Some(McpManager::new(snapshot.mcp.clone(), connector))
            }
            _ => None,
        };

        let tools = BuiltinTools::new(host.clone(), prompts.clone(), search.clone());
        Ok(Arc::new(Self {
            bots: BotRegistry::new(host.clone(), factory),
            contexts: LlmContextBuilder::new(host.clone(), tools, mcp.clone()),
            assembler: ConversationAssembler::new(host.clone(), prompts.clone()),
            streaming: StreamingCoordinator::new(
                host.clone(),
                snapshot.streaming.persist_every_chunks,
            ),
            titles: TitleGenerator::new(prompts.clone(), PostMetaStore::new(db)),
            transcripts: TranscriptSummarizer::new(prompts.clone()),
            emoji: EmojiReactor::new(host.clone(), prompts.clone()),
            indexer: search
                .clone()
                .map(|s| PostIndexer::new(s, host.clone())),
            jobs: search.map(|s| JobManager::new(host.clone(), s)),
            mcp,
            mcp_sweeper: Mutex::new(None),
            prompts,
            config,
            host,
        }))
    }

    pub fn bots(&self) -> &BotRegistry {
        &self.bots
    }

    pub fn streaming(&self) -> &StreamingCoordinator {
        &self.streaming
    }

    /// Creates the bots, starts the MCP sweep, and follows config updates.
    pub async fn activate(self: &Arc<Self>) -> Result<(), ParleyError> {
        self.bots.ensure_bots(&self.config.snapshot()).await?;
        if let Some(mcp) = &self.mcp {
            *self.mcp_sweeper.lock().unwrap_or_else(|e| e.into_inner()) = Some(mcp.start_sweeper());
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        self.config.register_listener(move |config| {
            let Some(service) = weak.upgrade() else {
                return;
            };
            let config = Arc::clone(config);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = service.on_config_change(&config).await {
                            warn!(error = %e, "applying configuration failed");
                        }
                    });
                }
                Err(_) => warn!("configuration changed outside a runtime; bots not reconciled"),
            }
        });
        info!(bots = self.bots.all().len(), "parley activated");
        Ok(())
    }

    /// Applies a new configuration snapshot.
    pub async fn on_config_change(&self, config: &ParleyConfig) -> Result<(), ParleyError> {
        self.streaming
            .set_persist_every(config.streaming.persist_every_chunks);
        self.bots.ensure_bots(config).await
    }

    /// Stops background work owned by the service.
    pub async fn deactivate(&self) {
        if let Some(mcp) = &self.mcp {
            mcp.close().await;
        }
        let sweeper = self.mcp_sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }
        info!("parley deactivated");
    }

    // --- post hooks ---

    /// Answers a new post when it is addressed to a bot.
    ///
    /// Declined posts fail with [`ParleyError::NoResponse`] and nothing is
    /// written to the host.
    pub async fn handle_message_posted(&self, post: &ChatPost) -> Result<StreamingPost, ParleyError> {
        if let Some(indexer) = &self.indexer {
            indexer.index_post(post, &self.bots.user_ids()).await;
        }

        let result = self.route_and_answer(post).await;
        if let Err(e) = &result
            && e.is_no_response()
        {
            debug!(post_id = %post.id, "not responding");
        }
        result
    }

    async fn route_and_answer(&self, post: &ChatPost) -> Result<StreamingPost, ParleyError> {
        let max_hops = self.config.snapshot().streaming.max_ai_hops;
        let author = self.host.get_user(&post.user_id).await?;
        router::check_filters(post, &author, &self.bots.user_ids(), max_hops)?;

        let channel = self.host.get_channel(&post.channel_id).await?;
        let route = router::route(post, &channel, &self.bots)?;
        let bot = route.bot().clone();
        self.admit(&bot, &channel, &author).await?;

        let context = self.chat_context(&bot, &author, &channel).await?;
        let conversation = match self.assembler.assemble(&context, &bot, post).await {
            Ok(conversation) => conversation,
            Err(e @ ParleyError::PermissionLost(_)) => {
                self.apologize(&bot, &author, post).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let stream = bot
            .model
            .chat_completion(
                CompletionRequest::new(conversation, context.clone()),
                GenerationOptions::default(),
            )
            .await?;

        let mut reply = ChatPost {
            channel_id: channel.id.clone(),
            root_id: post.thread_root().to_string(),
            ..Default::default()
        };
        reply.set_prop(
            props::AI_HOP_COUNT,
            post.prop_i64(props::AI_HOP_COUNT).unwrap_or(0) + 1,
        );
        let streaming = self
            .streaming
            .stream_to_new_post(&bot.user_id, &author.id, stream, reply, &post.id)
            .await?;

        if matches!(route, Route::DirectMessage(_)) && post.root_id.is_empty() {
            let titles = self.titles.clone();
            let model = bot.model.clone();
            let root_id = post.id.clone();
            let message = post.message.clone();
            tokio::spawn(async move {
                titles.generate(model, context, &root_id, &message).await;
            });
        }
        info!(bot = %bot.username(), post_id = %streaming.post.id, "responding");
        Ok(streaming)
    }

    /// Re-indexes an edited post.
    pub async fn handle_message_edited(&self, post: &ChatPost) {
        if let Some(indexer) = &self.indexer {
            indexer.index_post(post, &self.bots.user_ids()).await;
        }
    }

    pub async fn handle_message_deleted(&self, post: &ChatPost) {
        if let Some(indexer) = &self.indexer {
            indexer.delete_post(&post.id).await;
        }
    }

    // --- user actions on bot posts ---

    /// Re-runs the completion that produced a bot post, in place.
    pub async fn regenerate(&self, user_id: &str, post_id: &str) -> Result<StreamingPost, ParleyError> {
        let post = self.host.get_post(post_id).await?;
        if post.prop_flag(props::NO_REGEN) {
            return Err(ParleyError::InvalidInput(format!(
                "post {post_id} cannot be regenerated"
            )));
        }
        tool_calls::ensure_requester(&post, user_id)?;
        let bot = self.bot_for_post(&post)?;
        let user = self.host.get_user(user_id).await?;

        let stream = if let Some(thread_id) = post.prop_str(props::REFERENCED_THREAD) {
            let kind = post
                .prop_str(props::PROMPT_TYPE)
                .unwrap_or(names::SUMMARIZE_THREAD)
                .to_string();
            let root = self.readable_post(&user, thread_id).await?;
            let channel = self.host.get_channel(&root.channel_id).await?;
            self.thread_analysis_stream(&bot, &user, &channel, &root, &kind).await?
        } else {
            let original_id = post.prop_str(props::RESPONDING_TO).ok_or_else(|| {
                ParleyError::InvalidInput(format!("post {post_id} does not answer a post"))
            })?;
            let original = self.host.get_post(original_id).await?;
            let channel = self.host.get_channel(&original.channel_id).await?;
            self.admit(&bot, &channel, &user).await?;
            let context = self.chat_context(&bot, &user, &channel).await?;
            let conversation = self.assembler.assemble(&context, &bot, &original).await?;
            bot.model
                .chat_completion(
                    CompletionRequest::new(conversation, context),
                    GenerationOptions::default(),
                )
                .await?
        };
        self.streaming.stream_to_existing_post(stream, post).await
    }

    /// Stops a generation in progress. Only the requester may stop it.
    pub async fn stop(&self, user_id: &str, post_id: &str) -> Result<(), ParleyError> {
        let post = self.host.get_post(post_id).await?;
        tool_calls::ensure_requester(&post, user_id)?;
        self.streaming.stop_streaming(post_id);
        Ok(())
    }

    /// Applies the requester's decision on a post's pending tool calls.
    ///
    /// Returns the follow-up reply when at least one call succeeded.
    pub async fn handle_tool_call(
        &self,
        user_id: &str,
        post_id: &str,
        accepted: &[String],
    ) -> Result<Option<StreamingPost>, ParleyError> {
        let mut post = self.host.get_post(post_id).await?;
        tool_calls::ensure_requester(&post, user_id)?;
        let bot = self.bot_for_post(&post)?;
        let calls = tool_calls::pending_calls(&post)?;
        let user = self.host.get_user(user_id).await?;
        let channel = self.host.get_channel(&post.channel_id).await?;

        let context = self.chat_context(&bot, &user, &channel).await?;
        let tools = context
            .tools
            .clone()
            .unwrap_or_else(|| Arc::new(ToolStore::new()));
        let accepted: HashSet<String> = accepted.iter().cloned().collect();
        let resolved = tool_calls::resolve_calls(tools.as_ref(), calls, &accepted, &context).await;
        tool_calls::record_calls(&mut post, &resolved)?;
        let post = self.host.update_post(post).await?;

        if !resolved.iter().any(|c| c.status == ToolCallStatus::Success) {
            info!(post_id = %post.id, "no tool call succeeded; conversation ends");
            return Ok(None);
        }

        let conversation = self.assembler.assemble(&context, &bot, &post).await?;
        let stream = bot
            .model
            .chat_completion(
                CompletionRequest::new(conversation, context),
                GenerationOptions::default(),
            )
            .await?;
        let reply = ChatPost {
            channel_id: post.channel_id.clone(),
            root_id: post.thread_root().to_string(),
            ..Default::default()
        };
        let streaming = self
            .streaming
            .stream_to_new_post(&bot.user_id, user_id, stream, reply, &post.id)
            .await?;
        Ok(Some(streaming))
    }

    /// Reacts to a post with a model-chosen emoji.
    pub async fn react(
        &self,
        user_id: &str,
        bot_username: Option<&str>,
        post_id: &str,
    ) -> Result<String, ParleyError> {
        let bot = self.select_bot(bot_username)?;
        let user = self.host.get_user(user_id).await?;
        let post = self.readable_post(&user, post_id).await?;
        let channel = self.host.get_channel(&post.channel_id).await?;
        self.admit(&bot, &channel, &user).await?;
        let context = self
            .contexts
            .context()
            .with_server_info()
            .with_requesting_user(&user)
            .with_channel(&channel)
            .with_bot(&bot)
            .build()
            .await?;
        self.emoji
            .react(bot.model.as_ref(), &context, &bot.user_id, &post)
            .await
    }

    // --- analysis ---

    /// Analyses a thread and streams the result into a DM with the user.
    pub async fn analyze_thread(
        &self,
        user_id: &str,
        bot_username: Option<&str>,
        root_post_id: &str,
        kind: ThreadAnalysis,
    ) -> Result<StreamingPost, ParleyError> {
        let bot = self.select_bot(bot_username)?;
        let user = self.host.get_user(user_id).await?;
        let root = self.readable_post(&user, root_post_id).await?;
        let channel = self.host.get_channel(&root.channel_id).await?;
        self.admit(&bot, &channel, &user).await?;

        let stream = self
            .thread_analysis_stream(&bot, &user, &channel, &root, kind.prompt())
            .await?;
        let mut post = ChatPost::default();
        post.set_prop(props::REFERENCED_THREAD, root.thread_root());
        post.set_prop(props::PROMPT_TYPE, kind.prompt());
        let streaming = self
            .streaming
            .stream_to_new_dm(&bot.user_id, stream, &user.id, post, "")
            .await?;

        let titles = self.titles.clone();
        let root_id = streaming.post.id.clone();
        tokio::spawn(async move {
            titles.save(&root_id, kind.title()).await;
        });
        Ok(streaming)
    }

    async fn thread_analysis_stream(
        &self,
        bot: &Arc<Bot>,
        user: &User,
        channel: &Channel,
        root: &ChatPost,
        prompt: &str,
    ) -> Result<TextStream, ParleyError> {
        let thread = self.assembler.format_thread(root.thread_root()).await?;
        let context = self
            .contexts
            .context()
            .with_server_info()
            .with_requesting_user(user)
            .with_channel(channel)
            .with_bot(bot)
            .with_parameter("thread", thread)
            .build()
            .await?;
        self.analysis_stream(bot, context, prompt).await
    }

    /// Analyses a channel's posts in `[start, end]` (ms; `end == 0` is now)
    /// and streams the result into a DM with the user.
    pub async fn analyze_channel(
        &self,
        user_id: &str,
        bot_username: Option<&str>,
        channel_id: &str,
        kind: ChannelAnalysis,
        start: i64,
        end: i64,
    ) -> Result<StreamingPost, ParleyError> {
        let bot = self.select_bot(bot_username)?;
        let user = self.host.get_user(user_id).await?;
        self.ensure_readable(&user, channel_id).await?;
        let channel = self.host.get_channel(channel_id).await?;
        self.admit(&bot, &channel, &user).await?;

        let posts = channel_posts(self.host.as_ref(), channel_id, start, end).await?;
        let thread = self.assembler.format_posts(&posts).await?;
        let since = Utc
            .timestamp_millis_opt(start)
            .single()
            .map(|t| format_time(t, user.timezone.as_deref()))
            .unwrap_or_default();
        let context = self
            .contexts
            .context()
            .with_server_info()
            .with_requesting_user(&user)
            .with_channel(&channel)
            .with_bot(&bot)
            .with_parameter("thread", thread)
            .with_parameter("since", since)
            .build()
            .await?;
        let stream = self.analysis_stream(&bot, context, kind.prompt()).await?;

        let mut post = ChatPost::default();
        post.set_prop(props::NO_REGEN, "true");
        self.streaming
            .stream_to_new_dm(&bot.user_id, stream, &user.id, post, "")
            .await
    }

    async fn analysis_stream(
        &self,
        bot: &Arc<Bot>,
        context: LlmContext,
        prompt: &str,
    ) -> Result<TextStream, ParleyError> {
        let posts = vec![
            Post::system(self.prompts.format(prompt, &context)?),
            Post::user(self.prompts.format(names::THREAD_USER, &context)?),
        ];
        bot.model
            .chat_completion(CompletionRequest::new(posts, context), GenerationOptions::default())
            .await
    }

    /// Summarizes a meeting transcript as a reply to `transcript_post_id`.
    pub async fn summarize_transcript(
        &self,
        user_id: &str,
        bot_username: Option<&str>,
        transcript_post_id: &str,
        transcript: &str,
    ) -> Result<StreamingPost, ParleyError> {
        let bot = self.select_bot(bot_username)?;
        let user = self.host.get_user(user_id).await?;
        let source = self.readable_post(&user, transcript_post_id).await?;
        let channel = self.host.get_channel(&source.channel_id).await?;
        self.admit(&bot, &channel, &user).await?;

        let context = self
            .contexts
            .context()
            .with_server_info()
            .with_requesting_user(&user)
            .with_channel(&channel)
            .with_bot(&bot)
            .build()
            .await?;
        let stream = self
            .transcripts
            .summarize(bot.model.as_ref(), &context, transcript)
            .await?;

        let mut post = ChatPost {
            channel_id: channel.id.clone(),
            root_id: source.thread_root().to_string(),
            ..Default::default()
        };
        post.set_prop(props::REFERENCED_TRANSCRIPT_POST_ID, source.id.as_str());
        post.set_prop(props::NO_REGEN, "true");
        self.streaming
            .stream_to_new_post(&bot.user_id, &user.id, stream, post, "")
            .await
    }

    // --- inter-plugin API ---

    /// Runs a one-shot completion for a sibling plugin.
    ///
    /// Both prompts are rendered as inline templates with the request
    /// parameters in scope.
    pub async fn inter_plugin_completion(
        &self,
        request: InterPluginRequest,
    ) -> Result<String, ParleyError> {
        let bot = self.select_bot(request.bot_username.as_deref())?;
        let user = self.host.get_user(&request.requester_user_id).await?;
        let context = self
            .contexts
            .context()
            .with_server_info()
            .with_requesting_user(&user)
            .with_bot(&bot)
            .with_parameters(request.parameters)
            .build()
            .await?;
        let posts = vec![
            Post::system(self.prompts.format_inline(&request.system_prompt, &context)?),
            Post::user(self.prompts.format_inline(&request.user_prompt, &context)?),
        ];
        bot.model
            .chat_completion_no_stream(
                CompletionRequest::new(posts, context),
                GenerationOptions::default(),
            )
            .await
    }

    // --- reindex ---

    pub async fn start_reindex(&self, user_id: &str) -> Result<JobStatus, ParleyError> {
        self.ensure_admin(user_id).await?;
        self.jobs()?.start(self.bots.user_ids()).await
    }

    /// Continues a canceled or failed reindex after its last stored post.
    pub async fn resume_reindex(&self, user_id: &str) -> Result<JobStatus, ParleyError> {
        self.ensure_admin(user_id).await?;
        self.jobs()?.resume(self.bots.user_ids()).await
    }

    pub async fn cancel_reindex(&self, user_id: &str) -> Result<JobStatus, ParleyError> {
        self.ensure_admin(user_id).await?;
        self.jobs()?.cancel().await
    }

    pub async fn reindex_status(&self) -> Result<Option<JobStatus>, ParleyError> {
        self.jobs()?.status().await
    }

    /// Waits for the running reindex worker, if any.
    pub async fn wait_for_reindex(&self) {
        if let Some(jobs) = &self.jobs {
            jobs.wait().await;
        }
    }

    fn jobs(&self) -> Result<&JobManager, ParleyError> {
        self.jobs
            .as_ref()
            .ok_or_else(|| ParleyError::Config("embedding search is not enabled".to_string()))
    }

    // --- helpers ---

    async fn ensure_admin(&self, user_id: &str) -> Result<(), ParleyError> {
        if self
            .host
            .has_permission_to(user_id, Permission::ManageSystem)
            .await
        {
            Ok(())
        } else {
            Err(ParleyError::Forbidden(format!(
                "user {user_id} may not manage the search index"
            )))
        }
    }

    fn select_bot(&self, username: Option<&str>) -> Result<Arc<Bot>, ParleyError> {
        match username.filter(|u| !u.is_empty()) {
            Some(name) => self
                .bots
                .by_username(name)
                .ok_or_else(|| ParleyError::NotFound(format!("bot {name}"))),
            None => self
                .bots
                .default_bot()
                .ok_or_else(|| ParleyError::NotFound("no bot is configured".to_string())),
        }
    }

    fn bot_for_post(&self, post: &ChatPost) -> Result<Arc<Bot>, ParleyError> {
        self.bots
            .by_user_id(&post.user_id)
            .ok_or_else(|| ParleyError::InvalidInput(format!("post {} is not a bot post", post.id)))
    }

    async fn ensure_readable(&self, user: &User, channel_id: &str) -> Result<(), ParleyError> {
        if self
            .host
            .has_permission_to_channel(&user.id, channel_id, Permission::ReadChannel)
            .await
        {
            Ok(())
        } else {
            Err(ParleyError::PermissionLost(format!(
                "user {} cannot read channel {channel_id}",
                user.id
            )))
        }
    }

    async fn readable_post(&self, user: &User, post_id: &str) -> Result<ChatPost, ParleyError> {
        let post = self.host.get_post(post_id).await?;
        self.ensure_readable(user, &post.channel_id).await?;
        Ok(post)
    }

    /// Channel and user access rules for `bot`.
    async fn admit(&self, bot: &Bot, channel: &Channel, user: &User) -> Result<(), ParleyError> {
        let mut teams = HashSet::new();
        for team_id in &bot.config.team_ids {
            match self.host.get_team_member(team_id, &user.id).await {
                Ok(Some(member)) if member.delete_at == 0 => {
                    teams.insert(team_id.clone());
                }
                Ok(_) => {}
                Err(e) => debug!(team_id = %team_id, error = %e, "team membership lookup failed"),
            }
        }
        router::check_usage(&bot.config, &channel.id, &user.id, &teams)
    }

    async fn chat_context(
        &self,
        bot: &Arc<Bot>,
        user: &User,
        channel: &Channel,
    ) -> Result<LlmContext, ParleyError> {
        self.contexts
            .context()
            .with_server_info()
            .with_requesting_user(user)
            .with_channel(channel)
            .with_bot(bot)
            .with_default_tools()
            .build()
            .await
    }

    async fn apologize(&self, bot: &Bot, user: &User, post: &ChatPost) {
        let locale = if user.locale.is_empty() {
            self.host.server_settings().await.default_locale
        } else {
            user.locale.clone()
        };
        let mut reply = ChatPost {
            user_id: bot.user_id.clone(),
            channel_id: post.channel_id.clone(),
            root_id: post.thread_root().to_string(),
            message: self
                .host
                .localize(&locale, PERMISSION_LOST_MESSAGE_ID, PERMISSION_LOST_MESSAGE),
            ..Default::default()
        };
        reply.set_prop(props::NO_REGEN, "true");
        if let Err(e) = self.host.create_post(reply).await {
            warn!(post_id = %post.id, error = %e, "posting permission notice failed");
        }
    }
}
