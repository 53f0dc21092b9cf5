// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Username of the bot that answers when none is named.
    #[serde(default)]
    pub default_bot: String,

    /// Declared bots, in priority order.
    #[serde(default)]
    pub bots: Vec<BotConfig>,

    #[serde(default)]
    pub embedding_search: EmbeddingSearchConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub inter_plugin: InterPluginConfig,
}

impl ParleyConfig {
    /// Looks up a bot by username.
    pub fn bot(&self, name: &str) -> Option<&BotConfig> {
        self.bots.iter().find(|b| b.name == name)
    }

    /// The configured default bot, or the first bot when unset.
    pub fn default_bot(&self) -> Option<&BotConfig> {
        if self.default_bot.is_empty() {
            return self.bots.first();
        }
        self.bot(&self.default_bot)
    }
}

/// Who may use a bot, per channel or per user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    All,
    Allow,
    Block,
    None,
}

/// A bot identity backed by one LLM service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    #[serde(default)]
    pub id: String,

    /// Username of the bot account on the host.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub custom_instructions: String,

    pub service: ServiceConfig,

    #[serde(default)]
    pub enable_vision: bool,

    #[serde(default)]
    pub disable_tools: bool,

    #[serde(default)]
    pub channel_access_level: AccessLevel,

    #[serde(default)]
    pub channel_ids: Vec<String>,

    #[serde(default)]
    pub user_access_level: AccessLevel,

    #[serde(default)]
    pub user_ids: Vec<String>,

    #[serde(default)]
    pub team_ids: Vec<String>,

    /// Largest attachment, in bytes, passed to the model.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

/// Supported LLM backend families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    #[default]
    OpenAI,
    OpenAICompatible,
    Azure,
    Anthropic,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::OpenAI => "openai",
            ServiceType::OpenAICompatible => "openaicompatible",
            ServiceType::Azure => "azure",
            ServiceType::Anthropic => "anthropic",
        }
    }
}

/// Connection settings for one LLM or embedding backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(rename = "type", default)]
    pub service_type: ServiceType,

    #[serde(default)]
    pub api_key: String,

    /// Base URL; required for `openaicompatible` and `azure`.
    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub org_id: String,

    #[serde(default)]
    pub default_model: String,

    /// Input ceiling in tokens. Zero means the adapter's default.
    #[serde(default)]
    pub input_token_limit: usize,

    /// Output ceiling in tokens. Zero means the adapter's default.
    #[serde(default)]
    pub output_token_limit: u32,

    /// Inactivity timeout for streaming calls. Zero means 10 seconds.
    #[serde(default)]
    pub streaming_timeout_seconds: u64,

    /// Forward the requesting user's ID to the provider.
    #[serde(default)]
    pub send_user_id: bool,

    #[serde(default)]
    pub embedding_model: String,

    #[serde(default)]
    pub embedding_dimensions: usize,
}

impl ServiceConfig {
    pub fn streaming_timeout(&self) -> Duration {
        if self.streaming_timeout_seconds == 0 {
            parley_core::stream::DEFAULT_STREAMING_TIMEOUT
        } else {
            Duration::from_secs(self.streaming_timeout_seconds)
        }
    }
}

/// Text splitting strategy for indexed posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    #[default]
    Sentences,
    Paragraphs,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,

    /// Characters shared between neighbouring chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: i64,

    /// A trailing chunk shorter than this fraction of `chunk_size` is merged
    /// into its predecessor.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: f64,

    #[serde(default)]
    pub strategy: ChunkingStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
            strategy: ChunkingStrategy::default(),
        }
    }
}

fn default_chunk_size() -> i64 {
    1000
}

fn default_chunk_overlap() -> i64 {
    200
}

fn default_min_chunk_size() -> f64 {
    0.25
}

/// Retrieval-augmented search settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingSearchConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Backend used to embed documents and queries.
    #[serde(default)]
    pub provider: ServiceConfig,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default)]
    pub chunking: ChunkingConfig,
}

impl Default for EmbeddingSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ServiceConfig::default(),
            dimensions: default_dimensions(),
            chunking: ChunkingConfig::default(),
        }
    }
}

fn default_dimensions() -> usize {
    1536
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    /// Interval between persisted snapshots of a streaming post, in chunks.
    /// Zero persists only at the end.
    #[serde(default)]
    pub persist_every_chunks: usize,

    /// Maximum AI-to-AI reply depth for posts carrying `activate_ai`.
    #[serde(default = "default_max_ai_hops")]
    pub max_ai_hops: i64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            persist_every_chunks: 0,
            max_ai_hops: default_max_ai_hops(),
        }
    }
}

fn default_max_ai_hops() -> i64 {
    3
}

/// Per-user MCP client pool settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Clients idle longer than this are closed by the sweep.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,

    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_timeout_minutes: default_idle_timeout_minutes(),
            servers: Vec::new(),
        }
    }
}

fn default_idle_timeout_minutes() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Inter-plugin completion API settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterPluginConfig {
    /// Shared secret expected in `X-Parley-Plugin-Secret`. Unset rejects all calls.
    #[serde(default)]
    pub secret: Option<String>,
}
