// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley orchestration core.

use thiserror::Error;

/// The primary error type used across all Parley crates.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// The router deliberately declined to answer (own post, webhook, etc.).
    #[error("not responding")]
    NoResponse,

    /// Admission denied by the bot's channel or user access rules.
    #[error("usage restricted: {0}")]
    UsageRestriction(String),

    /// A stream is already registered for the given post.
    #[error("post {0} is already streaming")]
    AlreadyStreaming(String),

    /// The provider stream stalled longer than the inactivity timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// LLM provider errors (API failure, malformed stream, refusal).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The model kept requesting tools past the recursion cap.
    #[error("too many function calls")]
    TooManyFunctionCalls,

    /// A tool resolver failed.
    #[error("tool {name} failed: {message}")]
    ToolResolve { name: String, message: String },

    /// The model requested a tool that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The requesting user no longer has access to referenced material.
    #[error("permission lost: {0}")]
    PermissionLost(String),

    /// The acting user may not perform the operation on this post.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A reindex job is already running.
    #[error("a reindex job is already running")]
    JobAlreadyRunning,

    /// The reindex job is not in a state that allows the operation.
    #[error("reindex job is not running (status: {0})")]
    JobNotRunning(String),

    /// Storage backend errors (vector store, post metadata, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Host platform API failures.
    #[error("host error: {message}")]
    Host {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid bot, unknown service type).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A named resource (template, bot, post) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a host error without an underlying source.
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the error means "stay silent" rather than "report".
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse)
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("json: {e}"))
    }
}
