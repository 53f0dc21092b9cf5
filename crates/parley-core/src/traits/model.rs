// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language model trait implemented by every provider adapter.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::stream::TextStream;
use crate::types::CompletionRequest;

/// Per-call generation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// Overrides the service's default model.
    pub model: Option<String>,
    pub max_generated_tokens: Option<u32>,
    /// Overrides the bot's vision setting.
    pub enable_vision: Option<bool>,
    /// Ask for a JSON object response.
    pub json_output: bool,
}

impl GenerationOptions {
    pub fn with_max_generated_tokens(mut self, tokens: u32) -> Self {
        self.max_generated_tokens = Some(tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Starts a streaming generation.
    async fn chat_completion(
        &self,
        request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<TextStream, ParleyError>;

    /// Aggregates [`chat_completion`](Self::chat_completion) into one string.
    async fn chat_completion_no_stream(
        &self,
        request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<String, ParleyError> {
        self.chat_completion(request, options).await?.read_all().await
    }

    /// Approximate token count, monotone non-decreasing in length.
    fn count_tokens(&self, text: &str) -> usize;

    /// Model-specific input ceiling.
    fn input_token_limit(&self) -> usize;
}
