// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted language model for deterministic testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_config::model::{BotConfig, EmbeddingSearchConfig};
use parley_core::{
    CompletionRequest, EmbeddingProvider, GenerationOptions, LanguageModel, ParleyError,
    StreamEvent, TextStream, ToolCall,
};
use parley_llm::ModelFactory;

use crate::mock_embedder::MockEmbedder;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Streams the text in the given pieces, then ends.
    Chunks(Vec<String>),
    ToolCalls(Vec<ToolCall>),
    /// Fails the stream with a provider error.
    Error(String),
    /// Streams the pieces and then never finishes.
    Stall(Vec<String>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Chunks(vec![text.into()])
    }
}

/// A language model that replays queued replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty the model
/// answers `"mock response"`. Every request is recorded with its options.
#[derive(Debug)]
pub struct MockModel {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<(CompletionRequest, GenerationOptions)>>,
    input_token_limit: usize,
}

impl MockModel {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            requests: Mutex::new(Vec::new()),
            input_token_limit: 128_000,
        }
    }

    pub fn with_input_token_limit(mut self, limit: usize) -> Self {
        self.input_token_limit = limit;
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn options(&self) -> Vec<GenerationOptions> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockReply::text("mock response"))
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn chat_completion(
        &self,
        request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<TextStream, ParleyError> {
        self.requests.lock().unwrap().push((request, options));
        let stream = match self.next_reply() {
            MockReply::Chunks(chunks) => {
                let mut events: Vec<StreamEvent> =
                    chunks.into_iter().map(StreamEvent::Text).collect();
                events.push(StreamEvent::End);
                TextStream::from_events(events)
            }
            MockReply::ToolCalls(calls) => {
                TextStream::from_events(vec![StreamEvent::ToolCalls(calls)])
            }
            MockReply::Error(message) => {
                TextStream::from_events(vec![StreamEvent::Error(ParleyError::provider(message))])
            }
            MockReply::Stall(chunks) => {
                let (sender, stream) = TextStream::channel();
                tokio::spawn(async move {
                    for chunk in chunks {
                        if !sender.text(chunk).await {
                            return;
                        }
                    }
                    sender.closed().await;
                });
                stream
            }
        };
        Ok(stream)
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }

    fn input_token_limit(&self) -> usize {
        self.input_token_limit
    }
}

/// Hands out the same [`MockModel`] for every bot.
#[derive(Debug, Clone)]
pub struct MockModelFactory {
    pub model: Arc<MockModel>,
    pub embedder: Arc<MockEmbedder>,
}

impl MockModelFactory {
    pub fn new(model: Arc<MockModel>) -> Self {
        Self {
            model,
            embedder: Arc::new(MockEmbedder::new(16)),
        }
    }
}

impl ModelFactory for MockModelFactory {
    fn chat_model(&self, _bot: &BotConfig) -> Result<Arc<dyn LanguageModel>, ParleyError> {
        Ok(self.model.clone())
    }

    fn embedding_provider(
        &self,
        _config: &EmbeddingSearchConfig,
    ) -> Result<Arc<dyn EmbeddingProvider>, ParleyError> {
        Ok(self.embedder.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{LlmContext, Post};

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![Post::user("hi")], LlmContext::default())
    }

    #[tokio::test]
    async fn replies_in_order_then_default() {
        let model = MockModel::with_replies(vec![
            MockReply::Chunks(vec!["a".into(), "b".into()]),
            MockReply::Error("boom".into()),
        ]);
        let opts = GenerationOptions::default();
        assert_eq!(
            model.chat_completion_no_stream(request(), opts.clone()).await.unwrap(),
            "ab"
        );
        assert!(model.chat_completion_no_stream(request(), opts.clone()).await.is_err());
        assert_eq!(
            model.chat_completion_no_stream(request(), opts).await.unwrap(),
            "mock response"
        );
        assert_eq!(model.request_count(), 3);
    }

    #[tokio::test]
    async fn stall_keeps_stream_open() {
        let model = MockModel::with_replies(vec![MockReply::Stall(vec!["x".into()])]);
        let mut stream = model
            .chat_completion(request(), GenerationOptions::default())
            .await
            .unwrap();
        assert!(matches!(stream.recv().await, Some(StreamEvent::Text(_))));
        let next = tokio::time::timeout(std::time::Duration::from_millis(50), stream.recv()).await;
        assert!(next.is_err());
    }
}
