// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input-budget truncation around any [`LanguageModel`].

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{CompletionRequest, GenerationOptions, LanguageModel, ParleyError, TextStream};
use tracing::debug;

/// Floor on the truncation budget.
pub const MIN_TOKENS: i64 = 100;

/// Tokens reserved for tool schemas.
pub const FUNCTIONS_TOKEN_BUDGET: i64 = 200;

/// The number of input tokens a request may use against `input_token_limit`.
///
/// Leaves room for tool schemas plus ten percent provider overhead, and never
/// drops below [`MIN_TOKENS`].
pub fn input_budget(input_token_limit: usize) -> usize {
    let limit = i64::try_from(input_token_limit).unwrap_or(i64::MAX);
    let scaled = ((limit - FUNCTIONS_TOKEN_BUDGET) as f64 * 0.9).floor() as i64;
    scaled.max(MIN_TOKENS) as usize
}

/// Truncates every request to [`input_budget`] before delegating.
#[derive(Clone)]
pub struct TruncationWrapper {
    inner: Arc<dyn LanguageModel>,
}

impl TruncationWrapper {
    pub fn new(inner: Arc<dyn LanguageModel>) -> Self {
        Self { inner }
    }

    fn fit(&self, request: &mut CompletionRequest) {
        let budget = input_budget(self.inner.input_token_limit());
        if request.truncate(budget, |text| self.inner.count_tokens(text)) {
            debug!(
                budget,
                remaining_posts = request.posts.len(),
                "truncated completion request"
            );
        }
    }
}

impl std::fmt::Debug for TruncationWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruncationWrapper")
            .field("input_token_limit", &self.inner.input_token_limit())
            .finish()
    }
}

#[async_trait]
impl LanguageModel for TruncationWrapper {
    async fn chat_completion(
        &self,
        mut request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<TextStream, ParleyError> {
        self.fit(&mut request);
        self.inner.chat_completion(request, options).await
    }

    async fn chat_completion_no_stream(
        &self,
        mut request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<String, ParleyError> {
        self.fit(&mut request);
        self.inner.chat_completion_no_stream(request, options).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.inner.count_tokens(text)
    }

    fn input_token_limit(&self) -> usize {
        self.inner.input_token_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{LlmContext, Post};
    use std::sync::Mutex;

    /// Records the posts of every request it receives.
    struct Recorder {
        limit: usize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl LanguageModel for Recorder {
        async fn chat_completion(
            &self,
            request: CompletionRequest,
            _options: GenerationOptions,
        ) -> Result<TextStream, ParleyError> {
            self.seen
                .lock()
                .unwrap()
                .push(request.posts.iter().map(|p| p.message.clone()).collect());
            Ok(TextStream::from_text("ok"))
        }

        fn count_tokens(&self, text: &str) -> usize {
            text.len() / 4
        }

        fn input_token_limit(&self) -> usize {
            self.limit
        }
    }

    #[test]
    fn budget_formula() {
        assert_eq!(input_budget(0), 100);
        assert_eq!(input_budget(200), 100);
        assert_eq!(input_budget(400), 180);
        assert_eq!(input_budget(128_000), 115_020);
    }

    #[tokio::test]
    async fn wrapper_truncates_before_delegating() {
        let recorder = Arc::new(Recorder {
            limit: 0,
            seen: Mutex::new(Vec::new()),
        });
        let wrapper = TruncationWrapper::new(recorder.clone());

        let posts = vec![
            Post::user("a".repeat(400)),
            Post::assistant("b".repeat(400)),
            Post::user("c".repeat(40)),
        ];
        let text = wrapper
            .chat_completion_no_stream(
                CompletionRequest::new(posts, LlmContext::default()),
                GenerationOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(text, "ok");

        let seen = recorder.seen.lock().unwrap();
        // Budget 100: "c" costs 10, "b" is cut to its last 90 tokens, "a" is dropped.
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0], "b".repeat(360));
        assert_eq!(seen[0][1], "c".repeat(40));
    }

    #[tokio::test]
    async fn wrapper_passes_small_requests_through() {
        let recorder = Arc::new(Recorder {
            limit: 10_000,
            seen: Mutex::new(Vec::new()),
        });
        let wrapper = TruncationWrapper::new(recorder.clone());
        wrapper
            .chat_completion(
                CompletionRequest::new(vec![Post::user("hello")], LlmContext::default()),
                GenerationOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(recorder.seen.lock().unwrap()[0], vec!["hello".to_string()]);
        assert_eq!(wrapper.input_token_limit(), 10_000);
    }
}
