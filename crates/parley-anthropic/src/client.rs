// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Provides [`AnthropicClient`] which handles request construction,
//! authentication, streaming SSE responses, and transient error retry.

use std::time::Duration;

use parley_core::ParleyError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::sse::{self, SseStream};
use crate::types::{ApiErrorResponse, MessageRequest};

/// Default API base; the client posts to `{base}/messages`.
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1";

const API_VERSION: &str = "2023-06-01";

/// HTTP client for Anthropic API communication.
///
/// Retries once on transient statuses (429, 500, 503, 529) before any byte of
/// the stream has been handed out.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl AnthropicClient {
    /// Creates a client. An empty `api_url` selects [`DEFAULT_API_URL`].
    pub fn new(api_key: &str, api_url: &str) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ParleyError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        // No overall timeout: streams are bounded by the inactivity watchdog.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let base = if api_url.is_empty() {
            DEFAULT_API_URL
        } else {
            api_url
        };

        Ok(Self {
            client,
            endpoint: format!("{}/messages", base.trim_end_matches('/')),
            max_retries: 1,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a streaming request and returns a stream of SSE events.
    pub async fn stream_message(&self, request: &MessageRequest) -> Result<SseStream, ParleyError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying streaming request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
                .map_err(|e| ParleyError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "streaming response received");

            if status.is_success() {
                return Ok(sse::parse_sse_stream(response));
            }

            let body = response.text().await.unwrap_or_default();
            let error = ParleyError::provider(describe_error(status, &body));

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error
            .unwrap_or_else(|| ParleyError::provider("streaming request failed after retries")))
    }
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiContent, ApiMessage};
    use futures::StreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: ApiContent::Text("Hello".into()),
            }],
            system: None,
            max_tokens: 1024,
            stream: true,
            tools: None,
            metadata: None,
        }
    }

    const STOP_ONLY: &str = "event: message_stop\ndata: {}\n\n";

    #[test]
    fn endpoint_defaults_and_trims() {
        let client = AnthropicClient::new("k", "").unwrap();
        assert_eq!(client.endpoint(), "https://api.anthropic.com/v1/messages");
        let client = AnthropicClient::new("k", "http://localhost:9000/v1/").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/v1/messages");
    }

    #[tokio::test]
    async fn sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(STOP_ONLY),
            )
            .mount(&server)
            .await;

        let client = AnthropicClient::new("test-api-key", &format!("{}/v1", server.uri())).unwrap();
        let mut stream = client.stream_message(&test_request()).await.unwrap();
        assert!(stream.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn retries_once_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_error", "message": "Rate limited"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(STOP_ONLY),
            )
            .mount(&server)
            .await;

        let client = AnthropicClient::new("k", &server.uri()).unwrap();
        assert!(client.stream_message(&test_request()).await.is_ok());
    }

    #[tokio::test]
    async fn surfaces_api_error_type_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "Bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new("k", &server.uri()).unwrap();
        let err = client.stream_message(&test_request()).await.err().unwrap();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }
}
