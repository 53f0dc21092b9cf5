// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client shared by the chat and embedding adapters.
//!
//! Handles the three endpoint flavours: OpenAI proper, OpenAI-compatible
//! servers at a custom base URL, and Azure OpenAI deployments.

use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use parley_config::model::{ServiceConfig, ServiceType};
use parley_core::ParleyError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatChunk};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const AZURE_API_VERSION: &str = "2024-10-21";

/// One parsed item of a chat completion stream.
#[derive(Debug, Clone)]
pub enum ChunkEvent {
    Chunk(ChatChunk),
    /// The `[DONE]` sentinel.
    Done,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChunkEvent, ParleyError>> + Send>>;

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: reqwest::Client,
    service_type: ServiceType,
    base_url: String,
    max_retries: u32,
}

impl OpenAIClient {
    pub fn new(service: &ServiceConfig) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        match service.service_type {
            ServiceType::Azure => {
                headers.insert("api-key", header_value(&service.api_key, "API key")?);
            }
            _ if !service.api_key.is_empty() => {
                headers.insert(
                    AUTHORIZATION,
                    header_value(&format!("Bearer {}", service.api_key), "API key")?,
                );
            }
            _ => {}
        }
        if !service.org_id.is_empty() {
            headers.insert("OpenAI-Organization", header_value(&service.org_id, "org ID")?);
        }

        let base_url = match (service.service_type, service.api_url.is_empty()) {
            (ServiceType::OpenAI, true) => DEFAULT_API_URL.to_string(),
            (ServiceType::OpenAICompatible | ServiceType::Azure, true) => {
                return Err(ParleyError::Config(format!(
                    "service type {} requires api_url",
                    service.service_type.as_str()
                )));
            }
            _ => service.api_url.trim_end_matches('/').to_string(),
        };

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            service_type: service.service_type,
            base_url,
            max_retries: 1,
        })
    }

    /// URL for `operation` (`chat/completions`, `embeddings`) against `model`.
    pub fn endpoint(&self, operation: &str, model: &str) -> String {
        match self.service_type {
            ServiceType::Azure => format!(
                "{}/openai/deployments/{model}/{operation}?api-version={AZURE_API_VERSION}",
                self.base_url
            ),
            _ => format!("{}/{operation}", self.base_url),
        }
    }

    /// Opens a streaming chat completion.
    pub async fn chat_stream<T: Serialize>(
        &self,
        model: &str,
        request: &T,
    ) -> Result<ChunkStream, ParleyError> {
        let response = self
            .post_with_retry(&self.endpoint("chat/completions", model), request)
            .await?;
        Ok(parse_chunk_stream(response))
    }

    /// Posts a JSON request and decodes a JSON response.
    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        request: &T,
    ) -> Result<R, ParleyError> {
        let response = self.post_with_retry(url, request).await?;
        response.json::<R>().await.map_err(|e| ParleyError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn post_with_retry<T: Serialize>(
        &self,
        url: &str,
        request: &T,
    ) -> Result<reqwest::Response, ParleyError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(url)
                .json(request)
                .send()
                .await
                .map_err(|e| ParleyError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "response received");
            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let error = ParleyError::provider(describe_error(status, &body));
            if matches!(status.as_u16(), 429 | 500 | 502 | 503) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| ParleyError::provider("request failed after retries")))
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, ParleyError> {
    HeaderValue::from_str(value)
        .map_err(|e| ParleyError::Config(format!("invalid {what} header value: {e}")))
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!("OpenAI API error ({status}): {}", api_err.error.describe()),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

/// Parses `data:` lines of a chat completion stream.
pub fn parse_chunk_stream(response: reqwest::Response) -> ChunkStream {
    let mapped = response
        .bytes_stream()
        .eventsource()
        .filter_map(|result| async move {
            match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return None;
                    }
                    if data == "[DONE]" {
                        return Some(Ok(ChunkEvent::Done));
                    }
                    Some(
                        serde_json::from_str::<ChatChunk>(data)
                            .map(ChunkEvent::Chunk)
                            .map_err(|e| ParleyError::Provider {
                                message: format!("failed to parse stream chunk: {e}"),
                                source: Some(Box::new(e)),
                            }),
                    )
                }
                Err(e) => Some(Err(ParleyError::provider(format!("SSE stream error: {e}")))),
            }
        });
    Box::pin(mapped)
}
