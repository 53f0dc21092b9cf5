// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API adapter for Parley.
//!
//! [`AnthropicModel`] implements [`LanguageModel`] over the streaming Messages
//! endpoint. Each call spawns one pump task that owns the HTTP response and
//! forwards events into a [`TextStream`]; dropping the stream aborts the
//! request.

pub mod client;
pub mod convert;
pub mod sse;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::ServiceConfig;
use parley_core::stream::{MAX_FUNCTION_CALLS, next_within};
use parley_core::{
    CompletionRequest, GenerationOptions, LanguageModel, ParleyError, StreamSender, TextStream,
    ToolCall, ToolCallStatus,
};
use tracing::{debug, info, warn};

use crate::client::AnthropicClient;
use crate::sse::{SseEvent, SseStream};
use crate::types::{
    MessageRequest, RequestMetadata, ResponseContentBlock, SseDelta, ToolDefinition,
};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_INPUT_TOKEN_LIMIT: usize = 200_000;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic chat backend configured from a [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct AnthropicModel {
    client: AnthropicClient,
    default_model: String,
    input_token_limit: usize,
    output_token_limit: u32,
    streaming_timeout: Duration,
    send_user_id: bool,
    enable_vision: bool,
}

impl AnthropicModel {
    pub fn new(service: &ServiceConfig, enable_vision: bool) -> Result<Self, ParleyError> {
        let client = AnthropicClient::new(&service.api_key, &service.api_url)?;
        let default_model = if service.default_model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            service.default_model.clone()
        };

        info!(model = %default_model, endpoint = client.endpoint(), "Anthropic model initialized");

        Ok(Self {
            client,
            default_model,
            input_token_limit: if service.input_token_limit == 0 {
                DEFAULT_INPUT_TOKEN_LIMIT
            } else {
                service.input_token_limit
            },
            output_token_limit: if service.output_token_limit == 0 {
                DEFAULT_MAX_TOKENS
            } else {
                service.output_token_limit
            },
            streaming_timeout: service.streaming_timeout(),
            send_user_id: service.send_user_id,
            enable_vision,
        })
    }

    /// Builds the wire request for `request`.
    pub fn to_message_request(
        &self,
        request: &CompletionRequest,
        options: &GenerationOptions,
    ) -> MessageRequest {
        let vision = options.enable_vision.unwrap_or(self.enable_vision);
        let (system, messages) = convert::to_api_messages(&request.posts, vision);

        if options.json_output {
            debug!("Anthropic has no JSON response mode; relying on the prompt");
        }

        let tools: Vec<ToolDefinition> = request
            .context
            .tool_specs()
            .into_iter()
            .map(|spec| ToolDefinition {
                name: spec.name,
                description: spec.description,
                input_schema: spec.schema,
            })
            .collect();

        let metadata = self
            .send_user_id
            .then(|| request.context.requesting_user_id())
            .flatten()
            .map(|id| RequestMetadata {
                user_id: id.to_string(),
            });

        MessageRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages,
            system,
            max_tokens: options
                .max_generated_tokens
                .unwrap_or(self.output_token_limit),
            stream: true,
            tools: (!tools.is_empty()).then_some(tools),
            metadata,
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn chat_completion(
        &self,
        request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<TextStream, ParleyError> {
        let api_request = self.to_message_request(&request, &options);
        let prior_tool_turns = request.trailing_tool_turns();
        let client = self.client.clone();
        let timeout = self.streaming_timeout;

        let (sender, stream) = TextStream::channel();
        tokio::spawn(async move {
            let opened = tokio::select! {
                _ = sender.closed() => return,
                opened = tokio::time::timeout(timeout, client.stream_message(&api_request)) => opened,
            };
            match opened {
                Ok(Ok(events)) => pump(events, sender, timeout, prior_tool_turns).await,
                Ok(Err(e)) => {
                    warn!(error = %e, "Anthropic request failed");
                    sender.error(e).await;
                }
                Err(_) => sender.error(ParleyError::Timeout { duration: timeout }).await,
            }
        });
        Ok(stream)
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }

    fn input_token_limit(&self) -> usize {
        self.input_token_limit
    }
}

/// Forwards SSE events into `sender` until a terminal event is produced.
///
/// Tool-use blocks are buffered by content index and emitted together once
/// the message stops with `stop_reason = "tool_use"`.
async fn pump(mut events: SseStream, sender: StreamSender, timeout: Duration, prior_tool_turns: usize) {
    // index -> (id, name, accumulated input JSON)
    let mut pending: BTreeMap<usize, (String, String, String)> = BTreeMap::new();
    let mut calls: Vec<ToolCall> = Vec::new();
    let mut stop_reason: Option<String> = None;

    loop {
        let next = tokio::select! {
            _ = sender.closed() => {
                debug!("consumer dropped the stream, aborting Anthropic request");
                return;
            }
            next = next_within(&mut events, timeout) => next,
        };

        let event = match next {
            Ok(Some(Ok(event))) => event,
            Ok(Some(Err(e))) => {
                sender.error(e).await;
                return;
            }
            Ok(None) => {
                sender
                    .error(ParleyError::provider("stream ended before message_stop"))
                    .await;
                return;
            }
            Err(e) => {
                warn!(timeout = ?timeout, "Anthropic stream stalled");
                sender.error(e).await;
                return;
            }
        };

        match event {
            SseEvent::ContentBlockStart(start) => {
                if let ResponseContentBlock::ToolUse { id, name, .. } = start.content_block {
                    pending.insert(start.index, (id, name, String::new()));
                }
            }
            SseEvent::ContentBlockDelta(delta) => match delta.delta {
                SseDelta::TextDelta { text } => {
                    if !sender.text(text).await {
                        return;
                    }
                }
                SseDelta::InputJsonDelta { partial_json } => {
                    if let Some((_, _, json)) = pending.get_mut(&delta.index) {
                        json.push_str(&partial_json);
                    }
                }
                SseDelta::Other => {}
            },
            SseEvent::ContentBlockStop(stop) => {
                if let Some((id, name, json)) = pending.remove(&stop.index) {
                    calls.push(assemble_call(id, name, &json));
                }
            }
            SseEvent::MessageDelta(delta) => {
                if delta.delta.stop_reason.is_some() {
                    stop_reason = delta.delta.stop_reason;
                }
            }
            SseEvent::MessageStop => {
                if stop_reason.as_deref() == Some("tool_use") && !calls.is_empty() {
                    if prior_tool_turns > MAX_FUNCTION_CALLS {
                        sender.error(ParleyError::TooManyFunctionCalls).await;
                    } else {
                        sender.tool_calls(calls).await;
                    }
                } else {
                    sender.end().await;
                }
                return;
            }
            SseEvent::Error(err) => {
                sender
                    .error(ParleyError::provider(format!(
                        "{}: {}",
                        err.error.type_, err.error.message
                    )))
                    .await;
                return;
            }
            SseEvent::MessageStart(start) => {
                debug!(id = %start.message.id, model = %start.message.model, "Anthropic message started");
            }
            SseEvent::Ping => {}
        }
    }
}

fn assemble_call(id: String, name: String, json: &str) -> ToolCall {
    let arguments = if json.is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(json).unwrap_or_else(|e| {
            warn!(error = %e, json = %json, "failed to parse tool_use input JSON");
            serde_json::json!({"_parse_error": e.to_string(), "_raw": json})
        })
    };
    ToolCall {
        id,
        name,
        description: String::new(),
        arguments,
        result: String::new(),
        status: ToolCallStatus::Pending,
    }
}
