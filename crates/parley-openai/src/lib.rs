// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-style chat and embedding adapters for Parley.
//!
//! One adapter serves OpenAI, Azure OpenAI, and any OpenAI-compatible server;
//! the [`ServiceConfig`] type only changes endpoint and auth layout.

pub mod client;
pub mod convert;
pub mod embeddings;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::ServiceConfig;
use parley_core::stream::{MAX_FUNCTION_CALLS, next_within};
use parley_core::{
    CompletionRequest, GenerationOptions, LanguageModel, ParleyError, StreamSender, TextStream,
    ToolCall, ToolCallStatus,
};
use tiktoken_rs::CoreBPE;
use tracing::{debug, info, warn};

use crate::client::{ChunkEvent, ChunkStream, OpenAIClient};
use crate::types::{ChatRequest, ChatTool, FunctionDefinition, ResponseFormat};

pub use crate::embeddings::OpenAIEmbeddings;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_INPUT_TOKEN_LIMIT: usize = 128_000;

/// Chat backend for OpenAI, Azure, and compatible servers.
#[derive(Clone)]
pub struct OpenAIModel {
    client: OpenAIClient,
    tokenizer: Arc<CoreBPE>,
    default_model: String,
    input_token_limit: usize,
    output_token_limit: Option<u32>,
    streaming_timeout: Duration,
    send_user_id: bool,
    enable_vision: bool,
}

impl std::fmt::Debug for OpenAIModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIModel")
            .field("client", &self.client)
            .field("default_model", &self.default_model)
            .field("input_token_limit", &self.input_token_limit)
            .finish_non_exhaustive()
    }
}

impl OpenAIModel {
    pub fn new(service: &ServiceConfig, enable_vision: bool) -> Result<Self, ParleyError> {
        let client = OpenAIClient::new(service)?;
        let tokenizer = tiktoken_rs::cl100k_base()
            .map_err(|e| ParleyError::Internal(format!("failed to load tokenizer: {e}")))?;
        let default_model = if service.default_model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            service.default_model.clone()
        };

        info!(
            service = service.service_type.as_str(),
            model = %default_model,
            "OpenAI model initialized"
        );

        Ok(Self {
            client,
            tokenizer: Arc::new(tokenizer),
            default_model,
            input_token_limit: if service.input_token_limit == 0 {
                DEFAULT_INPUT_TOKEN_LIMIT
            } else {
                service.input_token_limit
            },
            output_token_limit: (service.output_token_limit > 0)
                .then_some(service.output_token_limit),
            streaming_timeout: service.streaming_timeout(),
            send_user_id: service.send_user_id,
            enable_vision,
        })
    }

    pub fn to_chat_request(
        &self,
        request: &CompletionRequest,
        options: &GenerationOptions,
    ) -> ChatRequest {
        let vision = options.enable_vision.unwrap_or(self.enable_vision);
        let tools: Vec<ChatTool> = request
            .context
            .tool_specs()
            .into_iter()
            .map(|spec| ChatTool {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: spec.name,
                    description: spec.description,
                    parameters: spec.schema,
                },
            })
            .collect();

        ChatRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages: convert::to_chat_messages(&request.posts, vision),
            stream: true,
            max_tokens: options.max_generated_tokens.or(self.output_token_limit),
            tools: (!tools.is_empty()).then_some(tools),
            response_format: options.json_output.then(ResponseFormat::json_object),
            user: self
                .send_user_id
                .then(|| request.context.requesting_user_id().map(str::to_string))
                .flatten(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    async fn chat_completion(
        &self,
        request: CompletionRequest,
        options: GenerationOptions,
    ) -> Result<TextStream, ParleyError> {
        let chat_request = self.to_chat_request(&request, &options);
        let prior_tool_turns = request.trailing_tool_turns();
        let client = self.client.clone();
        let timeout = self.streaming_timeout;

        let (sender, stream) = TextStream::channel();
        tokio::spawn(async move {
            let opened = tokio::select! {
                _ = sender.closed() => return,
                opened = tokio::time::timeout(
                    timeout,
                    client.chat_stream(&chat_request.model, &chat_request),
                ) => opened,
            };
            match opened {
                Ok(Ok(chunks)) => pump(chunks, sender, timeout, prior_tool_turns).await,
                Ok(Err(e)) => {
                    warn!(error = %e, "chat completion request failed");
                    sender.error(e).await;
                }
                Err(_) => sender.error(ParleyError::Timeout { duration: timeout }).await,
            }
        });
        Ok(stream)
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.encode_with_special_tokens(text).len()
    }

    fn input_token_limit(&self) -> usize {
        self.input_token_limit
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Forwards chunks into `sender` until a finish reason or `[DONE]`.
///
/// Tool-call fragments are buffered by the model's call index and released
/// as a single `ToolCalls` event.
async fn pump(mut chunks: ChunkStream, sender: StreamSender, timeout: Duration, prior_tool_turns: usize) {
    let mut partial: BTreeMap<u32, PartialCall> = BTreeMap::new();

    loop {
        let next = tokio::select! {
            _ = sender.closed() => {
                debug!("consumer dropped the stream, aborting chat request");
                return;
            }
            next = next_within(&mut chunks, timeout) => next,
        };

        let chunk = match next {
            Ok(Some(Ok(ChunkEvent::Chunk(chunk)))) => chunk,
            Ok(Some(Ok(ChunkEvent::Done))) => {
                finish(sender, partial, prior_tool_turns).await;
                return;
            }
            Ok(Some(Err(e))) => {
                sender.error(e).await;
                return;
            }
            Ok(None) => {
                sender
                    .error(ParleyError::provider("stream ended without a finish reason"))
                    .await;
                return;
            }
            Err(e) => {
                warn!(timeout = ?timeout, "chat stream stalled");
                sender.error(e).await;
                return;
            }
        };

        if let Some(error) = chunk.error {
            sender.error(ParleyError::provider(error.describe())).await;
            return;
        }

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !sender.text(content).await {
                    return;
                }
            }
            for fragment in choice.delta.tool_calls {
                let call = partial.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    call.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }
            if choice.finish_reason.is_some() {
                finish(sender, partial, prior_tool_turns).await;
                return;
            }
        }
    }
}

async fn finish(sender: StreamSender, partial: BTreeMap<u32, PartialCall>, prior_tool_turns: usize) {
    if partial.is_empty() {
        sender.end().await;
        return;
    }
    if prior_tool_turns > MAX_FUNCTION_CALLS {
        sender.error(ParleyError::TooManyFunctionCalls).await;
        return;
    }
    let calls = partial
        .into_values()
        .map(|call| {
            let arguments = if call.arguments.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                    warn!(error = %e, tool = %call.name, "failed to parse tool call arguments");
                    serde_json::json!({"_parse_error": e.to_string(), "_raw": call.arguments})
                })
            };
            ToolCall {
                id: call.id,
                name: call.name,
                description: String::new(),
                arguments,
                result: String::new(),
                status: ToolCallStatus::Pending,
            }
        })
        .collect();
    sender.tool_calls(calls).await;
}
