// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`SseEvent`] variants
//! using the `eventsource-stream` crate for SSE protocol compliance.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use parley_core::ParleyError;
use serde::de::DeserializeOwned;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError, SseMessageDelta,
    SseMessageStart,
};

/// A boxed stream of parsed SSE events.
pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, ParleyError>> + Send>>;

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum SseEvent {
    MessageStart(SseMessageStart),
    ContentBlockStart(SseContentBlockStart),
    ContentBlockDelta(SseContentBlockDelta),
    ContentBlockStop(SseContentBlockStop),
    /// Message-level delta carrying the stop reason.
    MessageDelta(SseMessageDelta),
    MessageStop,
    Ping,
    /// API error during streaming.
    Error(SseError),
}

fn parse<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, ParleyError> {
    serde_json::from_str(data).map_err(|e| ParleyError::Provider {
        message: format!("failed to parse {name}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parses a reqwest streaming response into a stream of typed [`SseEvent`]s.
///
/// Unknown event types are skipped per Anthropic's API versioning policy.
pub fn parse_sse_stream(response: reqwest::Response) -> SseStream {
    let event_stream = response.bytes_stream().eventsource();

    let mapped = event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let data = event.data.as_str();
                let parsed = match event.event.as_str() {
                    "message_start" => parse(&event.event, data).map(SseEvent::MessageStart),
                    "content_block_start" => {
                        parse(&event.event, data).map(SseEvent::ContentBlockStart)
                    }
                    "content_block_delta" => {
                        parse(&event.event, data).map(SseEvent::ContentBlockDelta)
                    }
                    "content_block_stop" => {
                        parse(&event.event, data).map(SseEvent::ContentBlockStop)
                    }
                    "message_delta" => parse(&event.event, data).map(SseEvent::MessageDelta),
                    "message_stop" => Ok(SseEvent::MessageStop),
                    "ping" => Ok(SseEvent::Ping),
                    "error" => parse(&event.event, data).map(SseEvent::Error),
                    _ => return None,
                };
                Some(parsed)
            }
            Err(e) => Some(Err(ParleyError::provider(format!("SSE stream error: {e}")))),
        }
    });

    Box::pin(mapped)
}
