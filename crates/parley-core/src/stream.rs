// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The model-to-consumer event pipe.
//!
//! A [`TextStream`] is the single-consumer end of a bounded queue fed by one
//! [`StreamSender`]. The sender's terminal methods consume it, so a producer
//! can emit at most one of `End`, `Error`, or `ToolCalls`. A producer that
//! disappears without a terminal event surfaces as an `Error` on the consumer
//! side, so every stream a consumer observes is well formed.
//!
//! Dropping the [`TextStream`] is the cancellation signal: the producer sees
//! [`StreamSender::closed`] resolve and abandons its upstream request.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::ParleyError;
use crate::types::ToolCall;

/// Maximum consecutive tool-call turns before a stream is failed.
pub const MAX_FUNCTION_CALLS: usize = 10;

/// Default provider inactivity timeout.
pub const DEFAULT_STREAMING_TIMEOUT: Duration = Duration::from_secs(10);

const STREAM_BUFFER: usize = 100;

/// One event in a model response stream.
#[derive(Debug)]
pub enum StreamEvent {
    Text(String),
    End,
    Error(ParleyError),
    ToolCalls(Vec<ToolCall>),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Text(_))
    }
}

/// Consumer end of a model response stream.
#[derive(Debug)]
pub struct TextStream {
    rx: mpsc::Receiver<StreamEvent>,
    finished: bool,
}

impl TextStream {
    /// Creates a connected sender/stream pair.
    pub fn channel() -> (StreamSender, TextStream) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        (
            StreamSender { tx },
            TextStream {
                rx,
                finished: false,
            },
        )
    }

    /// A stream that yields `text` once and ends.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut events = Vec::with_capacity(2);
        if !text.is_empty() {
            events.push(StreamEvent::Text(text));
        }
        events.push(StreamEvent::End);
        Self::from_events(events)
    }

    /// A stream that replays `events`; a missing terminal event reads as an error.
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity equals the number of events, so this never fails.
            let _ = tx.try_send(event);
        }
        Self {
            rx,
            finished: false,
        }
    }

    /// Receives the next event. Returns `None` only after a terminal event.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        let event = match self.rx.recv().await {
            Some(event) => event,
            None => StreamEvent::Error(ParleyError::provider("stream closed before completion")),
        };
        if event.is_terminal() {
            self.finished = true;
            self.rx.close();
        }
        Some(event)
    }

    /// Collects the text of the whole stream.
    ///
    /// Tool calls end collection with the text gathered so far.
    pub async fn read_all(mut self) -> Result<String, ParleyError> {
        let mut out = String::new();
        while let Some(event) = self.recv().await {
            match event {
                StreamEvent::Text(chunk) => out.push_str(&chunk),
                StreamEvent::Error(err) => return Err(err),
                StreamEvent::End | StreamEvent::ToolCalls(_) => break,
            }
        }
        Ok(out)
    }
}

/// Producer end of a model response stream.
#[derive(Debug)]
pub struct StreamSender {
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamSender {
    /// Sends a text delta. Empty deltas are skipped.
    ///
    /// Returns false once the consumer has gone away.
    pub async fn text(&self, chunk: impl Into<String>) -> bool {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(StreamEvent::Text(chunk)).await.is_ok()
    }

    pub async fn end(self) {
        let _ = self.tx.send(StreamEvent::End).await;
    }

    pub async fn error(self, err: ParleyError) {
        let _ = self.tx.send(StreamEvent::Error(err)).await;
    }

    pub async fn tool_calls(self, calls: Vec<ToolCall>) {
        let _ = self.tx.send(StreamEvent::ToolCalls(calls)).await;
    }

    /// Resolves when the consumer drops its [`TextStream`].
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Awaits the next upstream item, failing if none arrives within `timeout`.
///
/// The timer restarts on every call, so a steady trickle of chunks never
/// trips it.
pub async fn next_within<S>(
    upstream: &mut S,
    timeout: Duration,
) -> Result<Option<S::Item>, ParleyError>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(timeout, upstream.next())
        .await
        .map_err(|_| ParleyError::Timeout { duration: timeout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn read_all_concatenates_text_until_end() {
        let (tx, rx) = TextStream::channel();
        tokio::spawn(async move {
            tx.text("Hello, ").await;
            tx.text("").await;
            tx.text("world").await;
            tx.end().await;
        });
        assert_eq!(rx.read_all().await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn dropped_sender_reads_as_single_error() {
        let (tx, mut rx) = TextStream::channel();
        tx.text("partial").await;
        drop(tx);

        assert!(matches!(rx.recv().await, Some(StreamEvent::Text(_))));
        assert!(matches!(rx.recv().await, Some(StreamEvent::Error(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn nothing_after_terminal_event() {
        let mut rx = TextStream::from_events(vec![
            StreamEvent::Text("a".into()),
            StreamEvent::End,
            StreamEvent::Text("late".into()),
        ]);
        assert!(matches!(rx.recv().await, Some(StreamEvent::Text(_))));
        assert!(matches!(rx.recv().await, Some(StreamEvent::End)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn sender_sees_consumer_drop() {
        let (tx, rx) = TextStream::channel();
        drop(rx);
        tx.closed().await;
        assert!(!tx.text("ignored").await);
    }

    #[tokio::test(start_paused = true)]
    async fn next_within_times_out_on_stall() {
        let mut stalled = stream::pending::<u8>();
        let err = next_within(&mut stalled, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Timeout { .. }));
    }

    #[tokio::test]
    async fn next_within_passes_items_through() {
        let mut items = stream::iter(vec![1, 2]);
        assert_eq!(next_within(&mut items, DEFAULT_STREAMING_TIMEOUT).await.unwrap(), Some(1));
        assert_eq!(next_within(&mut items, DEFAULT_STREAMING_TIMEOUT).await.unwrap(), Some(2));
        assert_eq!(next_within(&mut items, DEFAULT_STREAMING_TIMEOUT).await.unwrap(), None);
    }
}
