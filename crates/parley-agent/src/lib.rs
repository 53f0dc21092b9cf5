// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration for Parley.
//!
//! This crate turns host events into model conversations and streams the
//! answers back into chat posts:
//! - [`router`]: bot selection and admission control
//! - [`context`]: per-request [`LlmContext`](parley_core::LlmContext) construction
//! - [`conversation`]: thread-to-conversation assembly and titles
//! - [`streaming`]: live post streaming with cancellation
//! - [`tool_calls`]: requester approval of tool calls
//! - [`analysis`]: thread, channel, and transcript analysis
//! - [`service`]: the [`Service`] facade the host plugin drives

pub mod analysis;
pub mod bots;
pub mod context;
pub mod conversation;
pub mod emoji;
pub mod props;
pub mod router;
pub mod service;
pub mod streaming;
pub mod tool_calls;

pub use analysis::{ChannelAnalysis, ThreadAnalysis, TranscriptSummarizer};
pub use bots::{Bot, BotRegistry};
pub use context::{ContextRequest, LlmContextBuilder};
pub use conversation::{ConversationAssembler, TitleGenerator};
pub use emoji::EmojiReactor;
pub use router::Route;
pub use service::{InterPluginRequest, Service, ServiceDeps};
pub use streaming::{StreamingCoordinator, StreamingPost};
