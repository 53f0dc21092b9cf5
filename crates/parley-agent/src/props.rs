// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post prop keys shared with chat clients and other plugins.

/// ID of the user whose request produced a bot post.
pub const REQUESTER: &str = "llm_requester_user_id";
/// Set on bot posts that must not be regenerated.
pub const NO_REGEN: &str = "no_regen";
/// JSON array of tool calls awaiting or carrying a decision.
pub const PENDING_TOOL_CALL: &str = "pending_tool_call";
/// ID of the post a bot reply answers.
pub const RESPONDING_TO: &str = "responding_to";
/// Root of the thread an analysis post was computed from.
pub const REFERENCED_THREAD: &str = "referenced_thread";
/// Prompt template an analysis post was computed with.
pub const PROMPT_TYPE: &str = "prompt_type";
pub const REFERENCED_RECORDING_FILE_ID: &str = "referenced_recording_file_id";
pub const REFERENCED_TRANSCRIPT_POST_ID: &str = "referenced_transcript_post_id";
/// `"true"` suppresses link previews and inline images on bot content.
pub const UNSAFE_LINKS: &str = "unsafe_links";

pub const FROM_WEBHOOK: &str = "from_webhook";
pub const FROM_PLUGIN: &str = "from_plugin";
pub const FROM_BOT: &str = "from_bot";
pub const WRANGLER: &str = "wrangler";
/// Opts a plugin or bot post into AI handling.
pub const ACTIVATE_AI: &str = "activate_ai";
/// Depth of an AI-to-AI reply chain.
pub const AI_HOP_COUNT: &str = "ai_hop_count";
