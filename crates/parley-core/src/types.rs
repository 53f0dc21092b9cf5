// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-neutral conversation types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::context::LlmContext;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A file attached to a conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub data: Vec<u8>,
}

/// Lifecycle state of a model-requested tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Success,
    Error,
    Rejected,
}

/// A model-issued request to invoke a named tool.
///
/// Persisted as JSON in the `pending_tool_call` post prop, so the serialized
/// shape is part of the client contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub result: String,
    pub status: ToolCallStatus,
}

/// One turn of a conversation.
///
/// `tool_use` is only populated on assistant turns; adapters expand it into a
/// tool-call message followed by one tool-result message per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub role: Role,
    pub message: String,
    pub files: Vec<FileAttachment>,
    pub tool_use: Vec<ToolCall>,
}

impl Post {
    pub fn new(role: Role, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            files: Vec::new(),
            tool_use: Vec::new(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(Role::System, message)
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(Role::User, message)
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(Role::Assistant, message)
    }

    pub fn with_files(mut self, files: Vec<FileAttachment>) -> Self {
        self.files = files;
        self
    }

    pub fn with_tool_use(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_use = calls;
        self
    }
}

/// A provider-neutral completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub posts: Vec<Post>,
    pub context: LlmContext,
}

impl CompletionRequest {
    pub fn new(posts: Vec<Post>, context: LlmContext) -> Self {
        Self { posts, context }
    }

    /// Shortens the conversation from the oldest turn forward until it fits
    /// in `max_tokens`.
    ///
    /// Walks backwards from the newest turn. The turn that crosses the budget
    /// keeps only its tail, scaled at four characters per token, and every
    /// older turn is dropped. Returns true when anything was removed.
    pub fn truncate<F>(&mut self, max_tokens: usize, count_tokens: F) -> bool
    where
        F: Fn(&str) -> usize,
    {
        let old_posts = std::mem::take(&mut self.posts);
        let mut kept: Vec<Post> = Vec::with_capacity(old_posts.len());
        let mut total = 0usize;
        let mut truncated = false;

        for mut post in old_posts.into_iter().rev() {
            if total >= max_tokens {
                truncated = true;
                break;
            }

            let tokens = count_tokens(&post.message);
            if total + tokens > max_tokens {
                let chars_to_cut = (tokens - (max_tokens - total)) * 4;
                post.message = post
                    .message
                    .chars()
                    .skip(chars_to_cut)
                    .collect::<String>()
                    .trim()
                    .to_string();
                kept.push(post);
                truncated = true;
                break;
            }

            total += tokens;
            kept.push(post);
        }

        kept.reverse();
        self.posts = kept;
        truncated
    }

    /// Number of trailing assistant turns that carry tool calls.
    ///
    /// Any turn without tool calls resets the count.
    pub fn trailing_tool_turns(&self) -> usize {
        self.posts
            .iter()
            .rev()
            .take_while(|p| p.role == Role::Assistant && !p.tool_use.is_empty())
            .count()
    }

    /// Sum of `count_tokens` over every turn.
    pub fn token_count<F>(&self, count_tokens: F) -> usize
    where
        F: Fn(&str) -> usize,
    {
        self.posts.iter().map(|p| count_tokens(&p.message)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quarter(s: &str) -> usize {
        s.chars().count() / 4
    }

    fn request(messages: &[String]) -> CompletionRequest {
        CompletionRequest::new(
            messages.iter().map(|m| Post::user(m.clone())).collect(),
            LlmContext::default(),
        )
    }

    #[test]
    fn truncate_trims_last_post_to_budget_suffix() {
        let messages: Vec<String> = (0..3).map(|i| format!("{i}").repeat(80)).collect();
        let mut req = request(&messages);

        assert!(req.truncate(10, quarter));
        assert_eq!(req.posts.len(), 1);
        assert_eq!(req.posts[0].message, "2".repeat(40));
        assert_eq!(quarter(&req.posts[0].message), 10);
    }

    #[test]
    fn truncate_drops_oldest_whole_posts() {
        let messages: Vec<String> = vec!["a".repeat(20), "b".repeat(20), "c".repeat(20)];
        let mut req = request(&messages);

        assert!(req.truncate(10, quarter));
        let kept: Vec<&str> = req.posts.iter().map(|p| p.message.as_str()).collect();
        assert_eq!(kept, vec!["b".repeat(20), "c".repeat(20)]);
    }

    #[test]
    fn truncate_is_noop_when_request_fits() {
        let messages: Vec<String> = vec!["hello there".into(), "general kenobi".into()];
        let mut req = request(&messages);

        assert!(!req.truncate(1000, quarter));
        assert_eq!(req.posts.len(), 2);
    }

    #[test]
    fn trailing_tool_turns_resets_on_text_turn() {
        let call = ToolCall {
            id: "1".into(),
            name: "lookup".into(),
            description: String::new(),
            arguments: serde_json::json!({}),
            result: "ok".into(),
            status: ToolCallStatus::Success,
        };
        let mut posts = vec![
            Post::assistant("").with_tool_use(vec![call.clone()]),
            Post::assistant("plain text"),
        ];
        posts.extend((0..3).map(|_| Post::assistant("").with_tool_use(vec![call.clone()])));
        let req = CompletionRequest::new(posts, LlmContext::default());

        assert_eq!(req.trailing_tool_turns(), 3);
    }

    #[test]
    fn tool_call_json_roundtrip() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "GetGithubIssue".into(),
            description: "Fetch an issue".into(),
            arguments: serde_json::json!({"repo_owner": "rust-lang", "number": 1}),
            result: String::new(),
            status: ToolCallStatus::Pending,
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }

    proptest! {
        #[test]
        fn truncate_yields_suffix_within_budget(
            messages in proptest::collection::vec("[a-z ]{0,120}", 0..12),
            budget in 0usize..200,
        ) {
            let mut req = request(&messages);
            req.truncate(budget, quarter);

            let within = req.token_count(quarter) <= budget;
            prop_assert!(within || req.posts.len() == 1);
            prop_assert!(req.posts.len() <= messages.len());

            // Every kept post except the first is an untouched original suffix.
            let offset = messages.len() - req.posts.len();
            for (i, post) in req.posts.iter().enumerate().skip(1) {
                prop_assert_eq!(&post.message, &messages[offset + i]);
            }
            if let Some(first) = req.posts.first() {
                prop_assert!(messages[offset].trim_end().ends_with(first.message.trim_end()));
            }
        }
    }
}
