// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic search over the messages the requesting user can read.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::search::SearchOptions;
use parley_core::{HostPlatform, LlmContext, ParleyError};
use parley_prompts::{Prompts, names};
use parley_search::EmbeddingSearch;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::builtin::SEARCH_TOOL_NAME;
use crate::tool::{Tool, parse_args, schema_for, tool_error};

const MIN_TERM_CHARS: usize = 3;
const MAX_TERM_CHARS: usize = 300;
const RESULT_LIMIT: usize = 10;
const MAX_CONTENT_CHARS: usize = 500;

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// The terms to search for in the server's messages.
    term: String,
}

pub struct SearchServer {
    search: Arc<EmbeddingSearch>,
    host: Arc<dyn HostPlatform>,
    prompts: Arc<Prompts>,
}

impl SearchServer {
    pub fn new(search: Arc<EmbeddingSearch>, host: Arc<dyn HostPlatform>, prompts: Arc<Prompts>) -> Self {
        Self {
            search,
            host,
            prompts,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for SearchServer {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the server for messages related to a term. Only use this when the user asks about something discussed elsewhere on the server."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<SearchArgs>()
    }

    async fn invoke(&self, arguments: &Value, context: &LlmContext) -> Result<String, ParleyError> {
        let args: SearchArgs = parse_args(self.name(), arguments)?;
        let term = args.term.trim();
        let len = term.chars().count();
        if !(MIN_TERM_CHARS..=MAX_TERM_CHARS).contains(&len) {
            return Err(tool_error(
                self.name(),
                format!("search term must be between {MIN_TERM_CHARS} and {MAX_TERM_CHARS} characters"),
            ));
        }

        let in_bot_dm = context
            .channel
            .as_ref()
            .is_some_and(|c| c.is_direct_with(&context.bot_user_id));
        if !in_bot_dm {
            return Err(tool_error(
                self.name(),
                "search is only available in direct messages with the bot",
            ));
        }
        let user_id = context
            .requesting_user_id()
            .ok_or_else(|| tool_error(self.name(), "no requesting user"))?;

        let options = SearchOptions {
            limit: RESULT_LIMIT,
            user_id: user_id.to_string(),
            ..Default::default()
        };
        let results = self
            .search
            .search(term, &options)
            .await
            .map_err(|e| tool_error(self.name(), e.to_string()))?;
        debug!(results = results.len(), "server search finished");

        let mut rows = Vec::with_capacity(results.len());
        for result in &results {
            let doc = &result.document;
            let channel_name = match self.host.get_channel(&doc.channel_id).await {
                Ok(channel) if !channel.display_name.is_empty() => channel.display_name,
                Ok(channel) => channel.name,
                Err(_) => doc.channel_id.clone(),
            };
            let username = match self.host.get_user(&doc.user_id).await {
                Ok(user) => user.username,
                Err(_) => "unknown".to_string(),
            };
            rows.push(json!({
                "channel_name": channel_name,
                "username": username,
                "score": format!("{:.2}", result.score),
                "content": truncate_chars(&doc.content, MAX_CONTENT_CHARS),
            }));
        }

        let mut render_ctx = context.clone();
        render_ctx.parameters.insert("results".into(), Value::Array(rows));
        self.prompts.format(names::SEARCH_RESULTS, &render_ctx)
    }
}
