// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread, channel, and transcript analysis.

use std::sync::Arc;

use parley_config::model::{ChunkingConfig, ChunkingStrategy};
use parley_core::host::ChatPost;
use parley_core::{
    CompletionRequest, GenerationOptions, HostPlatform, LanguageModel, LlmContext, ParleyError,
    Post, TextStream,
};
use parley_llm::MIN_TOKENS;
use parley_prompts::{Prompts, names};
use parley_search::chunk_text;
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::{debug, info};

/// Most posts read for one channel analysis.
pub const MAX_CHANNEL_POSTS: usize = 200;
/// Page size when walking a channel backwards.
pub const CHANNEL_PAGE_SIZE: usize = 60;
/// Tokens held back from the transcript budget for the prompt itself.
const TRANSCRIPT_RESERVE: i64 = 1000;

/// Analyses that run over one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ThreadAnalysis {
    SummarizeThread,
    ActionItems,
    OpenQuestions,
}

impl ThreadAnalysis {
    pub fn prompt(&self) -> &'static str {
        match self {
            ThreadAnalysis::SummarizeThread => names::SUMMARIZE_THREAD,
            ThreadAnalysis::ActionItems => names::ACTION_ITEMS,
            ThreadAnalysis::OpenQuestions => names::OPEN_QUESTIONS,
        }
    }

    /// Fixed title of the resulting DM conversation.
    pub fn title(&self) -> &'static str {
        match self {
            ThreadAnalysis::SummarizeThread => "Thread Summary",
            ThreadAnalysis::ActionItems => "Action Items",
            ThreadAnalysis::OpenQuestions => "Open Questions",
        }
    }
}

/// Analyses that run over a channel time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelAnalysis {
    SummarizeUnreads,
    SummarizeRange,
    ActionItems,
    OpenQuestions,
}

impl ChannelAnalysis {
    pub fn prompt(&self) -> &'static str {
        match self {
            ChannelAnalysis::SummarizeUnreads | ChannelAnalysis::SummarizeRange => {
                names::SUMMARIZE_CHANNEL
            }
            ChannelAnalysis::ActionItems => names::ACTION_ITEMS,
            ChannelAnalysis::OpenQuestions => names::OPEN_QUESTIONS,
        }
    }
}

/// Posts of `channel_id` created in `[start, end]`, oldest first.
///
/// `end == 0` means "up to now". The walk anchors on the newest post in range
/// and pages backwards until it passes `start` or has [`MAX_CHANNEL_POSTS`].
/// Deleted posts are dropped.
pub async fn channel_posts(
    host: &dyn HostPlatform,
    channel_id: &str,
    start: i64,
    end: i64,
) -> Result<Vec<ChatPost>, ParleyError> {
    let in_range = |p: &ChatPost| p.create_at >= start && (end == 0 || p.create_at <= end);
    let Some(anchor) = host
        .get_posts_since(channel_id, start)
        .await?
        .into_iter()
        .filter(|p| in_range(p))
        .max_by(|a, b| (a.create_at, &a.id).cmp(&(b.create_at, &b.id)))
    else {
        return Ok(Vec::new());
    };

    let mut collected = vec![anchor.clone()];
    let mut page = 0;
    'pages: while collected.len() < MAX_CHANNEL_POSTS {
        let batch = host
            .get_posts_before(channel_id, &anchor.id, page, CHANNEL_PAGE_SIZE)
            .await?;
        let full = batch.len() == CHANNEL_PAGE_SIZE;
        for post in batch {
            if post.create_at < start {
                break 'pages;
            }
            collected.push(post);
            if collected.len() == MAX_CHANNEL_POSTS {
                break 'pages;
            }
        }
        if !full {
            break;
        }
        page += 1;
    }

    collected.retain(|p| !p.is_deleted());
    collected.reverse();
    debug!(channel_id = %channel_id, posts = collected.len(), "channel posts collected");
    Ok(collected)
}

/// Token budget for one transcript pass: 75% of the input limit minus a
/// fixed reserve, never below [`MIN_TOKENS`].
pub fn transcript_budget(input_token_limit: usize) -> usize {
    let limit = i64::try_from(input_token_limit).unwrap_or(i64::MAX);
    let budget = (limit as f64 * 0.75).floor() as i64 - TRANSCRIPT_RESERVE;
    budget.max(MIN_TOKENS) as usize
}

/// Map-reduce summarization of a meeting transcript.
#[derive(Clone)]
pub struct TranscriptSummarizer {
    prompts: Arc<Prompts>,
}

impl std::fmt::Debug for TranscriptSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptSummarizer").finish_non_exhaustive()
    }
}

impl TranscriptSummarizer {
    pub fn new(prompts: Arc<Prompts>) -> Self {
        Self { prompts }
    }

    /// Streams a meeting summary of `transcript`.
    ///
    /// A transcript over the budget is split at sentence boundaries, each
    /// part is summarized on its own, and the joined part summaries feed the
    /// final pass.
    pub async fn summarize(
        &self,
        model: &dyn LanguageModel,
        context: &LlmContext,
        transcript: &str,
    ) -> Result<TextStream, ParleyError> {
        let budget = transcript_budget(model.input_token_limit());
        let mut context = context.clone();
        context.tools = None;

        let (input, is_chunked) = if model.count_tokens(transcript) > budget {
            let options = ChunkingConfig {
                chunk_size: i64::try_from(budget * 4).unwrap_or(i64::MAX),
                chunk_overlap: 0,
                min_chunk_size: 0.0,
                strategy: ChunkingStrategy::Sentences,
            };
            let chunks = chunk_text(transcript, &options);
            info!(chunks = chunks.len(), budget, "summarizing transcript in parts");
            let system = self.prompts.format(names::SUMMARIZE_CHUNK, &context)?;
            let mut summaries = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let request = CompletionRequest::new(
                    vec![Post::system(system.clone()), Post::user(chunk.content)],
                    context.clone(),
                );
                summaries.push(
                    model
                        .chat_completion_no_stream(request, GenerationOptions::default())
                        .await?,
                );
            }
            (summaries.join("\n\n"), true)
        } else {
            (transcript.to_string(), false)
        };

        context
            .parameters
            .insert("is_chunked".into(), Value::Bool(is_chunked));
        let system = self.prompts.format(names::MEETING_SUMMARY, &context)?;
        let request = CompletionRequest::new(vec![Post::system(system), Post::user(input)], context);
        model
            .chat_completion(request, GenerationOptions::default())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn budget_scales_and_clamps() {
        assert_eq!(transcript_budget(128_000), 95_000);
        assert_eq!(transcript_budget(10_000), 6_500);
        assert_eq!(transcript_budget(0), MIN_TOKENS as usize);
    }

    #[test]
    fn analysis_kinds_parse_from_snake_case() {
        assert_eq!(
            ThreadAnalysis::from_str("action_items").unwrap(),
            ThreadAnalysis::ActionItems
        );
        assert_eq!(
            ChannelAnalysis::from_str("summarize_unreads").unwrap().prompt(),
            names::SUMMARIZE_CHANNEL
        );
        assert_eq!(ThreadAnalysis::SummarizeThread.to_string(), "summarize_thread");
    }
}
