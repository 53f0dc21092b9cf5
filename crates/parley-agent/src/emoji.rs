// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emoji reactions chosen by the model.

use std::sync::Arc;

use parley_core::host::ChatPost;
use parley_core::{
    CompletionRequest, GenerationOptions, HostPlatform, LanguageModel, LlmContext, ParleyError,
    Post,
};
use parley_prompts::{Prompts, names};
use tracing::debug;

const EMOJI_MAX_TOKENS: u32 = 25;

#[derive(Clone)]
pub struct EmojiReactor {
    host: Arc<dyn HostPlatform>,
    prompts: Arc<Prompts>,
}

impl std::fmt::Debug for EmojiReactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmojiReactor").finish_non_exhaustive()
    }
}

impl EmojiReactor {
    pub fn new(host: Arc<dyn HostPlatform>, prompts: Arc<Prompts>) -> Self {
        Self { host, prompts }
    }

    /// Asks the model for one emoji shortcode fitting `message`.
    ///
    /// Surrounding colons and whitespace are stripped; anything that is not a
    /// known shortcode is a provider error.
    pub async fn resolve(
        &self,
        model: &dyn LanguageModel,
        context: &LlmContext,
        message: &str,
    ) -> Result<String, ParleyError> {
        let mut context = context.clone();
        context.tools = None;
        let system = self.prompts.format(names::EMOJI_REACT, &context)?;
        let request = CompletionRequest::new(vec![Post::system(system), Post::user(message)], context);
        let answer = model
            .chat_completion_no_stream(
                request,
                GenerationOptions::default().with_max_generated_tokens(EMOJI_MAX_TOKENS),
            )
            .await?;

        let shortcode = answer.trim().trim_matches(':');
        if shortcode.is_empty() || emojis::get_by_shortcode(shortcode).is_none() {
            return Err(ParleyError::provider(format!(
                "LLM returned something other than emoji: {answer}"
            )));
        }
        Ok(shortcode.to_string())
    }

    /// Reacts to `post` as `bot_user_id` with a model-chosen emoji.
    pub async fn react(
        &self,
        model: &dyn LanguageModel,
        context: &LlmContext,
        bot_user_id: &str,
        post: &ChatPost,
    ) -> Result<String, ParleyError> {
        let emoji = self.resolve(model, context, &post.message).await?;
        self.host.add_reaction(&post.id, bot_user_id, &emoji).await?;
        debug!(post_id = %post.id, emoji = %emoji, "reacted");
        Ok(emoji)
    }
}
