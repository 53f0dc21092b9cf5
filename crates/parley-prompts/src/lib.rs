// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named prompt templates for Parley.
//!
//! Templates are compiled into the binary and registered once; there is no
//! runtime reload. Rendering takes an [`LlmContext`] as the template context,
//! so a template can reference `bot_name`, `requesting_user.username`,
//! `channel.display_name`, `parameters.*`, and so on.

use minijinja::{Environment, ErrorKind};
use parley_core::{LlmContext, ParleyError};

/// Template names known to the registry.
pub mod names {
    pub const STANDARD_PERSONALITY: &str = "standard_personality";
    pub const DIRECT_MESSAGE_QUESTION: &str = "direct_message_question";
    pub const THREAD_USER: &str = "thread_user";
    pub const SUMMARIZE_THREAD: &str = "summarize_thread";
    pub const ACTION_ITEMS: &str = "action_items";
    pub const OPEN_QUESTIONS: &str = "open_questions";
    pub const SUMMARIZE_CHANNEL: &str = "summarize_channel";
    pub const SUMMARIZE_CHUNK: &str = "summarize_chunk";
    pub const MEETING_SUMMARY: &str = "meeting_summary";
    pub const TITLE_THREAD: &str = "title_thread";
    pub const EMOJI_REACT: &str = "emoji_react";
    pub const SEARCH_RESULTS: &str = "search_results";
}

const TEMPLATES: &[(&str, &str)] = &[
    (
        names::STANDARD_PERSONALITY,
        include_str!("../templates/standard_personality.tmpl"),
    ),
    (
        names::DIRECT_MESSAGE_QUESTION,
        include_str!("../templates/direct_message_question.tmpl"),
    ),
    (names::THREAD_USER, include_str!("../templates/thread_user.tmpl")),
    (
        names::SUMMARIZE_THREAD,
        include_str!("../templates/summarize_thread.tmpl"),
    ),
    (names::ACTION_ITEMS, include_str!("../templates/action_items.tmpl")),
    (
        names::OPEN_QUESTIONS,
        include_str!("../templates/open_questions.tmpl"),
    ),
    (
        names::SUMMARIZE_CHANNEL,
        include_str!("../templates/summarize_channel.tmpl"),
    ),
    (
        names::SUMMARIZE_CHUNK,
        include_str!("../templates/summarize_chunk.tmpl"),
    ),
    (
        names::MEETING_SUMMARY,
        include_str!("../templates/meeting_summary.tmpl"),
    ),
    (names::TITLE_THREAD, include_str!("../templates/title_thread.tmpl")),
    (names::EMOJI_REACT, include_str!("../templates/emoji_react.tmpl")),
    (
        names::SEARCH_RESULTS,
        include_str!("../templates/search_results.tmpl"),
    ),
];

/// The prompt registry.
#[derive(Debug)]
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    /// Compiles every embedded template.
    ///
    /// Fails if any template has a syntax error.
    pub fn new() -> Result<Self, ParleyError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| ParleyError::Internal(format!("template {name}: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Renders the template `name` against `context`.
    pub fn format(&self, name: &str, context: &LlmContext) -> Result<String, ParleyError> {
        let template = self.env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => ParleyError::NotFound(format!("prompt template {name}")),
            _ => ParleyError::Internal(format!("template {name}: {e}")),
        })?;
        let rendered = template
            .render(context)
            .map_err(|e| ParleyError::Internal(format!("render {name}: {e}")))?;
        Ok(rendered.trim().to_string())
    }

    /// Renders ad-hoc template source against `context`.
    ///
    /// Inline sources may include any registered template.
    pub fn format_inline(&self, source: &str, context: &LlmContext) -> Result<String, ParleyError> {
        self.env
            .render_str(source, context)
            .map(|s| s.trim().to_string())
            .map_err(|e| ParleyError::InvalidInput(format!("inline template: {e}")))
    }

    /// Names of all registered templates.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.env.templates().map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::host::User;
    use serde_json::json;

    fn context() -> LlmContext {
        let mut ctx = LlmContext {
            time: "Mon, 19 Oct 2026 10:00:00 +0000".into(),
            server_name: "Acme".into(),
            bot_name: "Copilot".into(),
            requesting_user: Some(User {
                id: "u1".into(),
                username: "alice".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        ctx.parameters
            .insert("thread".into(), json!("alice: hello\nbob: hi"));
        ctx
    }

    #[test]
    fn all_templates_compile() {
        let prompts = Prompts::new().unwrap();
        assert_eq!(prompts.names().count(), TEMPLATES.len());
    }

    #[test]
    fn format_renders_context_and_sub_templates() {
        let prompts = Prompts::new().unwrap();
        let out = prompts
            .format(names::DIRECT_MESSAGE_QUESTION, &context())
            .unwrap();
        assert!(out.contains("\"Copilot\""));
        assert!(out.contains("Acme"));
        assert!(out.contains("alice"));
    }

    #[test]
    fn custom_instructions_are_appended() {
        let prompts = Prompts::new().unwrap();
        let mut ctx = context();
        ctx.custom_instructions = "Always answer in haiku.".into();
        let out = prompts.format(names::SUMMARIZE_THREAD, &ctx).unwrap();
        assert!(out.contains("Always answer in haiku."));
    }

    #[test]
    fn thread_user_includes_parameter() {
        let prompts = Prompts::new().unwrap();
        let out = prompts.format(names::THREAD_USER, &context()).unwrap();
        assert!(out.ends_with("alice: hello\nbob: hi"));
    }

    #[test]
    fn unknown_template_is_not_found() {
        let prompts = Prompts::new().unwrap();
        let err = prompts.format("nope", &context()).unwrap_err();
        assert!(matches!(err, ParleyError::NotFound(_)));
    }

    #[test]
    fn format_inline_uses_parameters() {
        let prompts = Prompts::new().unwrap();
        let mut ctx = context();
        ctx.parameters.insert("topic".into(), json!("release"));
        let out = prompts
            .format_inline("Summarize the {{ parameters.topic }} for {{ bot_name }}.", &ctx)
            .unwrap();
        assert_eq!(out, "Summarize the release for Copilot.");
    }

    #[test]
    fn search_results_lists_each_result() {
        let prompts = Prompts::new().unwrap();
        let mut ctx = context();
        ctx.parameters.insert(
            "results".into(),
            json!([
                {"channel_name": "town-square", "username": "bob", "score": 0.91, "content": "deploy is friday"},
            ]),
        );
        let out = prompts.format(names::SEARCH_RESULTS, &ctx).unwrap();
        assert!(out.contains("~town-square @bob (score 0.91): deploy is friday"));
        assert!(!out.contains("no matching messages"));
    }
}
