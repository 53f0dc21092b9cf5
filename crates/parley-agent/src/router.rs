// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot selection and admission control for incoming posts.
//!
//! Routing is split in three steps:
//! - [`check_filters`] drops posts the AI must never answer
//! - [`route`] picks the bot from a DM or an @-mention
//! - [`check_usage`] applies the bot's channel and user access rules
//!
//! Every rejection in the first two steps is [`ParleyError::NoResponse`];
//! admission failures are [`ParleyError::UsageRestriction`].

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use parley_config::model::{AccessLevel, BotConfig};
use parley_core::ParleyError;
use parley_core::host::{Channel, ChatPost, User};
use regex::Regex;

use crate::bots::{Bot, BotRegistry};
use crate::props;

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?(```|$)").expect("fence pattern is valid"));

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]*`").expect("code span pattern is valid"));

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w@.-])@([a-zA-Z0-9][a-zA-Z0-9._-]*)").expect("mention pattern is valid")
});

/// How a post reached its bot.
#[derive(Debug, Clone)]
pub enum Route {
    /// The post is in a DM between the bot and its author.
    DirectMessage(Arc<Bot>),
    /// The post @-mentions the bot outside code.
    Mention(Arc<Bot>),
}

impl Route {
    pub fn bot(&self) -> &Arc<Bot> {
        match self {
            Route::DirectMessage(bot) | Route::Mention(bot) => bot,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Route::DirectMessage(_))
    }
}

/// Lowercased usernames @-mentioned in `message`, ignoring code spans and
/// fenced code blocks. Trailing periods are not part of a username.
pub fn mentioned_usernames(message: &str) -> Vec<String> {
    let without_fences = FENCED_CODE.replace_all(message, " ");
    let text = INLINE_CODE.replace_all(&without_fences, " ");
    let mut seen = Vec::new();
    for cap in MENTION.captures_iter(&text) {
        let name = cap[1].trim_end_matches('.').to_lowercase();
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Drops posts the AI must not answer.
///
/// `author` is the post's author as resolved on the host; `bot_ids` are the
/// user IDs of every configured bot.
pub fn check_filters(
    post: &ChatPost,
    author: &User,
    bot_ids: &HashSet<String>,
    max_ai_hops: i64,
) -> Result<(), ParleyError> {
    if bot_ids.contains(&post.user_id) {
        return Err(ParleyError::NoResponse);
    }
    if post.remote_id.as_deref().is_some_and(|id| !id.is_empty()) {
        return Err(ParleyError::NoResponse);
    }

    let activated = post.prop_flag(props::ACTIVATE_AI);
    let automated = post.props.contains_key(props::WRANGLER)
        || post.prop_flag(props::FROM_WEBHOOK)
        || post.prop_flag(props::FROM_PLUGIN);
    if automated && !activated {
        return Err(ParleyError::NoResponse);
    }
    if (author.is_bot || post.prop_flag(props::FROM_BOT)) && !activated {
        return Err(ParleyError::NoResponse);
    }
    if activated && post.prop_i64(props::AI_HOP_COUNT).unwrap_or(0) >= max_ai_hops {
        return Err(ParleyError::NoResponse);
    }
    Ok(())
}

/// Picks the bot that should answer `post` in `channel`.
///
/// A DM with a bot wins over mentions; otherwise the first configured bot
/// mentioned in the message answers.
pub fn route(post: &ChatPost, channel: &Channel, bots: &BotRegistry) -> Result<Route, ParleyError> {
    if let Some((a, b)) = channel.direct_members() {
        let other = |id: &str| if id == a { b } else { a };
        for bot in bots.all() {
            if (bot.user_id == a || bot.user_id == b) && other(&bot.user_id) == post.user_id {
                return Ok(Route::DirectMessage(bot));
            }
        }
    }

    let mentioned = mentioned_usernames(&post.message);
    if mentioned.is_empty() {
        return Err(ParleyError::NoResponse);
    }
    bots.all()
        .into_iter()
        .find(|bot| mentioned.iter().any(|m| *m == bot.config.name.to_lowercase()))
        .map(Route::Mention)
        .ok_or(ParleyError::NoResponse)
}

/// Applies the bot's channel and user access rules.
///
/// `user_teams` holds the IDs of teams the user is an active member of; only
/// its intersection with `bot.team_ids` matters.
pub fn check_usage(
    bot: &BotConfig,
    channel_id: &str,
    user_id: &str,
    user_teams: &HashSet<String>,
) -> Result<(), ParleyError> {
    let channel_listed = bot.channel_ids.iter().any(|id| id == channel_id);
    let channel_ok = match bot.channel_access_level {
        AccessLevel::All => true,
        AccessLevel::Allow => channel_listed,
        AccessLevel::Block => !channel_listed,
        AccessLevel::None => false,
    };
    if !channel_ok {
        return Err(ParleyError::UsageRestriction(format!(
            "bot {} is not available in channel {channel_id}",
            bot.name
        )));
    }

    let user_listed = bot.user_ids.iter().any(|id| id == user_id)
        || bot.team_ids.iter().any(|team| user_teams.contains(team));
    let user_ok = match bot.user_access_level {
        AccessLevel::All => true,
        AccessLevel::Allow => user_listed,
        AccessLevel::Block => !user_listed,
        AccessLevel::None => false,
    };
    if !user_ok {
        return Err(ParleyError::UsageRestriction(format!(
            "bot {} is not available to user {user_id}",
            bot.name
        )));
    }
    Ok(())
}
