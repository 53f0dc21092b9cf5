// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live indexing of created, edited, and deleted posts.

use std::collections::HashSet;
use std::sync::Arc;

use parley_core::host::{Channel, ChatPost, POST_TYPE_DEFAULT};
use parley_core::search::PostDocument;
use parley_core::HostPlatform;
use tracing::{debug, warn};

use crate::embedding_search::EmbeddingSearch;

/// Whether a post belongs in the index.
///
/// Requires a non-empty message from a non-bot author, the default post
/// type, no deletion, and a channel that is not a DM with any bot.
pub fn is_indexable(post: &ChatPost, channel: &Channel, bot_ids: &HashSet<String>) -> bool {
    !post.message.is_empty()
        && !bot_ids.contains(&post.user_id)
        && post.post_type == POST_TYPE_DEFAULT
        && post.delete_at == 0
        && !channel
            .direct_members()
            .is_some_and(|(a, b)| bot_ids.contains(a) || bot_ids.contains(b))
}

pub(crate) fn document_for(post: &ChatPost, channel: &Channel) -> PostDocument {
    PostDocument {
        post_id: post.id.clone(),
        create_at: post.create_at,
        team_id: channel.team_id.clone(),
        channel_id: post.channel_id.clone(),
        user_id: post.user_id.clone(),
        content: post.message.clone(),
        chunk: None,
    }
}

/// Mirrors post changes into the index. Failures are logged, never raised.
#[derive(Clone)]
pub struct PostIndexer {
    search: Arc<EmbeddingSearch>,
    host: Arc<dyn HostPlatform>,
}

impl std::fmt::Debug for PostIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostIndexer")
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

impl PostIndexer {
    pub fn new(search: Arc<EmbeddingSearch>, host: Arc<dyn HostPlatform>) -> Self {
        Self { search, host }
    }

    /// Indexes a new or edited post, replacing any earlier rows for it.
    pub async fn index_post(&self, post: &ChatPost, bot_ids: &HashSet<String>) {
        let channel = match self.host.get_channel(&post.channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "skipping index: channel lookup failed");
                return;
            }
        };
        if !is_indexable(post, &channel, bot_ids) {
            debug!(post_id = %post.id, "post not indexable");
            if post.delete_at != 0 {
                self.delete_post(&post.id).await;
            }
            return;
        }
        if let Err(e) = self.search.store(&[document_for(post, &channel)]).await {
            warn!(post_id = %post.id, error = %e, "failed to index post");
        }
    }

    pub async fn delete_post(&self, post_id: &str) {
        if let Err(e) = self.search.delete(&[post_id.to_string()]).await {
            warn!(post_id, error = %e, "failed to remove post from index");
        }
    }
}
