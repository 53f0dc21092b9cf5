// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk, embed, store, and ACL-filtered search.

use std::sync::Arc;

use parley_config::model::ChunkingConfig;
use parley_core::search::{ChunkInfo, PostDocument, SearchOptions, SearchResult, VectorFilter};
use parley_core::{EmbeddingProvider, HostPlatform, ParleyError, VectorStore};
use tracing::debug;

use crate::chunker::chunk_text;

/// The only component that writes to the vector store.
#[derive(Clone)]
pub struct EmbeddingSearch {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    host: Arc<dyn HostPlatform>,
    chunking: ChunkingConfig,
}

impl std::fmt::Debug for EmbeddingSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSearch")
            .field("dimensions", &self.embedder.dimensions())
            .field("chunking", &self.chunking)
            .finish()
    }
}

impl EmbeddingSearch {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        host: Arc<dyn HostPlatform>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            host,
            chunking,
        }
    }

    /// Chunks `documents`, embeds every chunk in one upstream call, and
    /// replaces each document's rows with the new ones.
    ///
    /// Nothing is removed when embedding fails.
    pub async fn store(&self, documents: &[PostDocument]) -> Result<(), ParleyError> {
        let mut rows = Vec::new();
        for doc in documents {
            for chunk in chunk_text(&doc.content, &self.chunking) {
                let mut row = doc.clone();
                row.chunk = chunk.is_chunk.then_some(ChunkInfo {
                    chunk_index: chunk.chunk_index,
                    total_chunks: chunk.total_chunks,
                });
                row.content = chunk.content;
                rows.push(row);
            }
        }
        let embeddings = if rows.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = rows.iter().map(|r| r.content.clone()).collect();
            self.embedder.batch_embed(&texts).await?
        };

        let post_ids: Vec<String> = documents.iter().map(|d| d.post_id.clone()).collect();
        self.store.delete(&post_ids).await?;
        if !rows.is_empty() {
            self.store.store(&rows, &embeddings).await?;
        }
        debug!(documents = documents.len(), rows = rows.len(), "indexed documents");
        Ok(())
    }

    /// Similarity search restricted to channels `options.user_id` can read.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>, ParleyError> {
        if options.user_id.is_empty() {
            return Err(ParleyError::InvalidInput(
                "search requires a user ID".to_string(),
            ));
        }

        let channel_ids: Vec<String> = self
            .host
            .get_channels_for_user(&options.user_id)
            .await?
            .into_iter()
            .filter(|c| c.delete_at == 0)
            .map(|c| c.id)
            .collect();
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let filter = VectorFilter {
            limit: options.limit,
            team_id: options.team_id.clone(),
            channel_id: options.channel_id.clone(),
            channel_ids,
            min_score: options.min_score,
            created_after: options.created_after,
        };
        self.store.search(&embedding, &filter).await
    }

    /// Removes every row, chunks included, of the given posts.
    pub async fn delete(&self, post_ids: &[String]) -> Result<(), ParleyError> {
        self.store.delete(post_ids).await
    }

    pub async fn clear(&self) -> Result<(), ParleyError> {
        self.store.clear().await
    }
}
