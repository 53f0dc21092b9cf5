// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store trait.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::search::{PostDocument, SearchResult, VectorFilter};

/// Persistent k-NN index over post documents.
///
/// Implementations must only return rows whose channel is listed in
/// `VectorFilter::channel_ids`; an empty list matches nothing.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upserts documents keyed by [`PostDocument::row_id`].
    async fn store(
        &self,
        documents: &[PostDocument],
        embeddings: &[Vec<f32>],
    ) -> Result<(), ParleyError>;

    async fn search(
        &self,
        embedding: &[f32],
        filter: &VectorFilter,
    ) -> Result<Vec<SearchResult>, ParleyError>;

    /// Removes every row, chunks included, belonging to the given posts.
    async fn delete(&self, post_ids: &[String]) -> Result<(), ParleyError>;

    /// Removes every row.
    async fn clear(&self) -> Result<(), ParleyError>;
}
