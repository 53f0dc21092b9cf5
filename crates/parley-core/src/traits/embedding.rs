// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::ParleyError;

/// Converts text into fixed-size vectors for similarity search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ParleyError>;

    /// Embeds many texts in one upstream call, preserving order.
    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ParleyError>;

    /// Vector width produced by this provider.
    fn dimensions(&self) -> usize;
}
