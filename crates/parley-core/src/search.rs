// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexed documents and search query/result types.

use serde::{Deserialize, Serialize};

/// Position of a chunk within its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// One indexed unit: a whole post or one chunk of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDocument {
    pub post_id: String,
    pub create_at: i64,
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub content: String,
    pub chunk: Option<ChunkInfo>,
}

impl PostDocument {
    /// Row key in the vector store. Chunks get `"{post_id}_chunk_{index}"`.
    pub fn row_id(&self) -> String {
        match self.chunk {
            Some(info) => format!("{}_chunk_{}", self.post_id, info.chunk_index),
            None => self.post_id.clone(),
        }
    }
}

/// Caller-facing search options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: usize,
    pub team_id: Option<String>,
    pub channel_id: Option<String>,
    /// Required; results are restricted to channels this user can read.
    pub user_id: String,
    pub min_score: Option<f32>,
    pub created_after: Option<i64>,
}

/// Store-level filter. `channel_ids` is the resolved visibility set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub limit: usize,
    pub team_id: Option<String>,
    pub channel_id: Option<String>,
    pub channel_ids: Vec<String>,
    pub min_score: Option<f32>,
    pub created_after: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: PostDocument,
    /// Higher is more similar.
    pub score: f32,
}
