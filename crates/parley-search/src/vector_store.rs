// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector store with embeddings stored as little-endian BLOBs.
//!
//! Filters run in SQL; similarity is computed in process over the rows that
//! pass them. Rows outside `VectorFilter::channel_ids` are never read.

use async_trait::async_trait;
use parley_core::search::{ChunkInfo, PostDocument, SearchResult, VectorFilter};
use parley_core::{ParleyError, VectorStore};
use parley_storage::{Database, storage_err};
use rusqlite::types::Value as SqlValue;
use tracing::debug;

/// Result count used when a filter leaves `limit` at zero.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Convert f32 vector to SQLite BLOB.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector. Trailing partial floats are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity; zero when either vector is zero or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    db: Database,
    dimensions: usize,
}

impl SqliteVectorStore {
    pub fn new(db: Database, dimensions: usize) -> Self {
        Self { db, dimensions }
    }

    pub async fn row_count(&self) -> Result<i64, ParleyError> {
        self.db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM llm_posts_embeddings", [], |r| r.get(0))
            })
            .await
            .map_err(storage_err)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn store(&self, documents: &[PostDocument], embeddings: &[Vec<f32>]) -> Result<(), ParleyError> {
        if documents.len() != embeddings.len() {
            return Err(ParleyError::InvalidInput(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(ParleyError::InvalidInput(format!(
                "embedding has {} dimensions, index expects {}",
                bad.len(),
                self.dimensions
            )));
        }
        if documents.is_empty() {
            return Ok(());
        }

        let rows: Vec<(PostDocument, Vec<u8>)> = documents
            .iter()
            .cloned()
            .zip(embeddings.iter().map(|e| vec_to_blob(e)))
            .collect();
        let count = rows.len();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO llm_posts_embeddings
                            (id, post_id, create_at, team_id, channel_id, user_id, content,
                             is_chunk, chunk_index, total_chunks, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                         ON CONFLICT(id) DO UPDATE SET
                            post_id = excluded.post_id,
                            create_at = excluded.create_at,
                            team_id = excluded.team_id,
                            channel_id = excluded.channel_id,
                            user_id = excluded.user_id,
                            content = excluded.content,
                            is_chunk = excluded.is_chunk,
                            chunk_index = excluded.chunk_index,
                            total_chunks = excluded.total_chunks,
                            embedding = excluded.embedding",
                    )?;
                    for (doc, blob) in &rows {
                        let (is_chunk, index, total) = match doc.chunk {
                            Some(info) => (true, info.chunk_index as i64, info.total_chunks as i64),
                            None => (false, 0, 1),
                        };
                        stmt.execute(rusqlite::params![
                            doc.row_id(),
                            doc.post_id,
                            doc.create_at,
                            doc.team_id,
                            doc.channel_id,
                            doc.user_id,
                            doc.content,
                            is_chunk,
                            index,
                            total,
                            blob,
                        ])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(storage_err)?;
        debug!(rows = count, "stored embeddings");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], filter: &VectorFilter) -> Result<Vec<SearchResult>, ParleyError> {
        if filter.channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT post_id, create_at, team_id, channel_id, user_id, content,
                    is_chunk, chunk_index, total_chunks, embedding
             FROM llm_posts_embeddings WHERE channel_id IN (",
        );
        let mut params: Vec<SqlValue> = Vec::new();
        for (i, id) in filter.channel_ids.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            params.push(SqlValue::Text(id.clone()));
            sql.push_str(&format!("?{}", params.len()));
        }
        sql.push(')');
        if let Some(team_id) = &filter.team_id {
            params.push(SqlValue::Text(team_id.clone()));
            sql.push_str(&format!(" AND team_id = ?{}", params.len()));
        }
        if let Some(channel_id) = &filter.channel_id {
            params.push(SqlValue::Text(channel_id.clone()));
            sql.push_str(&format!(" AND channel_id = ?{}", params.len()));
        }
        if let Some(after) = filter.created_after {
            params.push(SqlValue::Integer(after));
            sql.push_str(&format!(" AND create_at > ?{}", params.len()));
        }

        let rows = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<(PostDocument, Vec<u8>)>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(rusqlite::params_from_iter(params), |row| {
                    let is_chunk: bool = row.get(6)?;
                    let chunk = if is_chunk {
                        Some(ChunkInfo {
                            chunk_index: row.get::<_, i64>(7)? as usize,
                            total_chunks: row.get::<_, i64>(8)? as usize,
                        })
                    } else {
                        None
                    };
                    Ok((
                        PostDocument {
                            post_id: row.get(0)?,
                            create_at: row.get(1)?,
                            team_id: row.get(2)?,
                            channel_id: row.get(3)?,
                            user_id: row.get(4)?,
                            content: row.get(5)?,
                            chunk,
                        },
                        row.get(9)?,
                    ))
                })?
                .collect()
            })
            .await
            .map_err(storage_err)?;

        let mut results: Vec<SearchResult> = rows
            .into_iter()
            .map(|(document, blob)| SearchResult {
                score: cosine_similarity(embedding, &blob_to_vec(&blob)),
                document,
            })
            .filter(|r| filter.min_score.is_none_or(|min| r.score >= min))
            .collect();
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.row_id().cmp(&b.document.row_id()))
        });
        results.truncate(if filter.limit == 0 {
            DEFAULT_SEARCH_LIMIT
        } else {
            filter.limit
        });
        Ok(results)
    }

    async fn delete(&self, post_ids: &[String]) -> Result<(), ParleyError> {
        if post_ids.is_empty() {
            return Ok(());
        }
        let ids = post_ids.to_vec();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "DELETE FROM llm_posts_embeddings WHERE post_id IN ({})",
                    placeholders.join(", ")
                );
                conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn clear(&self) -> Result<(), ParleyError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute("DELETE FROM llm_posts_embeddings", [])?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }
}
