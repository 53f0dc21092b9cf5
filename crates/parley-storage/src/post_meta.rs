// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation titles keyed by thread root.

use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use parley_core::ParleyError;

use crate::database::{Database, storage_err};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMeta {
    pub root_post_id: String,
    pub title: String,
}

/// CRUD over `llm_post_meta`.
#[derive(Debug, Clone)]
pub struct PostMetaStore {
    db: Database,
}

impl PostMetaStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or replaces the title of a conversation.
    pub async fn upsert_title(&self, root_post_id: &str, title: &str) -> Result<(), ParleyError> {
        let root_post_id = root_post_id.to_string();
        let title = title.trim().to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO llm_post_meta (root_post_id, title, updated_at)
                     VALUES (?1, ?2, CAST(strftime('%s', 'now') AS INTEGER) * 1000)
                     ON CONFLICT(root_post_id) DO UPDATE SET
                        title = excluded.title,
                        updated_at = excluded.updated_at",
                    params![root_post_id, title],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    pub async fn get_title(&self, root_post_id: &str) -> Result<Option<String>, ParleyError> {
        let root_post_id = root_post_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT title FROM llm_post_meta WHERE root_post_id = ?1",
                    params![root_post_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(storage_err)
    }

    /// Titles for whichever of `root_post_ids` have one, in input order.
    pub async fn titles_for(&self, root_post_ids: &[String]) -> Result<Vec<PostMeta>, ParleyError> {
        if root_post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = root_post_ids.to_vec();
        let mut found = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<PostMeta>, rusqlite::Error> {
                let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "SELECT root_post_id, title FROM llm_post_meta WHERE root_post_id IN ({})",
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<&dyn rusqlite::types::ToSql> =
                    ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();
                stmt.query_map(params.as_slice(), |row| {
                    Ok(PostMeta {
                        root_post_id: row.get(0)?,
                        title: row.get(1)?,
                    })
                })?
                .collect()
            })
            .await
            .map_err(storage_err)?;

        let order = |id: &str| root_post_ids.iter().position(|r| r == id);
        found.sort_by_key(|meta| order(&meta.root_post_id));
        Ok(found)
    }

    pub async fn delete(&self, root_post_id: &str) -> Result<(), ParleyError> {
        let root_post_id = root_post_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "DELETE FROM llm_post_meta WHERE root_post_id = ?1",
                    params![root_post_id],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }
}
