// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval subsystem for Parley.
//!
//! Posts are split by the [`chunker`], embedded in batches, and kept in a
//! SQLite [`vector_store`]. [`EmbeddingSearch`] composes the two and
//! enforces channel visibility on every query. [`PostIndexer`] keeps the
//! index current as posts change, and [`JobManager`] rebuilds it from the
//! full post history.

pub mod chunker;
pub mod embedding_search;
pub mod indexer;
pub mod reindex;
pub mod vector_store;

pub use chunker::{Chunk, chunk_text};
pub use embedding_search::EmbeddingSearch;
pub use indexer::{PostIndexer, is_indexable};
pub use reindex::{JobManager, JobState, JobStatus, REINDEX_JOB_KEY};
pub use vector_store::SqliteVectorStore;
