// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Parley.
//!
//! Holds the plugin's private tables: conversation titles and the post
//! embedding index. All access goes through one [`Database`], whose
//! tokio-rusqlite connection serializes statements on a background thread.

pub mod database;
pub mod migrations;
pub mod post_meta;

pub use database::{Database, storage_err};
pub use post_meta::{PostMeta, PostMetaStore};
