// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility; the
//! core holds implementations as `Arc<dyn Trait>`.

pub mod embedding;
pub mod host;
pub mod model;
pub mod tools;
pub mod vector;

pub use embedding::EmbeddingProvider;
pub use host::HostPlatform;
pub use model::{GenerationOptions, LanguageModel};
pub use tools::{ToolResolver, ToolSpec};
pub use vector::VectorStore;
