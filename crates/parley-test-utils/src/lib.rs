// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides in-memory stand-ins for the host platform and the model
//! providers so cross-component tests run without a chat server or network.
//!
//! # Components
//!
//! - [`MockModel`] - scripted language model that records its requests
//! - [`MockModelFactory`] - factory handing out one shared [`MockModel`]
//! - [`MockEmbedder`] - deterministic bag-of-words embedder
//! - [`MockHost`] - in-memory chat server

pub mod mock_embedder;
pub mod mock_host;
pub mod mock_model;

pub use mock_embedder::MockEmbedder;
pub use mock_host::MockHost;
pub use mock_model::{MockModel, MockModelFactory, MockReply};
