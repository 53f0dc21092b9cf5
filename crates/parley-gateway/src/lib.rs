// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Parley.
//!
//! Exposes the inter-plugin completion API: sibling plugins post a system
//! and user prompt and receive the bot's full answer. Every route sits
//! behind the shared-secret check in [`auth`].

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::{SECRET_HEADER, secret_middleware};
pub use server::{GatewayState, ServerConfig, router, start_server};
