// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools the model may call, and the store that resolves them.
//!
//! Every tool call in Parley is approved by a human before it runs, so
//! resolvers here execute only after the tool-call protocol has accepted the
//! call. Each resolver receives the requesting user's context and checks
//! access through the host on every call.

pub mod builtin;
pub mod mcp;
pub mod tool;

pub use builtin::{BuiltinTools, SEARCH_TOOL_NAME};
pub use mcp::{HttpMcpConnector, McpClient, McpConnector, McpManager, McpToolInfo};
pub use tool::{Tool, ToolStore, parse_args, schema_for};
