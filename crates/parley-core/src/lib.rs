// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley conversational AI orchestration core.
//!
//! This crate provides the provider-neutral conversation model, the error
//! type, the model response stream pipe, and the adapter traits that the
//! provider, storage, tool, and host integrations implement.

pub mod context;
pub mod error;
pub mod host;
pub mod search;
pub mod stream;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use context::LlmContext;
pub use error::ParleyError;
pub use stream::{StreamEvent, StreamSender, TextStream};
pub use types::{CompletionRequest, FileAttachment, Post, Role, ToolCall, ToolCallStatus};

pub use traits::{
    EmbeddingProvider, GenerationOptions, HostPlatform, LanguageModel, ToolResolver, ToolSpec,
    VectorStore,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parley_error_display() {
        assert_eq!(ParleyError::NoResponse.to_string(), "not responding");
        assert_eq!(
            ParleyError::TooManyFunctionCalls.to_string(),
            "too many function calls"
        );
        let timeout = ParleyError::Timeout {
            duration: std::time::Duration::from_secs(10),
        };
        assert!(timeout.to_string().contains("10s"));
        assert!(ParleyError::NoResponse.is_no_response());
        assert!(!ParleyError::provider("x").is_no_response());
    }

    #[test]
    fn role_display_and_parse() {
        use std::str::FromStr;

        for role in [Role::User, Role::Assistant, Role::System] {
            let parsed = Role::from_str(&role.to_string()).expect("should parse back");
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_model<T: LanguageModel>() {}
        fn _assert_embedding<T: EmbeddingProvider>() {}
        fn _assert_vector<T: VectorStore>() {}
        fn _assert_tools<T: ToolResolver>() {}
        fn _assert_host<T: HostPlatform>() {}
    }
}
