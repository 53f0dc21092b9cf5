// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use parley_config::diagnostic::ConfigError;
use parley_config::model::{AccessLevel, ChunkingStrategy, ServiceType};
use parley_config::{load_and_validate_str, load_config_from_str};

/// A full bot declaration deserializes with every field populated.
#[test]
fn valid_toml_deserializes_into_parley_config() {
    let toml = r#"
default_bot = "copilot"

[[bots]]
name = "copilot"
display_name = "Copilot"
custom_instructions = "Be brief."
enable_vision = true
channel_access_level = "allow"
channel_ids = ["town-square"]
user_access_level = "block"
user_ids = ["mallory"]

[bots.service]
type = "anthropic"
api_key = "sk-ant-123"
default_model = "claude-sonnet-4-20250514"
input_token_limit = 200000
output_token_limit = 4096
streaming_timeout_seconds = 30

[embedding_search]
enabled = true
dimensions = 768

[embedding_search.provider]
type = "openaicompatible"
api_url = "http://localhost:8080/v1"
embedding_model = "nomic-embed-text"

[embedding_search.chunking]
chunk_size = 500
chunk_overlap = 50
strategy = "paragraphs"

[storage]
database_path = "/tmp/parley-test.db"
wal_mode = false

[inter_plugin]
secret = "shh"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    let bot = config.default_bot().expect("default bot");
    assert_eq!(bot.display_name, "Copilot");
    assert!(bot.enable_vision);
    assert_eq!(bot.channel_access_level, AccessLevel::Allow);
    assert_eq!(bot.user_access_level, AccessLevel::Block);
    assert_eq!(bot.service.service_type, ServiceType::Anthropic);
    assert_eq!(bot.service.input_token_limit, 200_000);
    assert_eq!(bot.service.streaming_timeout().as_secs(), 30);
    assert_eq!(bot.max_file_size, 5 * 1024 * 1024);

    assert!(config.embedding_search.enabled);
    assert_eq!(config.embedding_search.dimensions, 768);
    assert_eq!(
        config.embedding_search.chunking.strategy,
        ChunkingStrategy::Paragraphs
    );
    assert_eq!(config.storage.database_path, "/tmp/parley-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.inter_plugin.secret.as_deref(), Some("shh"));
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("empty config is valid");
    assert!(config.bots.is_empty());
    assert_eq!(config.streaming.max_ai_hops, 3);
    assert_eq!(config.mcp.idle_timeout_minutes, 30);
    assert_eq!(config.embedding_search.chunking.chunk_size, 1000);
    assert!(config.storage.wal_mode);
}

#[test]
fn unknown_field_in_storage_produces_suggestion() {
    let toml = r#"
[storage]
databse_path = "/tmp/x.db"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(!errors.is_empty());
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "databse_path");
            assert_eq!(suggestion.as_deref(), Some("database_path"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_service_type_is_reported() {
    let toml = r#"
[[bots]]
name = "ai"
display_name = "AI"

[bots.service]
type = "antropic"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(
        rendered.iter().any(|e| e.contains("antropic")),
        "errors: {rendered:?}"
    );
}

#[test]
fn validation_errors_are_all_collected() {
    let toml = r#"
default_bot = "nobody"

[[bots]]
name = ""
display_name = ""

[bots.service]
type = "azure"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 4, "errors: {errors:?}");
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let toml = r#"
[embedding_search.chunking]
chunk_size = 100
chunk_overlap = 100
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors[0].to_string().contains("chunk_overlap"));
}
