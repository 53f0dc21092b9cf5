// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty bot names and service URLs required by some backends.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{BotConfig, ParleyConfig, ServiceConfig, ServiceType};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut seen_names = HashSet::new();
    for (i, bot) in config.bots.iter().enumerate() {
        validate_bot(i, bot, &mut errors);
        if !bot.name.trim().is_empty() && !seen_names.insert(bot.name.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate bot name `{}` in [[bots]] array", bot.name),
            });
        }
    }

    if !config.default_bot.is_empty() && config.bot(&config.default_bot).is_none() {
        errors.push(ConfigError::Validation {
            message: format!(
                "default_bot `{}` does not name a configured bot",
                config.default_bot
            ),
        });
    }

    if config.embedding_search.enabled {
        validate_service(
            "embedding_search.provider",
            &config.embedding_search.provider,
            &mut errors,
        );
        if config.embedding_search.dimensions == 0 {
            errors.push(ConfigError::Validation {
                message: "embedding_search.dimensions must be positive".to_string(),
            });
        }
    }

    let chunking = &config.embedding_search.chunking;
    if chunking.chunk_size > 0 && chunking.chunk_overlap >= chunking.chunk_size {
        errors.push(ConfigError::Validation {
            message: format!(
                "embedding_search.chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            ),
        });
    }
    if chunking.chunk_overlap < 0 {
        errors.push(ConfigError::Validation {
            message: "embedding_search.chunking.chunk_overlap must not be negative".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.mcp.enabled {
        for (i, server) in config.mcp.servers.iter().enumerate() {
            if server.url.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: format!("mcp.servers[{i}].url must not be empty"),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single bot declaration.
pub fn validate_bot(index: usize, bot: &BotConfig, errors: &mut Vec<ConfigError>) {
    if bot.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: format!("bots[{index}].name must not be empty"),
        });
    }
    if bot.display_name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: format!("bots[{index}].display_name must not be empty"),
        });
    }
    validate_service(&format!("bots[{index}].service"), &bot.service, errors);
}

fn validate_service(path: &str, service: &ServiceConfig, errors: &mut Vec<ConfigError>) {
    let needs_url = matches!(
        service.service_type,
        ServiceType::OpenAICompatible | ServiceType::Azure
    );
    if needs_url && service.api_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: format!(
                "{path}.api_url is required for service type `{}`",
                service.service_type.as_str()
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessLevel;

    fn bot(name: &str, display: &str, service_type: ServiceType) -> BotConfig {
        BotConfig {
            id: String::new(),
            name: name.into(),
            display_name: display.into(),
            custom_instructions: String::new(),
            service: ServiceConfig {
                service_type,
                ..Default::default()
            },
            enable_vision: false,
            disable_tools: false,
            channel_access_level: AccessLevel::All,
            channel_ids: vec![],
            user_access_level: AccessLevel::All,
            user_ids: vec![],
            team_ids: vec![],
            max_file_size: 1024,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn empty_names_are_rejected() {
        let config = ParleyConfig {
            bots: vec![bot("", "", ServiceType::OpenAI)],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn openai_compatible_requires_url() {
        let config = ParleyConfig {
            bots: vec![bot("ai", "AI", ServiceType::OpenAICompatible)],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("api_url"));
    }

    #[test]
    fn duplicate_names_and_unknown_default_are_collected() {
        let config = ParleyConfig {
            default_bot: "missing".into(),
            bots: vec![
                bot("ai", "AI", ServiceType::Anthropic),
                bot("ai", "AI Two", ServiceType::Anthropic),
            ],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
