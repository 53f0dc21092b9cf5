// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps service configuration to concrete adapters.

use std::sync::Arc;

use parley_anthropic::AnthropicModel;
use parley_config::model::{BotConfig, EmbeddingSearchConfig, ServiceType};
use parley_core::{EmbeddingProvider, LanguageModel, ParleyError};
use parley_openai::{OpenAIEmbeddings, OpenAIModel};
use tracing::info;

use crate::truncation::TruncationWrapper;

/// Builds models and embedding providers from configuration.
///
/// The agent holds one factory and asks it for a fresh model whenever the
/// bot set is reconciled, so tests can swap in scripted models.
pub trait ModelFactory: Send + Sync {
    /// The bot's chat model, already wrapped for truncation.
    fn chat_model(&self, bot: &BotConfig) -> Result<Arc<dyn LanguageModel>, ParleyError>;

    fn embedding_provider(
        &self,
        config: &EmbeddingSearchConfig,
    ) -> Result<Arc<dyn EmbeddingProvider>, ParleyError>;
}

/// Factory over the bundled Anthropic and OpenAI-family adapters.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultModelFactory;

impl ModelFactory for DefaultModelFactory {
    fn chat_model(&self, bot: &BotConfig) -> Result<Arc<dyn LanguageModel>, ParleyError> {
        let service = &bot.service;
        let model: Arc<dyn LanguageModel> = match service.service_type {
            ServiceType::Anthropic => Arc::new(AnthropicModel::new(service, bot.enable_vision)?),
            ServiceType::OpenAI | ServiceType::OpenAICompatible | ServiceType::Azure => {
                Arc::new(OpenAIModel::new(service, bot.enable_vision)?)
            }
        };
        info!(
            bot = %bot.name,
            service = service.service_type.as_str(),
            "chat model ready"
        );
        Ok(Arc::new(TruncationWrapper::new(model)))
    }

    fn embedding_provider(
        &self,
        config: &EmbeddingSearchConfig,
    ) -> Result<Arc<dyn EmbeddingProvider>, ParleyError> {
        match config.provider.service_type {
            ServiceType::OpenAI | ServiceType::OpenAICompatible | ServiceType::Azure => Ok(
                Arc::new(OpenAIEmbeddings::new(&config.provider, config.dimensions)?),
            ),
            ServiceType::Anthropic => Err(ParleyError::Config(
                "anthropic does not provide embeddings".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::model::ServiceConfig;

    fn bot(service_type: ServiceType, api_url: &str) -> BotConfig {
        BotConfig {
            id: "b1".into(),
            name: "copilot".into(),
            display_name: "Copilot".into(),
            custom_instructions: String::new(),
            service: ServiceConfig {
                service_type,
                api_key: "k".into(),
                api_url: api_url.into(),
                input_token_limit: 4000,
                ..Default::default()
            },
            enable_vision: false,
            disable_tools: false,
            channel_access_level: Default::default(),
            channel_ids: Vec::new(),
            user_access_level: Default::default(),
            user_ids: Vec::new(),
            team_ids: Vec::new(),
            max_file_size: 1024,
        }
    }

    #[test]
    fn builds_each_service_type() {
        let factory = DefaultModelFactory;
        for (service_type, url) in [
            (ServiceType::OpenAI, ""),
            (ServiceType::OpenAICompatible, "http://localhost:8080/v1"),
            (ServiceType::Azure, "https://example.openai.azure.com"),
            (ServiceType::Anthropic, ""),
        ] {
            let model = factory.chat_model(&bot(service_type, url)).unwrap();
            assert_eq!(model.input_token_limit(), 4000);
        }
    }

    #[test]
    fn compatible_without_url_is_a_config_error() {
        let err = DefaultModelFactory
            .chat_model(&bot(ServiceType::OpenAICompatible, ""))
            .err()
            .unwrap();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[test]
    fn anthropic_has_no_embeddings() {
        let config = EmbeddingSearchConfig {
            provider: ServiceConfig {
                service_type: ServiceType::Anthropic,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(DefaultModelFactory.embedding_provider(&config).is_err());

        let config = EmbeddingSearchConfig::default();
        let provider = DefaultModelFactory.embedding_provider(&config).unwrap();
        assert_eq!(provider.dimensions(), 1536);
    }
}
