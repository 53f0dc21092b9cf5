// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider over the `/embeddings` endpoint.

use async_trait::async_trait;
use parley_config::model::ServiceConfig;
use parley_core::{EmbeddingProvider, ParleyError};
use tracing::debug;

use crate::client::OpenAIClient;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone)]
pub struct OpenAIEmbeddings {
    client: OpenAIClient,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddings {
    /// `dimensions` is the vector width the index was created with; the
    /// service's own `embedding_dimensions` wins when set.
    pub fn new(service: &ServiceConfig, dimensions: usize) -> Result<Self, ParleyError> {
        Ok(Self {
            client: OpenAIClient::new(service)?,
            model: if service.embedding_model.is_empty() {
                DEFAULT_EMBEDDING_MODEL.to_string()
            } else {
                service.embedding_model.clone()
            },
            dimensions: if service.embedding_dimensions > 0 {
                service.embedding_dimensions
            } else {
                dimensions
            },
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ParleyError> {
        let mut vectors = self.batch_embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ParleyError::provider("embedding response was empty"))
    }

    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ParleyError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimensions),
        };
        let url = self.client.endpoint("embeddings", &self.model);
        let mut response: EmbeddingResponse = self.client.post_json(&url, &request).await?;

        if response.data.len() != texts.len() {
            return Err(ParleyError::provider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);
        debug!(count = texts.len(), model = %self.model, "embedded batch");
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::model::ServiceType;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer, service_type: ServiceType) -> ServiceConfig {
        ServiceConfig {
            service_type,
            api_key: "k".into(),
            api_url: server.uri(),
            embedding_model: "embed-small".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn batch_results_follow_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"model": "embed-small", "dimensions": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                    {"index": 0, "embedding": [1.0, 0.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embeddings =
            OpenAIEmbeddings::new(&service(&server, ServiceType::OpenAICompatible), 3).unwrap();
        let vectors = embeddings
            .batch_embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        assert_eq!(embeddings.dimensions(), 3);
    }

    #[tokio::test]
    async fn azure_routes_through_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/embed-small/embeddings"))
            .and(query_param("api-version", crate::client::AZURE_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embeddings = OpenAIEmbeddings::new(&service(&server, ServiceType::Azure), 2).unwrap();
        assert_eq!(embeddings.embed("hello").await.unwrap(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn count_mismatch_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let embeddings =
            OpenAIEmbeddings::new(&service(&server, ServiceType::OpenAICompatible), 3).unwrap();
        let err = embeddings.embed("x").await.unwrap_err();
        assert!(matches!(err, ParleyError::Provider { .. }));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_request() {
        let server = MockServer::start().await;
        let embeddings =
            OpenAIEmbeddings::new(&service(&server, ServiceType::OpenAICompatible), 3).unwrap();
        assert!(embeddings.batch_embed(&[]).await.unwrap().is_empty());
    }
}
