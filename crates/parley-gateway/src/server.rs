// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::post};
use parley_agent::Service;
use parley_config::ConfigStore;
use parley_core::ParleyError;

use crate::auth::secret_middleware;
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<Service>,
    /// Live configuration; the secret is read from it per request.
    pub config: Arc<ConfigStore>,
}

/// Listen address for the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8065,
        }
    }
}

/// Builds the gateway routes.
///
/// - POST /inter-plugin/completion (shared secret)
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/inter-plugin/completion", post(handlers::post_completion))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            secret_middleware,
        ))
        .with_state(state)
}

/// Binds `config.host:config.port` and serves [`router`] until the server
/// fails.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), ParleyError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(addr = %addr, "gateway listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| ParleyError::Internal(format!("gateway server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use parley_agent::ServiceDeps;
    use parley_config::model::{BotConfig, ParleyConfig};
    use parley_storage::Database;
    use parley_test_utils::{MockHost, MockModel, MockModelFactory, MockReply};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn state(secret: Option<&str>, replies: Vec<MockReply>) -> (GatewayState, Arc<MockModel>) {
        let host = Arc::new(MockHost::new());
        host.add_simple_user("u1", "ann");
        let config = ParleyConfig {
            default_bot: "helper".into(),
            bots: vec![BotConfig {
                id: "helper".into(),
                name: "helper".into(),
                display_name: "Helper".into(),
                custom_instructions: String::new(),
                service: Default::default(),
                enable_vision: false,
                disable_tools: true,
                channel_access_level: Default::default(),
                channel_ids: vec![],
                user_access_level: Default::default(),
                user_ids: vec![],
                team_ids: vec![],
                max_file_size: 1024,
            }],
            inter_plugin: parley_config::model::InterPluginConfig {
                secret: secret.map(str::to_string),
            },
            ..Default::default()
        };
        let config = Arc::new(ConfigStore::new(config));
        let model = Arc::new(MockModel::with_replies(replies));
        let service = Service::new(ServiceDeps {
            host,
            config: config.clone(),
            factory: Arc::new(MockModelFactory::new(model.clone())),
            db: Database::open_in_memory().await.unwrap(),
            mcp_connector: None,
        })
        .unwrap();
        service.activate().await.unwrap();
        (GatewayState { service, config }, model)
    }

    fn completion(secret: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/inter-plugin/completion")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header("X-Parley-Plugin-Secret", secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn body() -> Value {
        json!({
            "systemPrompt": "You write for {{ parameters.audience }}.",
            "userPrompt": "Greet {{ requesting_user.username }}.",
            "requesterUserID": "u1",
            "parameters": {"audience": "engineers"}
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn completion_returns_the_full_answer() {
        let (state, model) = state(Some("s3cret"), vec![MockReply::text("Hello Ann!")]).await;
        let response = router(state)
            .oneshot(completion(Some("s3cret"), body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"response": "Hello Ann!"}));

        let request = &model.requests()[0];
        assert_eq!(request.posts[0].message, "You write for engineers.");
        assert_eq!(request.posts[1].message, "Greet ann.");
    }

    #[tokio::test]
    async fn wrong_or_missing_secret_is_rejected() {
        let (state, model) = state(Some("s3cret"), vec![]).await;
        let app = router(state);
        let wrong = app
            .clone()
            .oneshot(completion(Some("guess"), body()))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        let missing = app.oneshot(completion(None, body())).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn unconfigured_secret_fails_closed() {
        let (state, _) = state(None, vec![]).await;
        let response = router(state)
            .oneshot(completion(Some(""), body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_bot_is_not_found() {
        let (state, _) = state(Some("s3cret"), vec![]).await;
        let mut request = body();
        request["botUsername"] = json!("nobody");
        let response = router(state)
            .oneshot(completion(Some("s3cret"), request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("nobody"));
    }
}
