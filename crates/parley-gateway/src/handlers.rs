// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the inter-plugin API.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_agent::InterPluginRequest;
use parley_core::ParleyError;
use serde::Serialize;

use crate::server::GatewayState;

/// Response body for POST /inter-plugin/completion.
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// HTTP status for a failed completion.
pub fn status_for(error: &ParleyError) -> StatusCode {
    match error {
        ParleyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ParleyError::NotFound(_) => StatusCode::NOT_FOUND,
        ParleyError::Forbidden(_)
        | ParleyError::UsageRestriction(_)
        | ParleyError::PermissionLost(_) => StatusCode::FORBIDDEN,
        ParleyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ParleyError::Provider { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /inter-plugin/completion
///
/// Runs a one-shot completion and returns the whole answer.
pub async fn post_completion(
    State(state): State<GatewayState>,
    Json(body): Json<InterPluginRequest>,
) -> Response {
    let requester = body.requester_user_id.clone();
    match state.service.inter_plugin_completion(body).await {
        Ok(response) => (StatusCode::OK, Json(CompletionResponse { response })).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(requester = %requester, error = %e, "inter-plugin completion failed");
            } else {
                tracing::debug!(requester = %requester, error = %e, "inter-plugin completion refused");
            }
            (status, Json(ErrorResponse { error: e.to_string() })).into_response()
        }
    }
}
