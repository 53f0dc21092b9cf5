// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared-secret authentication for inter-plugin calls.
//!
//! The expected secret is read from the live configuration on every request,
//! so rotating `inter_plugin.secret` takes effect without a restart. With no
//! secret configured every request is rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::server::GatewayState;

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-parley-plugin-secret";

pub async fn secret_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let config = state.config.snapshot();
    let Some(expected) = config
        .inter_plugin
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
    else {
        tracing::error!("inter-plugin secret is not configured; rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let provided = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected) {
        return Ok(next.run(request).await);
    }

    tracing::debug!(path = %request.uri().path(), "inter-plugin request rejected: bad secret");
    Err(StatusCode::UNAUTHORIZED)
}
