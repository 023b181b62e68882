//! HTTP handlers

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use relay_core::{NormalizedChatResponse, RelayError};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::auth::{authorize, client_identity};
use crate::protocol::ApiError;
use crate::server::AppState;

/// Largest chat body accepted
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// `POST /realtime-token`
pub async fn realtime_token(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    authorize(request.headers(), state.config.app_auth_token.as_deref())?;

    let session = state.realtime.create_session().await?;
    Ok(Json(session))
}

/// `POST /v1/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<NormalizedChatResponse>, ApiError> {
    let (parts, body) = request.into_parts();
    authorize(&parts.headers, state.config.app_auth_token.as_deref())?;

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_id = client_identity(&parts.headers, peer);
    if state.limiter.check(&client_id) {
        return Err(RelayError::RateLimited.into());
    }

    // Unreadable or non-JSON bodies behave like an empty object
    let payload = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes).unwrap_or_else(|e| {
            debug!("Chat body is not valid JSON: {}", e);
            json!({})
        }),
        Err(e) => {
            debug!("Failed to read chat body: {}", e);
            json!({})
        }
    };

    let response = state.router.handle(&payload).await?;
    Ok(Json(response))
}
