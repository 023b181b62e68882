//! JSON error bodies returned to HTTP callers

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_core::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body: always an `error` message, plus upstream `status`/`details`
/// when the failure mirrors an upstream response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: None,
            details: None,
        }
    }
}

/// Upstream bodies are usually JSON; keep them structured when they parse
fn details_value(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Adapter from [`RelayError`] to an HTTP response
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn body(&self) -> ErrorBody {
        let mut body = ErrorBody::new(self.0.to_string());
        if let Some((status, details)) = self.0.upstream_details() {
            body.status = status;
            body.details = Some(details_value(details));
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}
