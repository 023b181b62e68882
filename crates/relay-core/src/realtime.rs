//! Ephemeral session minting for the OpenAI realtime API

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RelayError;

/// Request body for realtime session creation
#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    model: &'a str,
    voice: &'a str,
}

/// Client for `POST /v1/realtime/sessions`
#[derive(Clone)]
pub struct RealtimeClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    voice: String,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}

impl RealtimeClient {
    pub fn from_config(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.realtime_model.clone(),
            voice: config.realtime_voice.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Create a realtime session and return the upstream JSON untouched.
    ///
    /// The response carries the ephemeral `client_secret.value` the mobile
    /// client uses to open its own realtime connection.
    pub async fn create_session(&self) -> Result<Value, RelayError> {
        let api_key = self.api_key.as_deref().ok_or(RelayError::MissingOpenAiKey)?;

        let url = format!(
            "{}/v1/realtime/sessions",
            self.base_url.trim_end_matches('/')
        );
        debug!(model = %self.model, voice = %self.voice, "Creating realtime session");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&SessionRequest {
                model: &self.model,
                voice: &self.voice,
            })
            .send()
            .await
            .map_err(|e| {
                warn!("Realtime session request failed: {}", e);
                RelayError::Realtime {
                    status: None,
                    body: e.without_url().to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Realtime session creation failed with status {}: {}", status, body);
            return Err(RelayError::Realtime {
                status: Some(status.as_u16()),
                body,
            });
        }

        let session: Value = response.json().await.map_err(|e| RelayError::Realtime {
            status: Some(status.as_u16()),
            body: e.without_url().to_string(),
        })?;

        info!(model = %self.model, "Realtime session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REALTIME_MODEL;
    use crate::test_support::spawn_upstream;
    use axum::Router;
    use axum::extract::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::json;

    fn config_with(base: &str, key: Option<&str>) -> Config {
        let mut config = Config::default();
        config.openai_base_url = base.to_string();
        config.openai_api_key = key.map(str::to_string);
        config
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = RealtimeClient::from_config(Client::new(), &config_with("http://unused", None));
        assert!(!client.is_configured());
        let err = client.create_session().await.unwrap_err();
        assert!(matches!(err, RelayError::MissingOpenAiKey));
    }

    #[tokio::test]
    async fn test_returns_upstream_json_verbatim() {
        let app = Router::new().route(
            "/v1/realtime/sessions",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "id": "sess_1",
                    "model": body["model"],
                    "voice": body["voice"],
                    "client_secret": {"value": "ek_123", "expires_at": 1}
                }))
            }),
        );
        let base = spawn_upstream(app).await;

        let client = RealtimeClient::from_config(Client::new(), &config_with(&base, Some("sk")));
        let session = client.create_session().await.unwrap();
        assert_eq!(session["client_secret"]["value"], "ek_123");
        assert_eq!(session["model"], DEFAULT_REALTIME_MODEL);
        assert_eq!(session["voice"], "alloy");
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_status_and_body() {
        let app = Router::new().route(
            "/v1/realtime/sessions",
            post(|| async { (StatusCode::FORBIDDEN, "no realtime access") }),
        );
        let base = spawn_upstream(app).await;

        let client = RealtimeClient::from_config(Client::new(), &config_with(&base, Some("sk")));
        match client.create_session().await.unwrap_err() {
            RelayError::Realtime { status, body } => {
                assert_eq!(status, Some(403));
                assert_eq!(body, "no realtime access");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
