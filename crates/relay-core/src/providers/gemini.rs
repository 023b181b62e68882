//! Google Gemini adapter (generateContent API)

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::types::{
    ChatMessage, ChatOptions, ChatProvider, NormalizedChatResponse, ProviderError, upstream_error,
};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const NAME: &str = "gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini only knows `user` and `model` turns
fn gemini_role(message: &ChatMessage) -> &'static str {
    if message.is_assistant() { "model" } else { "user" }
}

pub(crate) fn build_request(messages: &[ChatMessage], options: &ChatOptions) -> Value {
    let contents: Vec<Value> = messages
        .iter()
        .map(|m| {
            json!({
                "role": gemini_role(m),
                "parts": [{ "text": m.content }],
            })
        })
        .collect();

    json!({
        "contents": contents,
        "generationConfig": {
            "maxOutputTokens": options.max_tokens,
            "temperature": options.temperature,
            "topP": options.top_p,
        }
    })
}

pub(crate) fn parse_response(body: Value) -> Result<NormalizedChatResponse, ProviderError> {
    let text = body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderError::invalid_format(NAME, "missing candidates[0].content.parts[0].text")
        })?;

    Ok(NormalizedChatResponse::assistant(
        text,
        body.get("usageMetadata").cloned(),
    ))
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<NormalizedChatResponse, ProviderError> {
        let payload = build_request(messages, options);
        debug!(model = %self.model, messages = messages.len(), "Gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::transport(NAME, e))?;

        if !response.status().is_success() {
            return Err(upstream_error(NAME, response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_format(NAME, e.without_url().to_string()))?;

        parse_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_upstream;
    use axum::extract::{Json, Path};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[test]
    fn test_role_mapping_and_parts() {
        let messages = vec![
            ChatMessage::new("system", "be brief"),
            ChatMessage::new("user", "hi"),
            ChatMessage::new("assistant", "hello"),
        ];
        let body = build_request(&messages, &ChatOptions::default());
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[2]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(body["generationConfig"]["topP"], 1.0);
    }

    #[test]
    fn test_parse_without_usage_metadata() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "X"}]}}]});
        let resp = parse_response(body).unwrap();
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"choices": [{"message": {"role": "assistant", "content": "X"}}], "usage": {}})
        );
    }

    #[test]
    fn test_parse_copies_usage_metadata() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 1}
        });
        let resp = parse_response(body).unwrap();
        assert_eq!(resp.usage["promptTokenCount"], 3);
    }

    #[test]
    fn test_parse_rejects_missing_text() {
        for body in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{"content": {"parts": []}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": 5}]}}]}),
        ] {
            let err = parse_response(body).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidResponseFormat { .. }));
        }
    }

    #[tokio::test]
    async fn test_call_against_fake_upstream() {
        let seen: Arc<Mutex<Option<(String, String, Value)>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/v1beta/models/{target}",
            post(
                move |Path(target): Path<String>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| {
                    let captured = captured.clone();
                    async move {
                        let key = headers
                            .get("x-goog-api-key")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        *captured.lock().await = Some((target, key, body));
                        Json(json!({
                            "candidates": [{"content": {"parts": [{"text": "from gemini"}]}}],
                            "usageMetadata": {"totalTokenCount": 9}
                        }))
                    }
                },
            ),
        );
        let base = spawn_upstream(app).await;

        let provider = GeminiProvider::new(Client::new(), "g-key").with_base_url(base);
        let resp = provider
            .call(&[ChatMessage::new("user", "hi")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.text(), "from gemini");
        assert_eq!(resp.usage["totalTokenCount"], 9);

        let (target, key, body) = seen.lock().await.clone().unwrap();
        assert_eq!(target, "gemini-1.5-flash:generateContent");
        assert_eq!(key, "g-key");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn test_call_maps_http_failure() {
        let app = Router::new().route(
            "/v1beta/models/{target}",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = spawn_upstream(app).await;

        let provider = GeminiProvider::new(Client::new(), "g-key").with_base_url(base);
        let err = provider
            .call(&[ChatMessage::new("user", "hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        match err {
            ProviderError::Upstream { body, .. } => assert_eq!(body, "overloaded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        // Nothing listens on port 1
        let provider =
            GeminiProvider::new(Client::new(), "g-super-secret-key").with_base_url("http://127.0.0.1:1");
        let err = provider
            .call(&[ChatMessage::new("user", "hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
        let text = err.to_string();
        assert!(!text.contains("g-super-secret-key"), "{text}");
        assert!(!text.contains("key="), "{text}");
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = GeminiProvider::new(Client::new(), "super-secret");
        let dbg = format!("{:?}", provider);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
