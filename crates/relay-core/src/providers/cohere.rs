//! Cohere adapter (v1 chat API)

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::types::{
    ChatMessage, ChatOptions, ChatProvider, NormalizedChatResponse, ProviderError, upstream_error,
};

pub const DEFAULT_COHERE_BASE_URL: &str = "https://api.cohere.ai";
pub const DEFAULT_COHERE_MODEL: &str = "command-r";

const NAME: &str = "cohere";

#[derive(Clone)]
pub struct CohereProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for CohereProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl CohereProvider {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_COHERE_BASE_URL.to_string(),
            model: DEFAULT_COHERE_MODEL.to_string(),
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
}

fn cohere_role(message: &ChatMessage) -> &'static str {
    if message.is_assistant() { "CHATBOT" } else { "USER" }
}

/// The last message becomes `message`, everything before it `chat_history`
pub(crate) fn build_request(model: &str, messages: &[ChatMessage], options: &ChatOptions) -> Value {
    let (last, history) = match messages.split_last() {
        Some((last, history)) => (last.content.as_str(), history),
        None => ("", messages),
    };

    let chat_history: Vec<Value> = history
        .iter()
        .map(|m| json!({ "role": cohere_role(m), "message": m.content }))
        .collect();

    json!({
        "model": model,
        "message": last,
        "chat_history": chat_history,
        "max_tokens": options.max_tokens,
        "temperature": options.temperature,
        "p": options.top_p,
    })
}

pub(crate) fn parse_response(body: Value) -> Result<NormalizedChatResponse, ProviderError> {
    let text = body
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::invalid_format(NAME, "missing text"))?;

    Ok(NormalizedChatResponse::assistant(text, body.get("meta").cloned()))
}

#[async_trait]
impl ChatProvider for CohereProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<NormalizedChatResponse, ProviderError> {
        let payload = build_request(&self.model, messages, options);
        debug!(model = %self.model, history = messages.len().saturating_sub(1), "Cohere request");

        let response = self
            .client
            .post(format!("{}/v1/chat", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
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
