//! OpenAI chat completions adapter, the last resort in the fallback chain

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::types::{
    ChatMessage, ChatOptions, ChatProvider, NormalizedChatResponse, ProviderError, upstream_error,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

const NAME: &str = "openai";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Messages go out as-is; the model comes from the caller's request
pub(crate) fn build_request(messages: &[ChatMessage], options: &ChatOptions) -> Value {
    json!({
        "model": options.model,
        "messages": messages,
        "max_tokens": options.max_tokens,
        "temperature": options.temperature,
        "top_p": options.top_p,
        "frequency_penalty": options.frequency_penalty,
        "presence_penalty": options.presence_penalty,
    })
}

pub(crate) fn parse_response(body: Value) -> Result<NormalizedChatResponse, ProviderError> {
    let text = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::invalid_format(NAME, "missing choices[0].message.content"))?;

    Ok(NormalizedChatResponse::assistant(text, body.get("usage").cloned()))
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn surfaces_upstream_errors(&self) -> bool {
        true
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<NormalizedChatResponse, ProviderError> {
        let payload = build_request(messages, options);
        debug!(model = %options.model, messages = messages.len(), "OpenAI request");

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
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
