//! Chat fallback orchestrator
//!
//! Tries each configured provider in priority order (Gemini → Cohere →
//! OpenAI) and returns the first normalized response. A failing provider
//! never aborts the request; it is logged and the next one is tried.

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, DEFAULT_UPSTREAM_TIMEOUT};
use crate::error::RelayError;
use crate::providers::{
    ChatMessage, ChatOptions, ChatProvider, CohereProvider, GeminiProvider,
    NormalizedChatResponse, OpenAiProvider, ProviderError,
};
use crate::sanitize::{parse_options, raw_messages, sanitize_messages};

/// Routes chat requests across an ordered list of providers
#[derive(Clone)]
pub struct ChatRouter {
    providers: Vec<Arc<dyn ChatProvider>>,
    timeout: Duration,
}

impl std::fmt::Debug for ChatRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRouter")
            .field("providers", &self.provider_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ChatRouter {
    /// Build a router from providers already in priority order
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        Self {
            providers,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the Gemini → Cohere → OpenAI chain from whichever keys are set
    pub fn from_config(client: Client, config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn ChatProvider>> = Vec::new();

        if let Some(key) = &config.gemini_api_key {
            providers.push(Arc::new(
                GeminiProvider::new(client.clone(), key.clone())
                    .with_base_url(config.gemini_base_url.clone())
                    .with_model(config.gemini_model.clone()),
            ));
        }
        if let Some(key) = &config.cohere_api_key {
            providers.push(Arc::new(
                CohereProvider::new(client.clone(), key.clone())
                    .with_base_url(config.cohere_base_url.clone())
                    .with_model(config.cohere_model.clone()),
            ));
        }
        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(
                OpenAiProvider::new(client, key.clone())
                    .with_base_url(config.openai_base_url.clone()),
            ));
        }

        Self::new(providers).with_timeout(config.upstream_timeout)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Validate, sanitize and route a raw chat request body
    pub async fn handle(&self, body: &Value) -> Result<NormalizedChatResponse, RelayError> {
        if self.providers.is_empty() {
            return Err(RelayError::NoProvidersConfigured);
        }

        let raw = raw_messages(body)
            .ok_or_else(|| RelayError::InvalidPayload("messages array required".to_string()))?;
        let messages = sanitize_messages(raw);
        let options = parse_options(body);

        self.route(&messages, &options).await
    }

    /// Try each provider in order until one succeeds.
    ///
    /// Also a public entry point for already-sanitized messages, so it checks
    /// for an empty chain itself. `handle` checks earlier because an empty
    /// chain must win over payload validation.
    pub async fn route(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<NormalizedChatResponse, RelayError> {
        if self.providers.is_empty() {
            return Err(RelayError::NoProvidersConfigured);
        }

        for provider in &self.providers {
            match self.attempt(provider.as_ref(), messages, options).await {
                Ok(response) => {
                    info!(provider = provider.name(), "Chat request served");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(provider = provider.name(), "Provider failed: {}", e);
                    if provider.surfaces_upstream_errors()
                        && let ProviderError::Upstream {
                            provider,
                            status,
                            body,
                        } = e
                    {
                        return Err(RelayError::UpstreamPassthrough {
                            provider,
                            status,
                            body,
                        });
                    }
                }
            }
        }

        warn!("All {} providers failed", self.providers.len());
        Err(RelayError::AllProvidersUnavailable)
    }

    async fn attempt(
        &self,
        provider: &dyn ChatProvider,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<NormalizedChatResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, provider.call(messages, options)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.name().to_string(),
                after: self.timeout,
            }),
        }
    }
}
