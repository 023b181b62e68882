//! Provider-agnostic types shared by every chat adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// A sanitized chat message, ready to be forwarded upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Tuning parameters carried to each adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// The single response shape every adapter must produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

impl NormalizedChatResponse {
    /// Build a single-choice assistant response. Non-object usage is dropped.
    pub fn assistant(content: impl Into<String>, usage: Option<Value>) -> Self {
        let usage = match usage {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            choices: vec![Choice {
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: content.into(),
                },
            }],
            usage,
        }
    }

    /// Text of the first choice
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default()
    }
}

/// Failure of a single provider attempt
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Upstream {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an invalid response format: {detail}")]
    InvalidResponseFormat { provider: String, detail: String },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} did not respond within {after:?}")]
    Timeout { provider: String, after: Duration },
}

impl ProviderError {
    pub fn invalid_format(provider: &str, detail: impl Into<String>) -> Self {
        Self::InvalidResponseFormat {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    /// Wrap a reqwest failure. The request URL is stripped from the error so
    /// query-string credentials never reach logs.
    pub fn transport(provider: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            source: source.without_url(),
        }
    }

    /// Upstream HTTP status, when the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::Upstream { provider, .. }
            | Self::InvalidResponseFormat { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Timeout { provider, .. } => provider,
        }
    }
}

/// Trait that every chat-completion adapter implements
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name used in logs (e.g. "gemini")
    fn name(&self) -> &str;

    /// Whether an upstream HTTP failure from this provider should be handed
    /// back to the caller as-is instead of falling through.
    fn surfaces_upstream_errors(&self) -> bool {
        false
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<NormalizedChatResponse, ProviderError>;
}

/// Read a non-2xx response into a `ProviderError::Upstream`
pub(crate) async fn upstream_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Upstream {
        provider: provider.to_string(),
        status,
        body,
    }
}
