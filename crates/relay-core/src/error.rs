//! User-visible error taxonomy

use thiserror::Error;

/// Errors that end a request and are reported to the caller
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidPayload(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Origin not allowed")]
    OriginNotAllowed,

    #[error("No AI providers configured")]
    NoProvidersConfigured,

    #[error("All AI providers unavailable")]
    AllProvidersUnavailable,

    /// A provider that surfaces its failures answered non-2xx; its status and
    /// body go back verbatim
    #[error("{provider} request failed")]
    UpstreamPassthrough {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("OPENAI_API_KEY not configured")]
    MissingOpenAiKey,

    #[error("Failed to create realtime session")]
    Realtime { status: Option<u16>, body: String },
}

impl RelayError {
    /// HTTP status the gateway answers with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::InvalidPayload(_) => 400,
            Self::RateLimited => 429,
            Self::OriginNotAllowed => 403,
            Self::UpstreamPassthrough { status, .. } => *status,
            Self::NoProvidersConfigured
            | Self::AllProvidersUnavailable
            | Self::MissingOpenAiKey
            | Self::Realtime { .. } => 500,
        }
    }

    /// Upstream status and body, for errors that mirror an upstream failure
    pub fn upstream_details(&self) -> Option<(Option<u16>, &str)> {
        match self {
            Self::UpstreamPassthrough { status, body, .. } => Some((Some(*status), body)),
            Self::Realtime { status, body } => Some((*status, body)),
            _ => None,
        }
    }
}
