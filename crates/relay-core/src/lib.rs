//! relay-core — chat fallback routing for the relay
//!
//! Provider adapters, the fallback orchestrator, payload sanitization,
//! per-client rate limiting, realtime session minting and configuration.

pub mod config;
pub mod error;
pub mod providers;
pub mod rate_limit;
pub mod realtime;
pub mod router;
pub mod sanitize;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{AllowedOrigins, Config};
pub use error::RelayError;
pub use providers::{ChatMessage, ChatOptions, ChatProvider, NormalizedChatResponse, ProviderError};
pub use rate_limit::RateLimiter;
pub use realtime::RealtimeClient;
pub use router::ChatRouter;
