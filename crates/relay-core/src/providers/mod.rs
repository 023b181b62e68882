//! Chat-completion provider adapters
//!
//! Each upstream vendor (Gemini, Cohere, OpenAI) implements the
//! [`ChatProvider`] trait and is composed by [`crate::ChatRouter`] into an
//! ordered fallback chain.

pub mod cohere;
pub mod gemini;
pub mod openai;
pub mod types;

pub use cohere::CohereProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use types::{
    ChatMessage, ChatOptions, ChatProvider, NormalizedChatResponse, ProviderError,
};
