//! relay-gateway — HTTP surface of the chat relay
//!
//! Serves `/health`, `/realtime-token` and `/v1/chat` with bearer auth,
//! per-client rate limiting and an origin allow-list in front of the
//! provider fallback chain from `relay-core`.

pub mod auth;
pub mod protocol;
pub mod routes;
pub mod server;

pub use server::{AppState, GatewayServer};
