//! Payload sanitization — bound user-supplied chat fields before they reach
//! any provider.

use serde_json::Value;

use crate::providers::types::{
    ChatMessage, ChatOptions, DEFAULT_CHAT_MODEL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};

/// Only the most recent messages are forwarded
pub const MAX_MESSAGES: usize = 20;

/// Maximum role length, in characters
pub const MAX_ROLE_CHARS: usize = 32;

/// Maximum content length per message, in characters
pub const MAX_CONTENT_CHARS: usize = 4000;

const DEFAULT_ROLE: &str = "user";

/// Return the raw `messages` array when it is present and non-empty
pub fn raw_messages(body: &Value) -> Option<&[Value]> {
    body.get("messages")
        .and_then(Value::as_array)
        .filter(|messages| !messages.is_empty())
        .map(Vec::as_slice)
}

/// Keep the last [`MAX_MESSAGES`] entries and bound each field
pub fn sanitize_messages(raw: &[Value]) -> Vec<ChatMessage> {
    let start = raw.len().saturating_sub(MAX_MESSAGES);
    raw[start..].iter().map(sanitize_message).collect()
}

fn sanitize_message(raw: &Value) -> ChatMessage {
    let role = raw
        .get("role")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_ROLE);
    let content = raw.get("content").and_then(Value::as_str).unwrap_or("");

    ChatMessage {
        role: truncate_chars(role, MAX_ROLE_CHARS),
        content: truncate_chars(content, MAX_CONTENT_CHARS),
    }
}

/// Truncate on a character boundary, never splitting a code point
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Read tuning parameters, defaulting anything absent or not numeric
pub fn parse_options(body: &Value) -> ChatOptions {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_CHAT_MODEL)
        .to_string();

    let max_tokens = coerce_number(body.get("max_tokens"))
        .filter(|n| *n >= 1.0)
        .map(|n| n.min(u32::MAX as f64) as u32)
        .unwrap_or(DEFAULT_MAX_TOKENS);

    ChatOptions {
        model,
        max_tokens,
        temperature: coerce_number(body.get("temperature")).unwrap_or(DEFAULT_TEMPERATURE),
        top_p: coerce_number(body.get("top_p")).unwrap_or(DEFAULT_TOP_P),
        frequency_penalty: coerce_number(body.get("frequency_penalty")).unwrap_or(0.0),
        presence_penalty: coerce_number(body.get("presence_penalty")).unwrap_or(0.0),
    }
}

/// JSON numbers pass through; numeric strings are parsed
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}
