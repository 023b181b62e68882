//! Runtime configuration, read from the environment with an optional TOML seed file

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::providers::cohere::{DEFAULT_COHERE_BASE_URL, DEFAULT_COHERE_MODEL};
use crate::providers::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::providers::openai::DEFAULT_OPENAI_BASE_URL;
use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
pub const DEFAULT_REALTIME_VOICE: &str = "alloy";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Which browser origins may call the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parse a comma-separated list. Empty input or a `*` entry means any origin.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| o.trim_end_matches('/').to_string())
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(list) => {
                let origin = origin.trim_end_matches('/');
                list.iter().any(|o| o == origin)
            }
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: AllowedOrigins,
    pub app_auth_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub gemini_model: String,
    pub cohere_model: String,
    pub upstream_timeout: Duration,
    pub openai_base_url: String,
    pub gemini_base_url: String,
    pub cohere_base_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("allowed_origins", &self.allowed_origins)
            .field("app_auth_token", &redact(&self.app_auth_token))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("cohere_api_key", &redact(&self.cohere_api_key))
            .field("realtime_model", &self.realtime_model)
            .field("realtime_voice", &self.realtime_voice)
            .field("gemini_model", &self.gemini_model)
            .field("cohere_model", &self.cohere_model)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from the environment, falling back to values in a
    /// TOML file (keys are the lower-cased variable names).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<E>(path: Option<&Path>, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let Some(path) = path else {
            return Ok(Self::from_lookup(env));
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file = parse_toml(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        // A blank environment value does not mask the file
        Ok(Self::from_lookup(|key| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file.get(&key.to_lowercase()).cloned())
        }))
    }

    /// Build configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Self {
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT),
            rate_limit_window: Duration::from_millis(parse_or(
                get("RATE_LIMIT_WINDOW_MS"),
                "RATE_LIMIT_WINDOW_MS",
                DEFAULT_WINDOW.as_millis() as u64,
            )),
            rate_limit_max: parse_or(get("RATE_LIMIT_RPM"), "RATE_LIMIT_RPM", DEFAULT_MAX_REQUESTS),
            allowed_origins: get("ALLOWED_ORIGIN")
                .map(|raw| AllowedOrigins::parse(&raw))
                .unwrap_or(AllowedOrigins::Any),
            app_auth_token: get("APP_AUTH_TOKEN"),
            openai_api_key: get("OPENAI_API_KEY"),
            gemini_api_key: get("GEMINI_API_KEY"),
            cohere_api_key: get("COHERE_API_KEY"),
            realtime_model: string_or("REALTIME_MODEL", DEFAULT_REALTIME_MODEL),
            realtime_voice: string_or("REALTIME_VOICE", DEFAULT_REALTIME_VOICE),
            gemini_model: string_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            cohere_model: string_or("COHERE_MODEL", DEFAULT_COHERE_MODEL),
            upstream_timeout: Duration::from_millis(parse_or(
                get("UPSTREAM_TIMEOUT_MS"),
                "UPSTREAM_TIMEOUT_MS",
                DEFAULT_UPSTREAM_TIMEOUT.as_millis() as u64,
            )),
            openai_base_url: string_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            gemini_base_url: string_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            cohere_base_url: string_or("COHERE_BASE_URL", DEFAULT_COHERE_BASE_URL),
        }
    }

    /// Names of the chat providers that have an API key, in fallback order
    pub fn configured_providers(&self) -> Vec<&'static str> {
        [
            ("gemini", &self.gemini_api_key),
            ("cohere", &self.cohere_api_key),
            ("openai", &self.openai_api_key),
        ]
        .into_iter()
        .filter(|(_, key)| key.is_some())
        .map(|(name, _)| name)
        .collect()
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
    }
}

/// Flatten a TOML document into lower-cased key → string value
fn parse_toml(raw: &str) -> Result<HashMap<String, String>> {
    let table: toml::Table = toml::from_str(raw)?;
    let mut values = HashMap::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(","),
            other => {
                warn!("Ignoring unsupported config value for '{}': {}", key, other);
                continue;
            }
        };
        values.insert(key.to_lowercase(), value);
    }
    Ok(values)
}
