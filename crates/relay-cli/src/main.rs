//! relay — chat fallback relay
//!
//! Usage:
//!   relay serve [--port 8787] [--config relay.toml]
//!   relay check [--config relay.toml]
//!
//! Configuration comes from environment variables, optionally seeded from a
//! TOML file whose keys are the lower-cased variable names.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use relay_core::{AllowedOrigins, Config};
use relay_gateway::GatewayServer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Chat relay with provider fallback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// TOML file seeding the configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the effective configuration without starting the server
    Check {
        /// TOML file seeding the configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve { port, config } => serve(port, config).await,
        Command::Check { config } => check(config),
    }
}

async fn serve(port: Option<u16>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(port) = port {
        config.port = port;
    }

    info!("relay v{} starting", env!("CARGO_PKG_VERSION"));
    let server = GatewayServer::new(config).context("Failed to initialize gateway")?;
    server.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
    }
}

fn check(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    for line in report(&config) {
        println!("{}", line);
    }

    if config.configured_providers().is_empty() {
        bail!("No AI providers configured (set GEMINI_API_KEY, COHERE_API_KEY or OPENAI_API_KEY)");
    }
    Ok(())
}

/// Human-readable summary of the effective configuration
fn report(config: &Config) -> Vec<String> {
    let key_line = |name: &str, key: &Option<String>| match key {
        Some(k) => format!("  {:<16} set ({})", name, mask(k)),
        None => format!("  {:<16} not set", name),
    };

    let origins = match &config.allowed_origins {
        AllowedOrigins::Any => "any".to_string(),
        AllowedOrigins::List(list) => list.join(", "),
    };

    vec![
        "Providers (fallback order):".to_string(),
        key_line("GEMINI_API_KEY", &config.gemini_api_key),
        key_line("COHERE_API_KEY", &config.cohere_api_key),
        key_line("OPENAI_API_KEY", &config.openai_api_key),
        format!("Port:            {}", config.port),
        format!(
            "App auth:        {}",
            if config.app_auth_token.is_some() { "bearer token required" } else { "disabled" }
        ),
        format!("Allowed origins: {}", origins),
        format!(
            "Rate limit:      {} requests / {} ms",
            config.rate_limit_max,
            config.rate_limit_window.as_millis()
        ),
        format!("Upstream timeout: {} ms", config.upstream_timeout.as_millis()),
        format!(
            "Realtime:        {} ({})",
            config.realtime_model, config.realtime_voice
        ),
    ]
}

/// Show only the first and last four characters of a secret
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}
