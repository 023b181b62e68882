//! Gateway server — axum router, origin policy and lifecycle

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use relay_core::{AllowedOrigins, ChatRouter, Config, RateLimiter, RealtimeClient, RelayError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};

use crate::protocol::ApiError;
use crate::routes;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// State shared by every request
pub struct AppState {
    pub config: Config,
    pub router: ChatRouter,
    pub realtime: RealtimeClient,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            router: ChatRouter::from_config(client.clone(), &config),
            realtime: RealtimeClient::from_config(client, &config),
            limiter: RateLimiter::new(config.rate_limit_max, config.rate_limit_window),
            config,
        })
    }
}

/// Reject requests whose `Origin` is outside the allow-list
async fn origin_guard(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if let Some(origin) = request.headers().get(ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.config.allowed_origins.allows(o))
            .unwrap_or(false);
        if !allowed {
            warn!("Rejected request from disallowed origin {:?}", origin);
            return ApiError(RelayError::OriginNotAllowed).into_response();
        }
    }
    next.run(request).await
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!("Ignoring invalid allowed origin '{}'", o);
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}

/// Build the HTTP application for the given state
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(routes::health))
        .route("/realtime-token", post(routes::realtime_token))
        .route("/v1/chat", post(routes::chat))
        .layer(cors)
        .layer(middleware::from_fn_with_state(state.clone(), origin_guard))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// The relay's HTTP server
pub struct GatewayServer {
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            state: Arc::new(AppState::from_config(config)?),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Bind `0.0.0.0:<port>` and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().context("Listener has no local address")?;
        let state = self.state;

        info!(
            %addr,
            providers = ?state.router.provider_names(),
            auth = state.config.app_auth_token.is_some(),
            "Relay listening"
        );

        // interval() panics on a zero period
        let sweep_every = state.limiter.window().max(MIN_SWEEP_INTERVAL);
        let sweeper = state.limiter.spawn_sweeper(sweep_every);
        let result = axum::serve(
            listener,
            app(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error");

        sweeper.abort();
        info!("Relay stopped");
        result
    }
}
