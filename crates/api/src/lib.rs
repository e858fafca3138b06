//! HTTP surface for the questdeck resilience core
//!
//! Exposes the health reporting endpoint, the error reporting endpoint, and
//! the security status/block operations over an axum router, with a
//! rate-limit middleware in front of the API routes. All shared state is
//! explicitly constructed and injected through [`AppState`]; nothing here
//! is global.

pub mod config;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ApiConfig;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use questdeck_core::{Error, Result};
use std::time::Duration;

/// Build the full router. Health endpoints stay outside the rate limiter so
/// automated liveness probes are never throttled.
pub fn router(state: AppState, config: &ApiConfig) -> Router {
    let limiter = middleware::RateLimitLayer {
        guard: state.guard.clone(),
        max_requests: config.max_requests,
        window: Duration::from_millis(config.window_ms),
    };

    let api = Router::new()
        .route("/api/errors", post(routes::errors::report_error))
        .route("/api/errors/metrics", get(routes::errors::error_metrics))
        .route(
            "/api/security/blocks",
            get(routes::security::blocked_identifiers).post(routes::security::block_identifier),
        )
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit,
        ));

    Router::new()
        .route("/health", get(routes::health::health_report))
        .route("/health/live", get(routes::health::liveness))
        .merge(api)
        .with_state(state)
}

/// Bind and serve until the task is cancelled.
pub async fn serve(config: ApiConfig, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| Error::network(&config.bind_addr, e.to_string()))?;
    tracing::info!(addr = %config.bind_addr, "questdeck api listening");
    let app = router(state, &config)
        .into_make_service_with_connect_info::<std::net::SocketAddr>();
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::network(&config.bind_addr, e.to_string()))
}
