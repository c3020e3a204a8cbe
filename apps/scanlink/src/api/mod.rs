//! # Station HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Dedup counts, pending slots, indicator state
//! - `POST /scan/barcode` - Submit a raw barcode payload
//! - `POST /scan/rfid` - Submit a formatted card UID
//! - `GET /seen/{identifier}` - Identifier membership check
//! - `GET /links` - All recorded links
//!
//! ## Security Configuration (`[server]` section)
//!
//! - `cors_origins`: allowed origins, or `["*"]` for all (default: localhost only)
//! - `rate_limit`: requests per second (default: 100, 0 to disable)
//! - `api_key`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    HealthResponse, LinksResponse, ScanBarcodeRequest, ScanResponse, ScanRfidRequest,
    SeenResponse, StatusResponse,
};

use crate::config::ServerConfig;
use crate::station::FeedbackController;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use scanlink_core::{CorrelationEngine, ScanlinkError};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size. Scan requests are a few dozen bytes.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The engine shared with the stream loops.
    pub engine: Arc<CorrelationEngine>,
    /// The station indicator, for status reporting.
    pub feedback: FeedbackController,
    /// Server settings (auth, limits, CORS).
    pub server: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        engine: Arc<CorrelationEngine>,
        feedback: FeedbackController,
        server: ServerConfig,
    ) -> Self {
        Self {
            engine,
            feedback,
            server: Arc::new(server),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `server.cors_origins`.
///
/// - `["*"]`: allows all origins (development only)
/// - empty: localhost only
/// - otherwise: the listed origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            let trimmed = origin.trim();
            match trimmed.parse::<HeaderValue>() {
                Ok(hv) => {
                    tracing::info!("CORS: Allowing origin: {}", trimmed);
                    Some(hv)
                }
                Err(e) => {
                    tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if allowed.is_empty() {
        if !origins.is_empty() {
            tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
        }
        return build_localhost_cors();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5000",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5000",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - if enabled
/// 5. Authentication - if an API key is configured
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.server.cors_origins);

    let rate_limiter = create_rate_limiter(state.server.rate_limit);
    match &rate_limiter {
        Some(_) => tracing::info!(
            "Rate limiting enabled: {} requests/second",
            state.server.rate_limit
        ),
        None => tracing::info!("Rate limiting disabled"),
    }

    let api_key = ApiKey::new(state.server.api_key.as_deref());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set server.api_key or SCANLINK_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/scan/barcode", post(handlers::scan_barcode_handler))
        .route("/scan/rfid", post(handlers::scan_rfid_handler))
        .route("/seen/{identifier}", get(handlers::seen_handler))
        .route("/links", get(handlers::links_handler));

    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API on `addr` until `shutdown` flips to `true`.
pub async fn run_server(
    addr: &str,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ScanlinkError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ScanlinkError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Station HTTP API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| ScanlinkError::IoError(format!("Server error: {}", e)))
}
