//! MediCore REST API
//!
//! HTTP surface of the MediCore clinic platform: authentication, refresh
//! sessions and account management.
//!
//! # API Structure
//!
//! ```text
//! /api/
//! ├── /auth          - Register, login, refresh, logout, Google sign-in
//! ├── /auth/sessions - Per-device refresh sessions of the caller
//! ├── /users         - Profile, password, account management
//! └── /meta          - Roles, departments, capabilities
//! /health, /ready    - Liveness and readiness
//! /api-docs          - OpenAPI description
//! ```
//!
//! # Authentication
//!
//! - **Bearer Token**: access token in the `Authorization` header
//! - **Refresh Cookie**: http-only `refresh_token` cookie scoped to `/api`,
//!   accepted only by `/api/auth/refresh` and `/api/auth/logout`

pub mod cookies;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Enable CORS for browser clients
    pub enable_cors: bool,
    /// Allowed origins; `*` allows any origin without credentials
    pub cors_origins: Vec<String>,
    /// Enable response compression
    pub enable_compression: bool,
    /// Enable request tracing
    pub enable_tracing: bool,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["http://localhost:5173".to_string()],
            enable_compression: true,
            enable_tracing: true,
            request_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Create the main API router with all middleware
pub fn create_router(state: Arc<AppState>, config: ApiConfig) -> Router {
    let mut router = base_router(state)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::new(config.request_timeout));

    // Add tracing
    if config.enable_tracing {
        router = router.layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        );
    }

    // Request IDs wrap tracing so the span can see them
    let x_request_id = HeaderName::from_static("x-request-id");
    router = router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    if config.enable_compression {
        router = router.layer(CompressionLayer::new());
    }

    if config.enable_cors {
        router = router.layer(cors_layer(&config.cors_origins));
    }

    router
}

/// Router without the outer middleware stack, for tests
pub fn create_test_router(state: Arc<AppState>) -> Router {
    base_router(state)
}

fn base_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", routes::api_routes(&state))
        .route("/health", axum::routing::get(handlers::health_check))
        .route("/ready", axum::routing::get(handlers::readiness_check))
        .merge(routes::docs_routes())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

/// The refresh cookie needs credentialed CORS, which rules out wildcards
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(
            origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(extractors::DEVICE_HEADER),
        ])
        .allow_credentials(true)
}
