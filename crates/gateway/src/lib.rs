//! HTTP API gateway for JurisFlow.
//!
//! Exposes the pipeline over REST: single-role invocation, full runs,
//! manual role invocation and supervisor follow-up on existing sessions,
//! history retrieval, and a health check.
//!
//! Built on Axum.

pub mod api;
pub mod auth;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use jurisflow_config::{AppConfig, GatewayConfig};
use jurisflow_pipeline::Pipeline;

pub use api::{ApiError, ApiState, SharedApiState};
pub use auth::TokenVerifier;

/// Build the full router.
///
/// Layers applied:
/// - CORS for the single configured origin
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedApiState, config: &GatewayConfig) -> Router {
    let cors = match HeaderValue::from_str(&config.allowed_origin) {
        Ok(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(origin)),
        Err(_) => {
            warn!(origin = %config.allowed_origin, "Invalid allowed_origin, cross-origin requests disabled");
            CorsLayer::new()
        }
    }
    .allow_methods([Method::GET, Method::POST])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api::v1_router(state))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until the process stops.
pub async fn start(
    config: &AppConfig,
    pipeline: Arc<Pipeline>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let verifier = TokenVerifier::new(config.auth.token_secret.as_deref());
    if !verifier.is_enabled() {
        warn!("No auth.token_secret configured: all requests are treated as anonymous");
    }

    let state = Arc::new(ApiState { pipeline, verifier });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
