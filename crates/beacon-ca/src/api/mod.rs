//! API module for the CA server

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use beacon_oidc::OidcVerifier;

use crate::issue::IssuanceService;

/// Application state shared across handlers
pub struct AppState {
    /// The issuance pipeline
    pub service: Arc<IssuanceService>,
    /// Verifier handle, for readiness reporting and registry swaps
    pub verifier: Arc<OidcVerifier>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub configured_issuers: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let issuers = state.verifier.registry_snapshot().len();
    Json(ReadyResponse {
        ready: issuers > 0,
        configured_issuers: issuers,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration for browser-based signing clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Issuance
        .route("/v1/signing-cert", post(handlers::create_signing_certificate))
        // Trust bundle
        .route("/v1/trust-bundle", get(handlers::get_trust_bundle))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
