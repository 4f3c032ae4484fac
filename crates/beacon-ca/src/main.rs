//! Beacon CA Server Binary
//!
//! Runs the HTTP server issuing short-lived code-signing certificates.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use beacon_ca::{
    create_router, AppState, CaConfig, CtSubmitter, HttpCtLogClient, IssuanceService,
};
use beacon_oidc::{HttpKeySetFetcher, JwksCache, OidcVerifier};

#[tokio::main]
async fn main() {
    // Initialize logging
    let log_level = env::var("BEACON_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Configuration
    let port: u16 = env::var("BEACON_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("BEACON_PORT must be a valid port number");

    let config = match env::var("BEACON_CONFIG") {
        Ok(path) => CaConfig::from_file(&PathBuf::from(path)).expect("Failed to load config"),
        Err(_) => {
            info!("BEACON_CONFIG not set, starting with an ephemeral CA and no issuers");
            CaConfig::from_json(r#"{ "ca": { "backend": "ephemeral" } }"#)
                .expect("builtin default config")
        }
    };

    // Issuer registry and verifier
    let registry = Arc::new(config.registry().expect("Bad issuer configuration"));
    let jwks = JwksCache::new(Arc::new(HttpKeySetFetcher::default()));
    let verifier = Arc::new(OidcVerifier::new(registry, jwks));

    // Signing backend
    let backend = Arc::new(config.build_backend().expect("Failed to build CA backend"));

    // CT submitter
    let ct = config.ct.as_ref().map(|ct_config| {
        CtSubmitter::new(
            Arc::new(HttpCtLogClient::new(
                ct_config.url.clone(),
                reqwest::Client::new(),
            )),
            ct_config.sct_mode,
        )
    });

    let service = Arc::new(
        IssuanceService::new(verifier.clone(), backend, ct).with_lifetime(config.lifetime()),
    );

    info!(
        issuers = verifier.registry_snapshot().len(),
        ct = config.ct.is_some(),
        port = port,
        "Starting Beacon CA server"
    );

    // Create application state
    let state = Arc::new(AppState { service, verifier });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Beacon CA listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
