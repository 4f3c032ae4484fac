//! Trust-bundle handler: the CA chain clients should anchor on.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::AppState;

/// The configured CA's chain
#[derive(Debug, Serialize)]
pub struct TrustBundleResponse {
    /// PEM certificates, signer first, root last
    pub chain: Vec<String>,
}

/// Fetch the CA trust bundle
///
/// GET /v1/trust-bundle
pub async fn get_trust_bundle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TrustBundleResponse>, ApiError> {
    let chain = state.service.backend().root_bundle()?;
    Ok(Json(TrustBundleResponse { chain }))
}
