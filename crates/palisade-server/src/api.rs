//! HTTP handlers for the relay's convenience endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use palisade_oracle::ReputationOracle;
use palisade_types::decode_pubkey;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::admission::Standing;
use crate::RelayContext;

/// Query string for `GET /api/v1/accept`.
#[derive(Debug, Deserialize)]
pub struct AcceptQuery {
    /// Hex or `npub` public key.
    pub pubkey: Option<String>,
}

/// Response body for `GET /api/v1/accept`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptResponse {
    /// Whether the pubkey would be admitted to publish developer kinds.
    pub accept: bool,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "accept": false,
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// NIP-11 relay information document.
pub async fn relay_info_handler<O: ReputationOracle + 'static>(
    Extension(ctx): Extension<Arc<RelayContext<O>>>,
) -> Response {
    let info = &ctx.info;
    let body = json!({
        "name": info.name,
        "description": info.description,
        "pubkey": info.pubkey,
        "contact": info.contact,
        "icon": info.icon,
        "banner": info.banner,
        "supported_nips": [1, 11, 50],
        "software": "palisade",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (
        [(header::CONTENT_TYPE, "application/nostr+json")],
        body.to_string(),
    )
        .into_response()
}

/// Handler for `GET /api/v1/accept?pubkey=<hex|npub>`.
///
/// Reports whether the pubkey passes the reputation gate. Blacklisted keys
/// get `403`. Nothing is recorded.
pub async fn accept_handler<O: ReputationOracle + 'static>(
    Extension(ctx): Extension<Arc<RelayContext<O>>>,
    Query(query): Query<AcceptQuery>,
) -> Result<Response, ApiError> {
    let raw = query
        .pubkey
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("pubkey is required".to_string()))?;
    let pubkey = decode_pubkey(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid pubkey: {e}")))?;

    let standing = ctx.admission.standing(&pubkey).await.map_err(|e| {
        tracing::warn!(pubkey = %pubkey, error = %e, "accept check failed");
        ApiError::InternalServerError("failed to verify pubkey".to_string())
    })?;

    let response = match standing {
        Standing::Blacklisted => (
            StatusCode::FORBIDDEN,
            Json(AcceptResponse { accept: false }),
        )
            .into_response(),
        Standing::Ranked { rank, accepted } => {
            tracing::info!(pubkey = %pubkey, rank, accepted, "accept check");
            Json(AcceptResponse { accept: accepted }).into_response()
        }
    };
    Ok(response)
}
