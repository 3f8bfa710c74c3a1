//! Handler modules for leafwire-api.

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

pub mod deals;
pub mod ingest;

pub use deals::{health, list_deals, list_reviews, list_runs};
pub use ingest::{trigger_ingestion, trigger_zone_refresh};

// =============================================================================
// ERROR HANDLING
// =============================================================================

/// API-facing error with an HTTP status mapping.
#[derive(Debug)]
pub enum ApiError {
    Internal(leafwire_core::Error),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
}

impl From<leafwire_core::Error> for ApiError {
    fn from(err: leafwire_core::Error) -> Self {
        match &err {
            leafwire_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            leafwire_core::Error::ZoneNotFound(postal) => {
                ApiError::NotFound(format!("Zone not found: {}", postal))
            }
            leafwire_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            leafwire_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// TRIGGER AUTHENTICATION
// =============================================================================

/// Check the shared-secret bearer credential on a trigger request.
pub fn require_bearer(headers: &HeaderMap, secret: &str) -> Result<(), ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer credential".to_string()))?;

    if token != secret {
        return Err(ApiError::Unauthorized("Invalid credential".to_string()));
    }
    Ok(())
}
