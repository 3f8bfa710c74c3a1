//! Read surface: the ranked deal feed, pending reviews, run history, and
//! liveness.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use leafwire_core::{
    DealCategory, DealRepository, FeedQuery, IngestRunRepository, ReviewFlagRepository,
    ZoneRepository,
};
use leafwire_rank::{present, rank};

use super::ApiError;
use crate::AppState;

/// Query parameters for the deal feed.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    /// Origin postal code for distance ranking.
    pub postal: Option<String>,
    pub category: Option<DealCategory>,
    pub brand: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/v1/deals`
///
/// Accepted, non-review-flagged deals from the trailing freshness window,
/// de-duplicated across sources by distance to the requesting location.
pub async fn list_deals(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let origin = match &params.postal {
        Some(postal) => state
            .db
            .zones
            .get_by_postal(postal)
            .await?
            .and_then(|zone| Some((zone.latitude?, zone.longitude?))),
        None => None,
    };

    let query = FeedQuery {
        category: params.category,
        brand: params.brand.clone(),
        since: None,
        limit: params.limit,
    };
    let rows = state.db.deals.feed(&query).await?;

    let ranked = rank(rows, origin);
    let presented = present(ranked, origin);

    Ok(Json(serde_json::json!({
        "count": presented.len(),
        "deals": presented,
    })))
}

/// `GET /api/v1/reviews`: pending review flags, read-only.
pub async fn list_reviews(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let flags = state.db.review_flags.list_pending(100).await?;
    Ok(Json(serde_json::json!({
        "count": flags.len(),
        "reviews": flags,
    })))
}

/// `GET /api/v1/ingest/runs`: recent trigger runs.
pub async fn list_runs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let runs = state.db.runs.list_recent(50).await?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}

/// `GET /api/v1/health`
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    sqlx::query("SELECT 1")
        .execute(&state.db.pool)
        .await
        .map_err(leafwire_core::Error::Database)?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
