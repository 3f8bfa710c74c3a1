//! Trigger endpoints for the zone scheduler and ingestion dispatcher.
//!
//! Both are invoked by an external timer with a shared-secret bearer
//! credential. Partial failure returns 200 with failure counts embedded;
//! only missing/invalid credentials and total batch failure are non-2xx.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use leafwire_core::{Error, IngestRunRepository};

use super::{require_bearer, ApiError};
use crate::AppState;

/// Query parameters for the zone refresh trigger.
#[derive(Debug, Deserialize)]
pub struct ZoneTriggerParams {
    /// Override the configured claim batch for this run.
    pub batch_size: Option<i64>,
}

/// `POST /api/v1/ingest/zones`
pub async fn trigger_zone_refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ZoneTriggerParams>,
) -> Result<impl IntoResponse, ApiError> {
    require_bearer(&headers, &state.ingest_secret)?;

    let started = Instant::now();
    let stats = state.scheduler.run(params.batch_size).await?;
    let duration_ms = started.elapsed().as_millis() as i64;

    if let Err(e) = state
        .db
        .runs
        .record(
            "zones",
            stats.processed,
            stats.failed,
            stats.skipped,
            0,
            duration_ms,
        )
        .await
    {
        warn!(error = %e, "Failed to record zone run");
    }

    info!(
        claimed = stats.claimed,
        processed = stats.processed,
        failed = stats.failed,
        skipped = stats.skipped,
        duration_ms,
        "Zone refresh trigger complete"
    );

    if stats.claimed > 0 && stats.failed == stats.claimed {
        return Err(ApiError::Internal(Error::Ingest(format!(
            "All {} claimed zones failed",
            stats.claimed
        ))));
    }

    Ok(Json(stats))
}

/// `POST /api/v1/ingest/run`
pub async fn trigger_ingestion(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_bearer(&headers, &state.ingest_secret)?;

    let started = Instant::now();
    let stats = state.dispatcher.run().await?;
    let duration_ms = started.elapsed().as_millis() as i64;

    if let Err(e) = state
        .db
        .runs
        .record(
            "deals",
            stats.processed,
            stats.failed,
            stats.skipped,
            stats.deals_inserted,
            duration_ms,
        )
        .await
    {
        warn!(error = %e, "Failed to record ingestion run");
    }

    info!(
        processed = stats.processed,
        failed = stats.failed,
        skipped = stats.skipped,
        deals_inserted = stats.deals_inserted,
        duration_ms,
        "Ingestion trigger complete"
    );

    if stats.sources_processed > 0 && stats.failed == stats.sources_processed {
        return Err(ApiError::Internal(Error::Ingest(format!(
            "All {} sources failed",
            stats.sources_processed
        ))));
    }

    Ok(Json(serde_json::json!({
        "processed": stats.processed,
        "skipped": stats.skipped,
        "failed": stats.failed,
        "deals_inserted": stats.deals_inserted,
        "dispensaries_processed": stats.sources_processed,
    })))
}
