//! leafwire-api - HTTP server for ingestion triggers and the deal feed.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use leafwire_core::defaults;
use leafwire_db::Database;
use leafwire_ingest::{
    DedupQualityEngine, DispatcherConfig, IngestionDispatcher, QualityConfig, SchedulerConfig,
    ZoneLeaseScheduler,
};
use leafwire_providers::{HttpExtractionProvider, HttpGeocoder, PlacesDiscovery};

use handlers::{
    health, list_deals, list_reviews, list_runs, trigger_ingestion, trigger_zone_refresh,
};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically and
/// correlate cleanly across trigger runs in aggregated logs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub scheduler: Arc<ZoneLeaseScheduler>,
    pub dispatcher: Arc<IngestionDispatcher>,
    pub ingest_secret: String,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/ingest/zones", post(trigger_zone_refresh))
        .route("/api/v1/ingest/run", post(trigger_ingestion))
        .route("/api/v1/ingest/runs", get(list_runs))
        .route("/api/v1/deals", get(list_deals))
        .route("/api/v1/reviews", get(list_reviews))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(defaults::BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let ingest_secret = std::env::var("INGEST_SHARED_SECRET")
        .map_err(|_| anyhow::anyhow!("INGEST_SHARED_SECRET is not set"))?;

    let db = Database::connect(&database_url).await?;
    db.migrate().await?;
    info!("Database ready");

    let geocoder = Arc::new(HttpGeocoder::from_env());
    let discovery = Arc::new(PlacesDiscovery::from_env()?);
    let extractor = Arc::new(HttpExtractionProvider::from_env()?);

    let scheduler = Arc::new(ZoneLeaseScheduler::from_database(
        &db,
        geocoder,
        discovery,
        SchedulerConfig::from_env(),
    ));

    let engine = DedupQualityEngine::new(
        db.deals.clone(),
        db.review_flags.clone(),
        QualityConfig::from_env(),
    );
    let dispatcher = Arc::new(IngestionDispatcher::from_database(
        &db,
        extractor,
        engine,
        DispatcherConfig::from_env(),
    ));

    let state = AppState {
        db,
        scheduler,
        dispatcher,
        ingest_secret,
    };

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "leafwire-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
