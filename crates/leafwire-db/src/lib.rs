//! # leafwire-db
//!
//! PostgreSQL database layer for leafwire.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for all core entities
//! - The atomic zone lease claim (conditional `UPDATE … RETURNING`)
//! - Test fixtures for integration tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use leafwire_db::Database;
//! use leafwire_core::ZoneRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/leafwire").await?;
//!     let zones = db.zones.claim_due(10, 600).await?;
//!     println!("claimed {} zones", zones.len());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod deals;
pub mod notifications;
pub mod pool;
pub mod review_flags;
pub mod runs;
pub mod sources;
pub mod subscribers;
pub mod zones;

// Test fixtures for integration tests
// Note: always compiled so integration tests (in tests/) can use
// DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use leafwire_core::*;

// Re-export repository implementations
pub use deals::PgDealRepository;
pub use notifications::PgNotificationRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use review_flags::PgReviewFlagRepository;
pub use runs::PgIngestRunRepository;
pub use sources::PgSourceRepository;
pub use subscribers::PgSubscriberRepository;
pub use zones::PgZoneRepository;

/// Combined database context with all repositories.
///
/// Repositories are Arc-wrapped so they coerce cheaply into the `dyn`
/// repository traits the ingest components take.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Zone scheduling state.
    pub zones: Arc<PgZoneRepository>,
    /// Upstream sources.
    pub sources: Arc<PgSourceRepository>,
    /// Quality-gated deals.
    pub deals: Arc<PgDealRepository>,
    /// Manual review flags.
    pub review_flags: Arc<PgReviewFlagRepository>,
    /// Subscribers.
    pub subscribers: Arc<PgSubscriberRepository>,
    /// Outbound notification records.
    pub notifications: Arc<PgNotificationRepository>,
    /// Trigger run history.
    pub runs: Arc<PgIngestRunRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            zones: Arc::new(PgZoneRepository::new(pool.clone())),
            sources: Arc::new(PgSourceRepository::new(pool.clone())),
            deals: Arc::new(PgDealRepository::new(pool.clone())),
            review_flags: Arc::new(PgReviewFlagRepository::new(pool.clone())),
            subscribers: Arc::new(PgSubscriberRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            runs: Arc::new(PgIngestRunRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))
    }
}
