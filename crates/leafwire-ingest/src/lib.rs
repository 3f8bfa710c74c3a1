//! # leafwire-ingest
//!
//! The ingestion core: lease-based zone scheduling, priority-ordered
//! bounded-concurrency dispatch, and the dedup/quality gate.
//!
//! This crate provides:
//! - [`ZoneLeaseScheduler`]: claims due zones atomically and refreshes
//!   their source catalogs via geocoding + discovery
//! - [`IngestionDispatcher`]: fans extraction out over sources in fixed
//!   windows, isolating per-source failures
//! - [`DedupQualityEngine`]: hashes, deduplicates, confidence-gates, and
//!   heuristic-checks candidate deals before persistence
//!
//! ## Example
//!
//! ```ignore
//! use leafwire_ingest::{IngestionDispatcher, DispatcherConfig, ZoneLeaseScheduler, SchedulerConfig};
//! use leafwire_db::Database;
//!
//! let db = Database::connect("postgres://...").await?;
//! let scheduler = ZoneLeaseScheduler::from_database(&db, geocoder, discovery, SchedulerConfig::default());
//! let stats = scheduler.run(None).await?;
//! println!("claimed {} zones", stats.claimed);
//! ```

pub mod dispatcher;
pub mod quality;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

// Re-export core types
pub use leafwire_core::*;

pub use dispatcher::{DispatcherConfig, IngestionDispatcher};
pub use quality::{AdmissionStats, AdmitOutcome, DedupQualityEngine, QualityConfig};
pub use scheduler::{SchedulerConfig, ZoneLeaseScheduler};

/// Parse an env var with a fallback default, for `from_env` constructors.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
