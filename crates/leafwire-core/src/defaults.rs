//! Centralized default constants for the leafwire system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// ZONE SCHEDULING
// =============================================================================

/// Default number of zones claimed per scheduler run.
pub const ZONE_CLAIM_BATCH: i64 = 10;

/// Hard upper bound on zones claimed per run, regardless of request.
pub const ZONE_CLAIM_BATCH_MAX: i64 = 50;

/// Lease duration in seconds. A zone stays locked at most this long even if
/// the claiming process crashes mid-run.
pub const ZONE_LEASE_SECS: i64 = 600;

/// Default zone refresh interval in seconds (6 hours).
pub const ZONE_REFRESH_INTERVAL_SECS: i64 = 21_600;

/// Reschedule delay after a geocoding miss (1 hour). Long enough to avoid a
/// retry storm against an upstream that cannot resolve the postal code.
pub const ZONE_GEOCODE_RETRY_SECS: i64 = 3_600;

/// Backoff after a per-zone processing failure (15 minutes).
pub const ZONE_FAILURE_BACKOFF_SECS: i64 = 900;

// =============================================================================
// SOURCE DISCOVERY
// =============================================================================

/// Search radius around a zone's coordinates, in meters.
pub const DISCOVERY_RADIUS_METERS: u32 = 10_000;

/// Maximum sources requested from discovery per zone.
pub const DISCOVERY_MAX_RESULTS: u32 = 20;

// =============================================================================
// INGESTION DISPATCH
// =============================================================================

/// Sources fanned out concurrently per dispatch window.
pub const DISPATCH_WINDOW_SIZE: usize = 5;

/// Reliability reward after a successful extraction.
pub const RELIABILITY_REWARD: f64 = 0.05;

/// Reliability penalty after a failed extraction. Deliberately larger than
/// the reward so repeated failure biases a source toward deactivation.
pub const RELIABILITY_PENALTY: f64 = 0.15;

/// Sources below this reliability are deactivated until manual review.
pub const RELIABILITY_FLOOR: f64 = 0.3;

/// Reliability assigned to newly discovered sources.
pub const RELIABILITY_INITIAL: f64 = 0.5;

/// Radius used when matching sources to subscriber zones, in miles.
pub const SUBSCRIBER_RADIUS_MILES: f64 = 15.0;

// =============================================================================
// QUALITY GATES
// =============================================================================

/// Candidates below this confidence are never persisted as structured
/// deals; they collapse into a single source-level summary placeholder.
pub const CONFIDENCE_FLOOR_LOW: f64 = 0.5;

/// Candidates between the low and high floors are accepted but flagged
/// for manual review.
pub const CONFIDENCE_FLOOR_HIGH: f64 = 0.7;

/// Trailing window for fuzzy duplicate detection, in days.
pub const DEDUP_WINDOW_DAYS: i64 = 7;

/// Leading prices above this are implausible for a single listed item.
pub const PRICE_SANITY_MAX: f64 = 200.0;

/// Leading prices below this (but above zero) are implausible.
pub const PRICE_SANITY_MIN: f64 = 1.0;

// =============================================================================
// READ SURFACE
// =============================================================================

/// Freshness window for the public deal feed, in days.
pub const FEED_WINDOW_DAYS: i64 = 2;

/// Default page size for feed queries.
pub const FEED_LIMIT: i64 = 100;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum request body size in bytes.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;
