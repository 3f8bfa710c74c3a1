//! Core traits for leafwire abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ZONE REPOSITORY
// =============================================================================

/// Repository for zone scheduling state.
#[async_trait]
pub trait ZoneRepository: Send + Sync {
    /// Atomically claim up to `batch_size` due zones, stamping each with a
    /// fresh lease token and an expiry `now + lease_secs`.
    ///
    /// A zone is due when it is active, `next_due <= now`, and its lease is
    /// absent or expired. The claim and the stamp are a single conditional
    /// update: two concurrent callers can never claim the same zone.
    /// Results are ordered by `next_due` ascending.
    async fn claim_due(&self, batch_size: i64, lease_secs: i64) -> Result<Vec<Zone>>;

    /// Mark a successfully refreshed zone: set `last_processed = now`,
    /// schedule the next run, and clear the lease. The update is guarded by
    /// the lease token so a stale holder cannot clobber a reclaimed zone.
    async fn complete(
        &self,
        zone_id: Uuid,
        lease_token: Uuid,
        next_due: DateTime<Utc>,
    ) -> Result<()>;

    /// Reschedule a zone without marking it processed (geocode miss or
    /// per-zone failure backoff), clearing the lease under the same token
    /// guard as [`complete`](Self::complete).
    async fn reschedule(
        &self,
        zone_id: Uuid,
        lease_token: Uuid,
        next_due: DateTime<Utc>,
    ) -> Result<()>;

    /// Store resolved coordinates and administrative metadata on a zone.
    async fn set_location(&self, zone_id: Uuid, location: &GeocodedLocation) -> Result<()>;

    /// Create a zone for a postal code if none exists; returns the zone
    /// either way. New zones are active and immediately due.
    async fn create_for_postal(&self, postal_code: &str) -> Result<Zone>;

    /// Fetch a zone by postal code.
    async fn get_by_postal(&self, postal_code: &str) -> Result<Option<Zone>>;

    /// Zones that have at least one active subscriber.
    async fn list_with_subscribers(&self) -> Result<Vec<Zone>>;

    /// Soft-pause a zone. Paused zones are never claimed.
    async fn pause(&self, zone_id: Uuid) -> Result<()>;
}

// =============================================================================
// SOURCE REPOSITORY
// =============================================================================

/// Repository for upstream sources.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Upsert a discovered source. Matches on stable `place_id` when
    /// present, falling back to name; updates mutable fields (coordinates,
    /// contact) on match, inserts otherwise. Returns the source id.
    async fn upsert_discovered(&self, discovered: &DiscoveredSource) -> Result<Uuid>;

    /// Link a source to a zone (idempotent).
    async fn link_zone(&self, source_id: Uuid, zone_id: Uuid) -> Result<()>;

    /// Apply a reliability delta, clamped to [0, 1], stamping
    /// `last_checked_at`. Sources falling below `floor` are deactivated.
    /// Returns the new score.
    async fn adjust_reliability(&self, source_id: Uuid, delta: f64, floor: f64) -> Result<f64>;

    /// Set or replace the extraction target for a source.
    async fn set_menu_url(&self, source_id: Uuid, menu_url: &str) -> Result<()>;

    /// All active sources, for radius and menu-target candidate merging.
    async fn list_active(&self) -> Result<Vec<UpstreamSource>>;

    /// Active sources linked to zones that have active subscribers.
    async fn list_for_subscribed_zones(&self) -> Result<Vec<UpstreamSource>>;

    /// Fetch a single source.
    async fn get(&self, source_id: Uuid) -> Result<UpstreamSource>;
}

// =============================================================================
// DEAL REPOSITORY
// =============================================================================

/// Query for the public deal feed.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub category: Option<DealCategory>,
    pub brand: Option<String>,
    /// Only deals created after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Repository for persisted deals.
#[async_trait]
pub trait DealRepository: Send + Sync {
    /// Insert a deal. Returns `None` when a row with the same
    /// (source, identity hash) already exists. The insert-if-absent is
    /// atomic, so concurrent duplicate admissions cannot both land.
    async fn insert(&self, deal: &NewDeal) -> Result<Option<Uuid>>;

    /// True if a deal with this identity hash exists for the source.
    async fn exists_exact(&self, source_id: Uuid, identity_hash: &str) -> Result<bool>;

    /// Deals for one source created after `since`, for the fuzzy
    /// duplicate window.
    async fn recent_for_source(&self, source_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Deal>>;

    /// Accepted, non-review-flagged deals for the public feed, joined with
    /// source display and ranking context.
    async fn feed(&self, query: &FeedQuery) -> Result<Vec<DealWithSource>>;
}

// =============================================================================
// REVIEW FLAG REPOSITORY
// =============================================================================

/// Repository for manual review flags.
#[async_trait]
pub trait ReviewFlagRepository: Send + Sync {
    /// Create a pending flag for a deal.
    async fn create(&self, deal_id: Uuid, reason: &str) -> Result<Uuid>;

    /// Pending flags, newest first.
    async fn list_pending(&self, limit: i64) -> Result<Vec<ReviewFlag>>;
}

// =============================================================================
// SUBSCRIBER & NOTIFICATION REPOSITORIES
// =============================================================================

/// Repository for subscribers.
#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Create a subscriber and ensure their zone exists.
    async fn create(&self, email: &str, postal_code: &str) -> Result<Uuid>;

    /// Active subscribers for a zone's postal code.
    async fn for_zone(&self, zone_id: Uuid) -> Result<Vec<Subscriber>>;
}

/// Repository for outbound notification records.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Record a zone-refreshed notification for each subscriber. Inserts
    /// are idempotent per (subscriber, zone, day); returns how many rows
    /// were actually created.
    async fn notify_zone_refreshed(&self, zone_id: Uuid, subscriber_ids: &[Uuid]) -> Result<i64>;
}

// =============================================================================
// INGEST RUN REPOSITORY
// =============================================================================

/// Repository for per-run statistics history.
#[async_trait]
pub trait IngestRunRepository: Send + Sync {
    /// Record one trigger run.
    async fn record(
        &self,
        kind: &str,
        processed: i64,
        failed: i64,
        skipped: i64,
        deals_inserted: i64,
        duration_ms: i64,
    ) -> Result<Uuid>;

    /// Recent runs, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<IngestRun>>;
}

// =============================================================================
// EXTERNAL COLLABORATORS
// =============================================================================

/// Resolves a postal code to coordinates and administrative metadata.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the code could not be resolved, never an error
    /// for a simply-unresolvable code. Errors are transport failures only.
    async fn resolve(&self, postal_code: &str) -> Result<Option<GeocodedLocation>>;
}

/// Finds candidate upstream sources near a coordinate.
#[async_trait]
pub trait SourceDiscovery: Send + Sync {
    /// May return an empty list.
    async fn search(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: u32,
        max_results: u32,
    ) -> Result<Vec<DiscoveredSource>>;
}

/// Extracts candidate deal records from a source's menu page.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// May return an empty list; errors on transport failure.
    async fn extract(&self, url: &str) -> Result<Vec<CandidateDeal>>;
}
