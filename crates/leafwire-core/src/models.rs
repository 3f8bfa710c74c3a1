//! Core data models for leafwire.
//!
//! These types are shared across all leafwire crates and represent the
//! core domain entities of the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ZONES
// =============================================================================

/// Lifecycle status of a zone. Zones are never hard-deleted; a zone with no
/// remaining subscribers is paused instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    Active,
    Paused,
}

/// A geographic catchment keyed by postal code, with its own refresh
/// schedule and lease state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub postal_code: String,
    pub status: ZoneStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub region: Option<String>,
    /// Next time this zone is due for a refresh.
    pub next_due: DateTime<Utc>,
    /// Set while a scheduler run holds this zone. Valid only while
    /// `lease_expires_at` is in the future.
    pub lease_token: Option<Uuid>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub refresh_interval_secs: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SOURCES
// =============================================================================

/// A retailer/location discovered for a zone that may yield deal data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSource {
    pub id: Uuid,
    /// Stable identifier from the discovery provider, when available.
    /// When absent, `name` is the dedup key.
    pub place_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Extraction target: the menu page we fetch deals from.
    pub menu_url: Option<String>,
    /// Rolling reliability score in [0, 1]. Adjusted after every
    /// extraction attempt; sources below the floor are deactivated.
    pub reliability: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl UpstreamSource {
    /// Menu platforms that serve structured, consistently extractable
    /// listings. Sources on these hosts get top dispatch priority.
    pub const KNOWN_MENU_HOSTS: [&'static str; 4] = [
        "dutchie.com",
        "iheartjane.com",
        "weedmaps.com",
        "leafly.com",
    ];

    /// True if the menu URL points at a recognized menu platform.
    pub fn has_known_menu_platform(&self) -> bool {
        match &self.menu_url {
            Some(url) => Self::KNOWN_MENU_HOSTS.iter().any(|h| url.contains(h)),
            None => false,
        }
    }
}

/// A candidate source returned by the discovery provider, pre-persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredSource {
    pub place_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: Option<String>,
    pub website: Option<String>,
}

/// A postal code resolved to coordinates and administrative metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub region: Option<String>,
}

// =============================================================================
// DEALS
// =============================================================================

/// Product category of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealCategory {
    Flower,
    Edible,
    Vape,
    Concentrate,
    Preroll,
    Accessory,
    Other,
}

impl DealCategory {
    /// Keyword set used by the category/title coherence check. A title
    /// containing none of its category's keywords is flagged for review.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            DealCategory::Flower => &["flower", "bud", "eighth", "quarter", "ounce", "oz", "gram", "strain", "indica", "sativa", "hybrid"],
            DealCategory::Edible => &["edible", "gummy", "gummies", "chocolate", "cookie", "brownie", "mg", "chew", "beverage", "drink"],
            DealCategory::Vape => &["vape", "cart", "cartridge", "pen", "pod", "disposable", "510"],
            DealCategory::Concentrate => &["concentrate", "wax", "shatter", "rosin", "resin", "dab", "badder", "budder", "sauce", "diamond"],
            DealCategory::Preroll => &["preroll", "pre-roll", "joint", "blunt", "infused"],
            DealCategory::Accessory => &["battery", "grinder", "pipe", "bong", "paper", "lighter", "accessory"],
            DealCategory::Other => &[],
        }
    }

    /// All categories, in display order.
    pub fn all() -> &'static [DealCategory] {
        &[
            DealCategory::Flower,
            DealCategory::Preroll,
            DealCategory::Vape,
            DealCategory::Concentrate,
            DealCategory::Edible,
            DealCategory::Accessory,
            DealCategory::Other,
        ]
    }
}

/// Raw extraction output for one listing. Ephemeral: never persisted
/// directly, always passed through the quality engine first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDeal {
    pub category: DealCategory,
    pub title: String,
    pub brand: Option<String>,
    pub product_name: Option<String>,
    pub price_text: String,
    /// Extractor confidence in [0, 1].
    pub confidence: f64,
}

/// A persisted, quality-gated deal record. Never mutated by ingestion
/// after creation; review transitions are applied externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub source_id: Uuid,
    pub category: DealCategory,
    pub title: String,
    pub normalized_title: String,
    pub brand: Option<String>,
    pub product_name: Option<String>,
    pub price_text: String,
    pub confidence: f64,
    /// Deterministic fingerprint of (source, normalized title, normalized
    /// price, date). Unique per source.
    pub identity_hash: String,
    pub valid: bool,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert request for a new deal row.
#[derive(Debug, Clone)]
pub struct NewDeal {
    pub source_id: Uuid,
    pub category: DealCategory,
    pub title: String,
    pub normalized_title: String,
    pub brand: Option<String>,
    pub product_name: Option<String>,
    pub price_text: String,
    pub confidence: f64,
    pub identity_hash: String,
    pub valid: bool,
    pub needs_review: bool,
    pub review_reason: Option<String>,
}

/// A deal joined with its source's display and ranking context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealWithSource {
    pub deal: Deal,
    pub source_name: String,
    pub source_latitude: Option<f64>,
    pub source_longitude: Option<f64>,
}

// =============================================================================
// REVIEW FLAGS
// =============================================================================

/// Terminal states are applied by an external reviewer; ingestion only
/// ever creates `Pending` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Fixed,
}

/// Links a deal to a pending manual decision with a reason code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub reason: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SUBSCRIBERS & NOTIFICATIONS
// =============================================================================

/// A user subscribed to a postal code. Thin by design: billing and
/// account management live outside this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub postal_code: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// RUN STATISTICS
// =============================================================================

/// Counts returned by a zone scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRunStats {
    pub claimed: i64,
    pub processed: i64,
    pub failed: i64,
    pub skipped: i64,
}

/// Counts returned by an ingestion dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub processed: i64,
    pub skipped: i64,
    pub failed: i64,
    pub deals_inserted: i64,
    pub sources_processed: i64,
}

/// Persisted record of one trigger run, for operational visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRun {
    pub id: Uuid,
    /// "zones" or "deals".
    pub kind: String,
    pub processed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub deals_inserted: i64,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
