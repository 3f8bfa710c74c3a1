//! Structured logging schema and field name constants for leafwire.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), run completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (candidates, sources) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → run → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "ingest", "providers", "rank"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "claim_due", "refresh_zone", "process_batch", "admit"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Zone UUID being operated on.
pub const ZONE_ID: &str = "zone_id";

/// Postal code of the zone.
pub const POSTAL_CODE: &str = "postal_code";

/// Upstream source UUID being processed.
pub const SOURCE_ID: &str = "source_id";

/// Deal UUID created or rejected.
pub const DEAL_ID: &str = "deal_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of zones claimed in a scheduler run.
pub const CLAIMED: &str = "claimed";

/// Number of sources returned by discovery.
pub const DISCOVERED: &str = "discovered";

/// Number of candidate deals returned by extraction.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of deals inserted after the quality gate.
pub const DEALS_INSERTED: &str = "deals_inserted";

/// Reliability score after an adjustment.
pub const RELIABILITY: &str = "reliability";
