//! Dedup and quality gate for candidate deals.
//!
//! Every candidate passes through [`DedupQualityEngine::admit`] before
//! anything is persisted. The steps run in a fixed order: identity hash,
//! exact-duplicate check, fuzzy-duplicate check within a trailing window,
//! confidence gate, then price/category heuristics on accepted records.
//! Brand/product splitting happens last and is display-only: it never
//! changes the admission outcome.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use leafwire_core::{
    defaults, identity_hash, leading_price, normalize_title, CandidateDeal, DealCategory,
    DealRepository, NewDeal, Result, ReviewFlagRepository, UpstreamSource,
};

use crate::env_parse;

/// Review reason codes, comma-joined into the deal's `review_reason`.
pub const REASON_LOW_CONFIDENCE: &str = "low_confidence";
pub const REASON_PRICE_HIGH: &str = "unusual_price_high";
pub const REASON_PRICE_LOW: &str = "unusual_price_low";
pub const REASON_CATEGORY_MISMATCH: &str = "category_mismatch";

/// Tolerance for comparing extracted leading prices: absorbs float
/// formatting differences ("$15" vs "$15.00") without matching distinct
/// prices.
const PRICE_MATCH_TOLERANCE: f64 = 0.005;

/// Quality gate thresholds. All values are policy, not correctness:
/// overridable per deployment.
#[derive(Debug, Clone)]
pub struct QualityConfig {
    /// Candidates below this confidence never become structured deals.
    pub confidence_floor_low: f64,
    /// Candidates between the floors are accepted but flagged for review.
    pub confidence_floor_high: f64,
    /// Trailing window for fuzzy duplicate detection, in days.
    pub dedup_window_days: i64,
    /// Leading prices above this are implausible.
    pub price_sanity_max: f64,
    /// Leading prices below this (but above zero) are implausible.
    pub price_sanity_min: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            confidence_floor_low: defaults::CONFIDENCE_FLOOR_LOW,
            confidence_floor_high: defaults::CONFIDENCE_FLOOR_HIGH,
            dedup_window_days: defaults::DEDUP_WINDOW_DAYS,
            price_sanity_max: defaults::PRICE_SANITY_MAX,
            price_sanity_min: defaults::PRICE_SANITY_MIN,
        }
    }
}

impl QualityConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUALITY_CONFIDENCE_LOW` | `0.5` | Low-confidence floor |
    /// | `QUALITY_CONFIDENCE_HIGH` | `0.7` | Review floor |
    /// | `QUALITY_DEDUP_WINDOW_DAYS` | `7` | Fuzzy dedup window |
    pub fn from_env() -> Self {
        Self {
            confidence_floor_low: env_parse("QUALITY_CONFIDENCE_LOW", defaults::CONFIDENCE_FLOOR_LOW),
            confidence_floor_high: env_parse(
                "QUALITY_CONFIDENCE_HIGH",
                defaults::CONFIDENCE_FLOOR_HIGH,
            ),
            dedup_window_days: env_parse("QUALITY_DEDUP_WINDOW_DAYS", defaults::DEDUP_WINDOW_DAYS),
            price_sanity_max: defaults::PRICE_SANITY_MAX,
            price_sanity_min: defaults::PRICE_SANITY_MIN,
        }
    }
}

/// Outcome of admitting a single candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitOutcome {
    /// Exact or fuzzy duplicate; nothing persisted.
    Duplicate { identity_hash: String },
    /// Below the low-confidence floor: not persisted as a structured
    /// deal. The caller collapses these into one summary placeholder per
    /// source.
    BelowConfidenceFloor,
    /// Persisted, clean or flagged for review.
    Accepted {
        deal_id: Uuid,
        identity_hash: String,
        needs_review: bool,
        review_reason: Option<String>,
    },
}

/// Aggregate result of admitting one source's candidate batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionStats {
    pub inserted: i64,
    pub duplicates: i64,
    pub below_floor: i64,
    pub flagged: i64,
    pub placeholder_inserted: bool,
}

/// Dedup and quality gate over the deal store.
#[derive(Clone)]
pub struct DedupQualityEngine {
    deals: Arc<dyn DealRepository>,
    review_flags: Arc<dyn ReviewFlagRepository>,
    config: QualityConfig,
}

impl DedupQualityEngine {
    /// Create a new engine over the given repositories.
    pub fn new(
        deals: Arc<dyn DealRepository>,
        review_flags: Arc<dyn ReviewFlagRepository>,
        config: QualityConfig,
    ) -> Self {
        Self {
            deals,
            review_flags,
            config,
        }
    }

    /// Admit a single candidate for one source.
    #[instrument(skip(self, candidate, source), fields(source_id = %source.id))]
    pub async fn admit(
        &self,
        candidate: &CandidateDeal,
        source: &UpstreamSource,
    ) -> Result<AdmitOutcome> {
        let today = Utc::now().date_naive();
        let normalized_title = normalize_title(&candidate.title);
        let hash = identity_hash(&source.name, &candidate.title, &candidate.price_text, today);

        // Exact duplicate: same hash for the same source (hash embeds the day).
        if self.deals.exists_exact(source.id, &hash).await? {
            debug!(identity_hash = %hash, "Rejected exact duplicate");
            return Ok(AdmitOutcome::Duplicate {
                identity_hash: hash,
            });
        }

        // Fuzzy duplicate: same normalized title and matching leading price
        // within the trailing window for this source.
        let since = Utc::now() - Duration::days(self.config.dedup_window_days);
        let price = leading_price(&candidate.price_text);
        let recent = self.deals.recent_for_source(source.id, since).await?;
        let is_fuzzy_dup = recent.iter().any(|existing| {
            existing.normalized_title == normalized_title
                && prices_match(leading_price(&existing.price_text), price)
        });
        if is_fuzzy_dup {
            debug!(identity_hash = %hash, "Rejected fuzzy duplicate");
            return Ok(AdmitOutcome::Duplicate {
                identity_hash: hash,
            });
        }

        // Confidence gate: below the low floor nothing structured is stored.
        if candidate.confidence < self.config.confidence_floor_low {
            return Ok(AdmitOutcome::BelowConfidenceFloor);
        }

        let mut reasons: Vec<&str> = Vec::new();
        if candidate.confidence < self.config.confidence_floor_high {
            reasons.push(REASON_LOW_CONFIDENCE);
        }
        if let Some(reason) = price_sanity_reason(
            price,
            self.config.price_sanity_min,
            self.config.price_sanity_max,
        ) {
            reasons.push(reason);
        }
        if !category_coherent(candidate.category, &normalized_title) {
            reasons.push(REASON_CATEGORY_MISMATCH);
        }

        let needs_review = !reasons.is_empty();
        let review_reason = if needs_review {
            Some(reasons.join(","))
        } else {
            None
        };

        // Display-only: never affects the outcome above.
        let (brand, product_name) = split_brand(candidate);

        let new_deal = NewDeal {
            source_id: source.id,
            category: candidate.category,
            title: candidate.title.clone(),
            normalized_title,
            brand,
            product_name,
            price_text: candidate.price_text.clone(),
            confidence: candidate.confidence,
            identity_hash: hash.clone(),
            valid: true,
            needs_review,
            review_reason: review_reason.clone(),
        };

        let deal_id = match self.deals.insert(&new_deal).await? {
            Some(id) => id,
            // Lost an insert race with an identical admission.
            None => {
                return Ok(AdmitOutcome::Duplicate {
                    identity_hash: hash,
                })
            }
        };

        if needs_review {
            self.review_flags
                .create(deal_id, review_reason.as_deref().unwrap_or_default())
                .await?;
        }

        Ok(AdmitOutcome::Accepted {
            deal_id,
            identity_hash: hash,
            needs_review,
            review_reason,
        })
    }

    /// Admit one source's candidate batch, collapsing all below-floor
    /// candidates into a single summary placeholder.
    pub async fn admit_all(
        &self,
        source: &UpstreamSource,
        candidates: &[CandidateDeal],
    ) -> Result<AdmissionStats> {
        let mut stats = AdmissionStats::default();
        for candidate in candidates {
            match self.admit(candidate, source).await? {
                AdmitOutcome::Accepted { needs_review, .. } => {
                    stats.inserted += 1;
                    if needs_review {
                        stats.flagged += 1;
                    }
                }
                AdmitOutcome::Duplicate { .. } => stats.duplicates += 1,
                AdmitOutcome::BelowConfidenceFloor => stats.below_floor += 1,
            }
        }

        if stats.below_floor > 0 {
            stats.placeholder_inserted = self.insert_summary_placeholder(source).await?;
        }

        Ok(stats)
    }

    /// One generic "deals available, see source" record per source per day,
    /// signaling activity without polluting listings with unreliable
    /// structure. The identity hash keeps it idempotent across runs.
    async fn insert_summary_placeholder(&self, source: &UpstreamSource) -> Result<bool> {
        let title = format!("Deals available at {} (see menu)", source.name);
        let today = Utc::now().date_naive();
        let hash = identity_hash(&source.name, &title, "", today);

        let new_deal = NewDeal {
            source_id: source.id,
            category: DealCategory::Other,
            title: title.clone(),
            normalized_title: normalize_title(&title),
            brand: None,
            product_name: None,
            price_text: String::new(),
            confidence: 0.0,
            identity_hash: hash,
            valid: true,
            needs_review: false,
            review_reason: None,
        };

        Ok(self.deals.insert(&new_deal).await?.is_some())
    }

    /// The engine's thresholds.
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }
}

/// Two extracted prices match when both are absent, or both present and
/// equal within tolerance.
fn prices_match(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() < PRICE_MATCH_TOLERANCE,
        (None, None) => true,
        _ => false,
    }
}

/// Price sanity heuristic: implausibly high or low leading prices route
/// the record to review. No extracted price is not itself suspicious.
fn price_sanity_reason(price: Option<f64>, min: f64, max: f64) -> Option<&'static str> {
    let price = price?;
    if price > max {
        Some(REASON_PRICE_HIGH)
    } else if price > 0.0 && price < min {
        Some(REASON_PRICE_LOW)
    } else {
        None
    }
}

/// Category/keyword coherence: at least one keyword from the category's
/// fixed set must appear in the normalized title. Categories without a
/// keyword set (Other) always pass.
fn category_coherent(category: DealCategory, normalized_title: &str) -> bool {
    let keywords = category.keywords();
    if keywords.is_empty() {
        return true;
    }
    keywords.iter().any(|k| normalized_title.contains(k))
}

/// Brand/product split for display. Prefers the structured brand field
/// from the extractor; falls back to a title-prefix heuristic (a short
/// prefix before " - " reads as a brand name).
fn split_brand(candidate: &CandidateDeal) -> (Option<String>, Option<String>) {
    if candidate.brand.is_some() {
        return (candidate.brand.clone(), candidate.product_name.clone());
    }
    if let Some((prefix, rest)) = candidate.title.split_once(" - ") {
        let prefix = prefix.trim();
        if !prefix.is_empty() && prefix.split_whitespace().count() <= 3 {
            return (
                Some(prefix.to_string()),
                candidate
                    .product_name
                    .clone()
                    .or_else(|| Some(rest.trim().to_string())),
            );
        }
    }
    (None, candidate.product_name.clone())
}
