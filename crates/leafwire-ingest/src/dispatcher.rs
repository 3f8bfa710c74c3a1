//! Ingestion dispatcher: priority-ordered, concurrency-bounded extraction
//! over upstream sources.
//!
//! Each run builds the candidate source list, orders it by expected yield,
//! then processes it in fixed-size windows. Window members fan out
//! concurrently and the dispatcher waits for the entire window before
//! starting the next, bounding peak concurrency at the window size
//! regardless of total source count. One source's failure never aborts the
//! batch or another source's processing.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use leafwire_core::{
    defaults, haversine_distance_miles, BatchStats, ExtractionProvider, Result, SourceRepository,
    UpstreamSource, Zone, ZoneRepository,
};
use leafwire_db::Database;

use crate::env_parse;
use crate::quality::DedupQualityEngine;

/// Configuration for the ingestion dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sources fanned out concurrently per window.
    pub window_size: usize,
    /// Reliability reward after a successful extraction.
    pub reliability_reward: f64,
    /// Reliability penalty after a failed one. Larger than the reward so
    /// repeated failure biases a source toward deactivation.
    pub reliability_penalty: f64,
    /// Sources below this reliability are deactivated.
    pub reliability_floor: f64,
    /// Radius for matching sources to subscriber zones, in miles.
    pub subscriber_radius_miles: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            window_size: defaults::DISPATCH_WINDOW_SIZE,
            reliability_reward: defaults::RELIABILITY_REWARD,
            reliability_penalty: defaults::RELIABILITY_PENALTY,
            reliability_floor: defaults::RELIABILITY_FLOOR,
            subscriber_radius_miles: defaults::SUBSCRIBER_RADIUS_MILES,
        }
    }
}

impl DispatcherConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DISPATCH_WINDOW_SIZE` | `5` | Concurrent extractions per window |
    /// | `DISPATCH_RADIUS_MILES` | `15` | Subscriber-zone match radius |
    pub fn from_env() -> Self {
        Self {
            window_size: env_parse("DISPATCH_WINDOW_SIZE", defaults::DISPATCH_WINDOW_SIZE).max(1),
            subscriber_radius_miles: env_parse(
                "DISPATCH_RADIUS_MILES",
                defaults::SUBSCRIBER_RADIUS_MILES,
            ),
            ..Self::default()
        }
    }
}

/// Per-source outcome, folded into [`BatchStats`].
#[derive(Debug)]
enum SourceOutcome {
    /// Extraction yielded candidates; `deals_inserted` survived the gate.
    Processed { deals_inserted: i64 },
    /// No extraction target at all.
    Skipped,
    /// Extraction errored or yielded nothing from a real target.
    Failed,
}

/// Priority-ordered, concurrency-bounded extraction dispatcher.
pub struct IngestionDispatcher {
    zones: Arc<dyn ZoneRepository>,
    sources: Arc<dyn SourceRepository>,
    extractor: Arc<dyn ExtractionProvider>,
    engine: DedupQualityEngine,
    config: DispatcherConfig,
}

impl IngestionDispatcher {
    /// Create a new dispatcher over the given repositories.
    pub fn new(
        zones: Arc<dyn ZoneRepository>,
        sources: Arc<dyn SourceRepository>,
        extractor: Arc<dyn ExtractionProvider>,
        engine: DedupQualityEngine,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            zones,
            sources,
            extractor,
            engine,
            config,
        }
    }

    /// Create a dispatcher wired to a [`Database`].
    pub fn from_database(
        db: &Database,
        extractor: Arc<dyn ExtractionProvider>,
        engine: DedupQualityEngine,
        config: DispatcherConfig,
    ) -> Self {
        Self::new(
            db.zones.clone(),
            db.sources.clone(),
            extractor,
            engine,
            config,
        )
    }

    /// Build the candidate list and process it.
    pub async fn run(&self) -> Result<BatchStats> {
        let candidates = self.build_candidates().await?;
        self.process_batch(candidates).await
    }

    /// Merge the three candidate pools: (a) active sources within radius of
    /// a subscriber zone, (b) sources linked to subscribed zones, (c) any
    /// active source with an extraction target. De-duplicated by name.
    pub async fn build_candidates(&self) -> Result<Vec<UpstreamSource>> {
        let active = self.sources.list_active().await?;
        let subscriber_zones = self.zones.list_with_subscribers().await?;
        let linked = self.sources.list_for_subscribed_zones().await?;

        Ok(merge_candidates(
            active,
            &subscriber_zones,
            linked,
            self.config.subscriber_radius_miles,
        ))
    }

    /// Process a batch of sources in priority order with windowed fan-out.
    #[instrument(skip(self, sources))]
    pub async fn process_batch(&self, sources: Vec<UpstreamSource>) -> Result<BatchStats> {
        let ordered = order_candidates(sources);
        let total = ordered.len();
        let mut stats = BatchStats {
            sources_processed: total as i64,
            ..Default::default()
        };

        info!(
            source_count = total,
            window_size = self.config.window_size,
            "Starting ingestion batch"
        );

        for window in ordered.chunks(self.config.window_size.max(1)) {
            let mut tasks = tokio::task::JoinSet::new();
            for source in window {
                let worker = self.clone_refs();
                let source = source.clone();
                tasks.spawn(async move { worker.process_source(source).await });
            }

            // The whole window completes before the next starts; peak
            // concurrency is the window size.
            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok(SourceOutcome::Processed { deals_inserted }) => {
                        stats.processed += 1;
                        stats.deals_inserted += deals_inserted;
                    }
                    Ok(SourceOutcome::Skipped) => stats.skipped += 1,
                    Ok(SourceOutcome::Failed) => stats.failed += 1,
                    Err(e) => {
                        error!(error = ?e, "Source task panicked");
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            processed = stats.processed,
            skipped = stats.skipped,
            failed = stats.failed,
            deals_inserted = stats.deals_inserted,
            "Ingestion batch complete"
        );
        Ok(stats)
    }

    /// Clone the references a spawned source task needs.
    fn clone_refs(&self) -> DispatcherRef {
        DispatcherRef {
            sources: self.sources.clone(),
            extractor: self.extractor.clone(),
            engine: self.engine.clone(),
            config: self.config.clone(),
        }
    }
}

/// Lightweight reference bundle for processing a single source in a
/// spawned task.
struct DispatcherRef {
    sources: Arc<dyn SourceRepository>,
    extractor: Arc<dyn ExtractionProvider>,
    engine: DedupQualityEngine,
    config: DispatcherConfig,
}

impl DispatcherRef {
    /// Process one source. Errors are folded into the outcome so a
    /// sibling task is never cancelled by this one failing.
    async fn process_source(self, source: UpstreamSource) -> SourceOutcome {
        let menu_url = match &source.menu_url {
            Some(url) => url.clone(),
            None => {
                debug!(source_id = %source.id, "No extraction target, skipping");
                return SourceOutcome::Skipped;
            }
        };

        let candidates = match self.extractor.extract(&menu_url).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "Extraction failed");
                self.penalize(&source).await;
                return SourceOutcome::Failed;
            }
        };

        if candidates.is_empty() {
            // A real target that yields nothing counts against the source.
            self.penalize(&source).await;
            return SourceOutcome::Failed;
        }

        let admission = match self.engine.admit_all(&source, &candidates).await {
            Ok(admission) => admission,
            Err(e) => {
                // Persistence failure: abort this sub-task only. The next
                // scheduled run retries idempotently via the identity hash.
                error!(source_id = %source.id, error = %e, "Deal admission failed");
                return SourceOutcome::Failed;
            }
        };

        if let Err(e) = self
            .sources
            .adjust_reliability(
                source.id,
                self.config.reliability_reward,
                self.config.reliability_floor,
            )
            .await
        {
            warn!(source_id = %source.id, error = %e, "Reliability update failed");
        }

        debug!(
            source_id = %source.id,
            candidate_count = candidates.len(),
            deals_inserted = admission.inserted,
            "Source processed"
        );

        SourceOutcome::Processed {
            deals_inserted: admission.inserted
                + if admission.placeholder_inserted { 1 } else { 0 },
        }
    }

    async fn penalize(&self, source: &UpstreamSource) {
        if let Err(e) = self
            .sources
            .adjust_reliability(
                source.id,
                -self.config.reliability_penalty,
                self.config.reliability_floor,
            )
            .await
        {
            warn!(source_id = %source.id, error = %e, "Reliability update failed");
        }
    }
}

/// Merge the three candidate pools, de-duplicated by lowercase name with
/// first-pool-wins ordering.
pub(crate) fn merge_candidates(
    active: Vec<UpstreamSource>,
    subscriber_zones: &[Zone],
    linked: Vec<UpstreamSource>,
    radius_miles: f64,
) -> Vec<UpstreamSource> {
    let zone_coords: Vec<(f64, f64)> = subscriber_zones
        .iter()
        .filter_map(|z| Some((z.latitude?, z.longitude?)))
        .collect();

    let near_subscribers = |s: &UpstreamSource| -> bool {
        let (Some(lat), Some(lng)) = (s.latitude, s.longitude) else {
            return false;
        };
        zone_coords
            .iter()
            .any(|(zlat, zlng)| haversine_distance_miles(lat, lng, *zlat, *zlng) <= radius_miles)
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    let mut push = |source: UpstreamSource, merged: &mut Vec<UpstreamSource>| {
        if seen.insert(source.name.to_lowercase()) {
            merged.push(source);
        }
    };

    // (a) within radius of any subscriber zone
    let (near, rest): (Vec<_>, Vec<_>) = active.into_iter().partition(near_subscribers);
    for source in near {
        push(source, &mut merged);
    }
    // (b) linked to subscribed zones
    for source in linked {
        push(source, &mut merged);
    }
    // (c) any active source with an extraction target
    for source in rest.into_iter().filter(|s| s.menu_url.is_some()) {
        push(source, &mut merged);
    }

    merged
}

/// Order candidates by expected yield: known menu platform first, then any
/// extraction target, then descending reliability. The sort is stable so
/// ties keep their merge order, making dispatch deterministic.
pub(crate) fn order_candidates(mut sources: Vec<UpstreamSource>) -> Vec<UpstreamSource> {
    sources.sort_by(|a, b| {
        priority_class(a)
            .cmp(&priority_class(b))
            .then(b.reliability.total_cmp(&a.reliability))
    });
    sources
}

fn priority_class(source: &UpstreamSource) -> u8 {
    if source.has_known_menu_platform() {
        0
    } else if source.menu_url.is_some() {
        1
    } else {
        2
    }
}
