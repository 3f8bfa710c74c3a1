//! Zone lease scheduler: claims due zones atomically and refreshes their
//! source catalogs.
//!
//! Each run claims a bounded batch of due zones (one conditional update,
//! so concurrent triggers never double-claim), then processes the batch
//! sequentially. Every exit path clears the lease under a token guard;
//! if the process dies mid-zone, the lease expiry alone makes the zone
//! claimable again.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use leafwire_core::{
    defaults, Geocoder, NotificationRepository, Result, SourceDiscovery, SourceRepository,
    SubscriberRepository, Zone, ZoneRepository, ZoneRunStats,
};
use leafwire_db::Database;

use crate::env_parse;

/// Configuration for the zone lease scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Zones claimed per run (hard-capped at the repository boundary).
    pub batch_size: i64,
    /// Lease duration in seconds.
    pub lease_secs: i64,
    /// Discovery radius around the zone's coordinates, in meters.
    pub discovery_radius_meters: u32,
    /// Maximum sources requested from discovery per zone.
    pub discovery_max_results: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::ZONE_CLAIM_BATCH,
            lease_secs: defaults::ZONE_LEASE_SECS,
            discovery_radius_meters: defaults::DISCOVERY_RADIUS_METERS,
            discovery_max_results: defaults::DISCOVERY_MAX_RESULTS,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ZONE_CLAIM_BATCH` | `10` | Zones claimed per run |
    /// | `ZONE_LEASE_SECS` | `600` | Lease duration |
    /// | `DISCOVERY_RADIUS_METERS` | `10000` | Discovery radius |
    pub fn from_env() -> Self {
        Self {
            batch_size: env_parse("ZONE_CLAIM_BATCH", defaults::ZONE_CLAIM_BATCH),
            lease_secs: env_parse("ZONE_LEASE_SECS", defaults::ZONE_LEASE_SECS),
            discovery_radius_meters: env_parse(
                "DISCOVERY_RADIUS_METERS",
                defaults::DISCOVERY_RADIUS_METERS,
            ),
            discovery_max_results: defaults::DISCOVERY_MAX_RESULTS,
        }
    }
}

/// How one claimed zone's refresh ended.
enum ZoneOutcome {
    /// Sources refreshed, next run scheduled.
    Refreshed,
    /// Geocoder could not place the postal code; rescheduled for later.
    GeocodeMiss,
}

/// Lease-based zone discovery scheduler.
pub struct ZoneLeaseScheduler {
    zones: Arc<dyn ZoneRepository>,
    sources: Arc<dyn SourceRepository>,
    subscribers: Arc<dyn SubscriberRepository>,
    notifications: Arc<dyn NotificationRepository>,
    geocoder: Arc<dyn Geocoder>,
    discovery: Arc<dyn SourceDiscovery>,
    config: SchedulerConfig,
}

impl ZoneLeaseScheduler {
    /// Create a new scheduler over the given repositories.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        zones: Arc<dyn ZoneRepository>,
        sources: Arc<dyn SourceRepository>,
        subscribers: Arc<dyn SubscriberRepository>,
        notifications: Arc<dyn NotificationRepository>,
        geocoder: Arc<dyn Geocoder>,
        discovery: Arc<dyn SourceDiscovery>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            zones,
            sources,
            subscribers,
            notifications,
            geocoder,
            discovery,
            config,
        }
    }

    /// Create a scheduler wired to a [`Database`].
    pub fn from_database(
        db: &Database,
        geocoder: Arc<dyn Geocoder>,
        discovery: Arc<dyn SourceDiscovery>,
        config: SchedulerConfig,
    ) -> Self {
        Self::new(
            db.zones.clone(),
            db.sources.clone(),
            db.subscribers.clone(),
            db.notifications.clone(),
            geocoder,
            discovery,
            config,
        )
    }

    /// Claim a batch of due zones and refresh each one.
    ///
    /// `batch_size` overrides the configured batch for this run. One
    /// zone's failure never aborts the batch; only the initial claim can
    /// fail the run as a whole.
    #[instrument(skip(self))]
    pub async fn run(&self, batch_size: Option<i64>) -> Result<ZoneRunStats> {
        let batch = batch_size.unwrap_or(self.config.batch_size);
        let zones = self.zones.claim_due(batch, self.config.lease_secs).await?;

        let mut stats = ZoneRunStats {
            claimed: zones.len() as i64,
            ..Default::default()
        };
        info!(claimed = stats.claimed, "Zone batch claimed");

        for zone in zones {
            let Some(token) = zone.lease_token else {
                // The claim stamps every returned row; a missing token
                // means the row predates the claim statement.
                error!(zone_id = %zone.id, "Claimed zone has no lease token");
                stats.failed += 1;
                continue;
            };

            match self.refresh_zone(&zone, token).await {
                Ok(ZoneOutcome::Refreshed) => stats.processed += 1,
                Ok(ZoneOutcome::GeocodeMiss) => stats.skipped += 1,
                Err(e) => {
                    warn!(
                        zone_id = %zone.id,
                        postal_code = %zone.postal_code,
                        error = %e,
                        "Zone refresh failed, backing off"
                    );
                    let backoff = Utc::now() + Duration::seconds(defaults::ZONE_FAILURE_BACKOFF_SECS);
                    if let Err(e) = self.zones.reschedule(zone.id, token, backoff).await {
                        // Lease expiry still guarantees the zone becomes
                        // claimable again.
                        error!(zone_id = %zone.id, error = %e, "Backoff reschedule failed");
                    }
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Refresh one zone: geocode, discover, upsert, link, notify.
    async fn refresh_zone(&self, zone: &Zone, token: Uuid) -> Result<ZoneOutcome> {
        let now = Utc::now();

        // "No response" and "cannot resolve" get the same treatment: push
        // the zone out an hour and move on, no retry storm.
        let location = match self.geocoder.resolve(&zone.postal_code).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                debug!(postal_code = %zone.postal_code, "Geocode miss, rescheduling");
                let retry = now + Duration::seconds(defaults::ZONE_GEOCODE_RETRY_SECS);
                self.zones.reschedule(zone.id, token, retry).await?;
                return Ok(ZoneOutcome::GeocodeMiss);
            }
            Err(e) => {
                warn!(postal_code = %zone.postal_code, error = %e, "Geocoder unavailable");
                let retry = now + Duration::seconds(defaults::ZONE_GEOCODE_RETRY_SECS);
                self.zones.reschedule(zone.id, token, retry).await?;
                return Ok(ZoneOutcome::GeocodeMiss);
            }
        };

        self.zones.set_location(zone.id, &location).await?;

        let discovered = self
            .discovery
            .search(
                location.latitude,
                location.longitude,
                self.config.discovery_radius_meters,
                self.config.discovery_max_results,
            )
            .await?;

        debug!(
            zone_id = %zone.id,
            discovered = discovered.len(),
            "Discovery complete"
        );

        for source in &discovered {
            let source_id = self.sources.upsert_discovered(source).await?;
            self.sources.link_zone(source_id, zone.id).await?;
        }

        // Side effect only: a notification failure must not fail the
        // zone's own processing.
        if let Err(e) = self.notify_subscribers(zone).await {
            warn!(zone_id = %zone.id, error = %e, "Notification creation failed");
        }

        let next_due = now + Duration::seconds(zone.refresh_interval_secs);
        self.zones.complete(zone.id, token, next_due).await?;

        info!(
            zone_id = %zone.id,
            postal_code = %zone.postal_code,
            discovered = discovered.len(),
            "Zone refreshed"
        );
        Ok(ZoneOutcome::Refreshed)
    }

    async fn notify_subscribers(&self, zone: &Zone) -> Result<()> {
        let subscribers = self.subscribers.for_zone(zone.id).await?;
        if subscribers.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = subscribers.iter().map(|s| s.id).collect();
        let created = self
            .notifications
            .notify_zone_refreshed(zone.id, &ids)
            .await?;
        debug!(zone_id = %zone.id, created, "Subscriber notifications recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        InMemoryNotifications, InMemorySources, InMemorySubscribers, InMemoryZones,
    };
    use leafwire_providers::mock::{MockGeocoder, MockSourceDiscovery};

    fn scheduler_with(
        zones: Arc<InMemoryZones>,
        sources: Arc<InMemorySources>,
        geocoder: MockGeocoder,
        discovery: MockSourceDiscovery,
    ) -> (ZoneLeaseScheduler, Arc<InMemoryNotifications>) {
        let notifications = Arc::new(InMemoryNotifications::new());
        let scheduler = ZoneLeaseScheduler::new(
            zones,
            sources,
            Arc::new(InMemorySubscribers::new()),
            notifications.clone(),
            Arc::new(geocoder),
            Arc::new(discovery),
            SchedulerConfig::default(),
        );
        (scheduler, notifications)
    }

    #[tokio::test]
    async fn test_due_zone_refreshed_and_rescheduled() {
        let zones = Arc::new(InMemoryZones::new());
        let zone_id = zones.seed_due("48201");
        let sources = Arc::new(InMemorySources::new());

        let geocoder = MockGeocoder::new().with_location("48201", 42.33, -83.05);
        let discovery = MockSourceDiscovery::new()
            .with_source("Green Relief", 42.34, -83.06)
            .with_source("Herbal Wellness", 42.32, -83.04)
            .with_source("Motor City Meds", 42.35, -83.03)
            .with_source("Riverfront Remedies", 42.31, -83.07);

        let (scheduler, _) = scheduler_with(zones.clone(), sources.clone(), geocoder, discovery);

        let stats = scheduler.run(None).await.unwrap();
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 0);

        // 4 sources upserted and linked.
        assert_eq!(sources.all().len(), 4);
        assert_eq!(sources.links_for_zone(zone_id).len(), 4);

        // Lease cleared, next_due pushed out by the refresh interval.
        let zone = zones.get(zone_id);
        assert!(zone.lease_token.is_none());
        assert!(zone.last_processed_at.is_some());
        let expected = Utc::now() + Duration::seconds(zone.refresh_interval_secs);
        assert!((expected - zone.next_due).num_seconds().abs() < 5);

        // Immediately re-running claims nothing.
        let stats = scheduler.run(None).await.unwrap();
        assert_eq!(stats.claimed, 0);
    }

    #[tokio::test]
    async fn test_geocode_miss_reschedules_one_hour() {
        let zones = Arc::new(InMemoryZones::new());
        let zone_id = zones.seed_due("99999");
        let sources = Arc::new(InMemorySources::new());

        let (scheduler, _) = scheduler_with(
            zones.clone(),
            sources.clone(),
            MockGeocoder::new(),
            MockSourceDiscovery::new(),
        );

        let stats = scheduler.run(None).await.unwrap();
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processed, 0);

        let zone = zones.get(zone_id);
        assert!(zone.lease_token.is_none());
        assert!(zone.last_processed_at.is_none());
        let expected = Utc::now() + Duration::seconds(defaults::ZONE_GEOCODE_RETRY_SECS);
        assert!((expected - zone.next_due).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_geocoder_transport_failure_treated_as_miss() {
        let zones = Arc::new(InMemoryZones::new());
        let zone_id = zones.seed_due("48201");

        let (scheduler, _) = scheduler_with(
            zones.clone(),
            Arc::new(InMemorySources::new()),
            MockGeocoder::new().failing(),
            MockSourceDiscovery::new(),
        );

        let stats = scheduler.run(None).await.unwrap();
        assert_eq!(stats.skipped, 1);
        assert!(zones.get(zone_id).lease_token.is_none());
    }

    #[tokio::test]
    async fn test_one_zone_failure_does_not_abort_batch() {
        let zones = Arc::new(InMemoryZones::new());
        // Ordered by next_due: the failing zone is claimed first.
        let bad_id = zones.seed_due_at("11111", Utc::now() - Duration::minutes(10));
        let good_id = zones.seed_due_at("48201", Utc::now() - Duration::minutes(5));

        let geocoder = MockGeocoder::new()
            .with_location("11111", 40.0, -80.0)
            .with_location("48201", 42.33, -83.05);
        let discovery = MockSourceDiscovery::new().with_source("Green Relief", 42.34, -83.06);

        let (scheduler, _) = scheduler_with(
            zones.clone(),
            Arc::new(InMemorySources::new()),
            geocoder,
            discovery,
        );
        zones.fail_set_location_for(bad_id);

        let stats = scheduler.run(None).await.unwrap();
        assert_eq!(stats.claimed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 1);

        // The failed zone backed off and released its lease.
        let bad = zones.get(bad_id);
        assert!(bad.lease_token.is_none());
        let expected = Utc::now() + Duration::seconds(defaults::ZONE_FAILURE_BACKOFF_SECS);
        assert!((expected - bad.next_due).num_seconds().abs() < 5);

        // The good zone still refreshed.
        assert!(zones.get(good_id).last_processed_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_double_claim() {
        let zones = Arc::new(InMemoryZones::new());
        for postal in ["48201", "48202", "48203"] {
            zones.seed_due(postal);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let zones = zones.clone();
            tasks.spawn(async move { zones.claim_due(10, 600).await.unwrap() });
        }

        let mut total_claimed = 0usize;
        let mut claimed_ids = std::collections::HashSet::new();
        while let Some(result) = tasks.join_next().await {
            let claimed = result.unwrap();
            total_claimed += claimed.len();
            for zone in claimed {
                assert!(
                    claimed_ids.insert(zone.id),
                    "zone {} claimed twice",
                    zone.id
                );
            }
        }
        assert_eq!(total_claimed, 3);
    }

    #[tokio::test]
    async fn test_stale_lease_reclaimable() {
        let zones = Arc::new(InMemoryZones::new());
        let zone_id = zones.seed_due("48201");

        // First claim takes the lease.
        let first = zones.claim_due(10, 600).await.unwrap();
        assert_eq!(first.len(), 1);

        // While the lease is live, the zone is off the table.
        assert!(zones.claim_due(10, 600).await.unwrap().is_empty());

        // Simulate the holder crashing: age the lease past expiry.
        zones.expire_lease(zone_id);
        let reclaimed = zones.claim_due(10, 600).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, zone_id);
    }

    #[tokio::test]
    async fn test_stale_holder_cannot_clobber_reclaimed_zone() {
        let zones = Arc::new(InMemoryZones::new());
        let zone_id = zones.seed_due("48201");

        let first = zones.claim_due(10, 600).await.unwrap();
        let stale_token = first[0].lease_token.unwrap();

        zones.expire_lease(zone_id);
        let second = zones.claim_due(10, 600).await.unwrap();
        let live_token = second[0].lease_token.unwrap();
        assert_ne!(stale_token, live_token);

        // The stale holder's release is a no-op under the token guard.
        zones
            .complete(zone_id, stale_token, Utc::now() + Duration::hours(6))
            .await
            .unwrap();
        let zone = zones.get(zone_id);
        assert_eq!(zone.lease_token, Some(live_token));
    }

    #[tokio::test]
    async fn test_notifications_recorded_for_subscribed_zone() {
        let zones = Arc::new(InMemoryZones::new());
        let zone_id = zones.seed_due("48201");
        let subscribers = Arc::new(InMemorySubscribers::new());
        subscribers.add(zone_id, "user@example.com");
        let notifications = Arc::new(InMemoryNotifications::new());

        let scheduler = ZoneLeaseScheduler::new(
            zones.clone(),
            Arc::new(InMemorySources::new()),
            subscribers,
            notifications.clone(),
            Arc::new(MockGeocoder::new().with_location("48201", 42.33, -83.05)),
            Arc::new(MockSourceDiscovery::new().with_source("Green Relief", 42.34, -83.06)),
            SchedulerConfig::default(),
        );

        scheduler.run(None).await.unwrap();
        assert_eq!(notifications.count_for_zone(zone_id), 1);
    }
}
