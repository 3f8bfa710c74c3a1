//! In-memory repository fakes for unit tests.
//!
//! Each fake holds its rows behind a `Mutex`, making every repository
//! operation atomic the same way the Postgres implementations make the
//! claim-and-stamp atomic. Tests exercise scheduling and admission logic
//! against these without a database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use leafwire_core::{
    defaults, new_v7, Deal, DealRepository, DealWithSource, DiscoveredSource, Error, FeedQuery,
    GeocodedLocation, NewDeal, NotificationRepository, Result, ReviewFlag, ReviewFlagRepository,
    ReviewStatus, SourceRepository, Subscriber, SubscriberRepository, UpstreamSource, Zone,
    ZoneRepository, ZoneStatus,
};

/// Build an active source for tests.
pub(crate) fn source_with(name: &str, menu_url: Option<&str>, reliability: f64) -> UpstreamSource {
    UpstreamSource {
        id: new_v7(),
        place_id: None,
        name: name.to_string(),
        address: None,
        latitude: None,
        longitude: None,
        phone: None,
        website: None,
        menu_url: menu_url.map(String::from),
        reliability,
        active: true,
        created_at: Utc::now(),
        last_checked_at: None,
    }
}

/// Build an active zone with coordinates for tests.
pub(crate) fn subscriber_zone(postal_code: &str, latitude: f64, longitude: f64) -> Zone {
    Zone {
        id: new_v7(),
        postal_code: postal_code.to_string(),
        status: ZoneStatus::Active,
        latitude: Some(latitude),
        longitude: Some(longitude),
        city: None,
        region: None,
        next_due: Utc::now(),
        lease_token: None,
        lease_expires_at: None,
        last_processed_at: None,
        refresh_interval_secs: defaults::ZONE_REFRESH_INTERVAL_SECS,
        created_at: Utc::now(),
    }
}

// =============================================================================
// ZONES
// =============================================================================

#[derive(Default)]
pub(crate) struct InMemoryZones {
    zones: Mutex<Vec<Zone>>,
    subscribed: Mutex<HashSet<Uuid>>,
    fail_set_location: Mutex<HashSet<Uuid>>,
}

impl InMemoryZones {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_due(&self, postal_code: &str) -> Uuid {
        self.seed_due_at(postal_code, Utc::now() - Duration::minutes(1))
    }

    pub fn seed_due_at(&self, postal_code: &str, next_due: DateTime<Utc>) -> Uuid {
        let mut zone = subscriber_zone(postal_code, 0.0, 0.0);
        zone.latitude = None;
        zone.longitude = None;
        zone.next_due = next_due;
        let id = zone.id;
        self.zones.lock().unwrap().push(zone);
        id
    }

    pub fn get(&self, id: Uuid) -> Zone {
        self.zones
            .lock()
            .unwrap()
            .iter()
            .find(|z| z.id == id)
            .cloned()
            .expect("zone not seeded")
    }

    /// Age a live lease past its expiry, as if the holder crashed.
    pub fn expire_lease(&self, id: Uuid) {
        let mut zones = self.zones.lock().unwrap();
        let zone = zones.iter_mut().find(|z| z.id == id).expect("zone not seeded");
        zone.lease_expires_at = Some(Utc::now() - Duration::seconds(1));
    }

    /// Make `set_location` fail for one zone, simulating a store error
    /// mid-refresh.
    pub fn fail_set_location_for(&self, id: Uuid) {
        self.fail_set_location.lock().unwrap().insert(id);
    }

    #[allow(dead_code)]
    pub fn mark_subscribed(&self, id: Uuid) {
        self.subscribed.lock().unwrap().insert(id);
    }
}

#[async_trait]
impl ZoneRepository for InMemoryZones {
    async fn claim_due(&self, batch_size: i64, lease_secs: i64) -> Result<Vec<Zone>> {
        let now = Utc::now();
        let mut zones = self.zones.lock().unwrap();

        let mut due: Vec<usize> = zones
            .iter()
            .enumerate()
            .filter(|(_, z)| {
                z.status == ZoneStatus::Active
                    && z.next_due <= now
                    && (z.lease_token.is_none()
                        || z.lease_expires_at.map(|e| e < now).unwrap_or(true))
            })
            .map(|(i, _)| i)
            .collect();
        due.sort_by_key(|i| zones[*i].next_due);
        due.truncate(batch_size.clamp(1, defaults::ZONE_CLAIM_BATCH_MAX) as usize);

        let mut claimed = Vec::new();
        for i in due {
            zones[i].lease_token = Some(Uuid::new_v4());
            zones[i].lease_expires_at = Some(now + Duration::seconds(lease_secs));
            claimed.push(zones[i].clone());
        }
        Ok(claimed)
    }

    async fn complete(
        &self,
        zone_id: Uuid,
        lease_token: Uuid,
        next_due: DateTime<Utc>,
    ) -> Result<()> {
        let mut zones = self.zones.lock().unwrap();
        if let Some(zone) = zones
            .iter_mut()
            .find(|z| z.id == zone_id && z.lease_token == Some(lease_token))
        {
            zone.lease_token = None;
            zone.lease_expires_at = None;
            zone.last_processed_at = Some(Utc::now());
            zone.next_due = next_due;
        }
        Ok(())
    }

    async fn reschedule(
        &self,
        zone_id: Uuid,
        lease_token: Uuid,
        next_due: DateTime<Utc>,
    ) -> Result<()> {
        let mut zones = self.zones.lock().unwrap();
        if let Some(zone) = zones
            .iter_mut()
            .find(|z| z.id == zone_id && z.lease_token == Some(lease_token))
        {
            zone.lease_token = None;
            zone.lease_expires_at = None;
            zone.next_due = next_due;
        }
        Ok(())
    }

    async fn set_location(&self, zone_id: Uuid, location: &GeocodedLocation) -> Result<()> {
        if self.fail_set_location.lock().unwrap().contains(&zone_id) {
            return Err(Error::Internal("simulated store failure".to_string()));
        }
        let mut zones = self.zones.lock().unwrap();
        if let Some(zone) = zones.iter_mut().find(|z| z.id == zone_id) {
            zone.latitude = Some(location.latitude);
            zone.longitude = Some(location.longitude);
            zone.city = location.city.clone();
            zone.region = location.region.clone();
        }
        Ok(())
    }

    async fn create_for_postal(&self, postal_code: &str) -> Result<Zone> {
        if let Some(existing) = self
            .zones
            .lock()
            .unwrap()
            .iter()
            .find(|z| z.postal_code == postal_code)
        {
            return Ok(existing.clone());
        }
        let id = self.seed_due(postal_code);
        Ok(self.get(id))
    }

    async fn get_by_postal(&self, postal_code: &str) -> Result<Option<Zone>> {
        Ok(self
            .zones
            .lock()
            .unwrap()
            .iter()
            .find(|z| z.postal_code == postal_code)
            .cloned())
    }

    async fn list_with_subscribers(&self) -> Result<Vec<Zone>> {
        let subscribed = self.subscribed.lock().unwrap();
        Ok(self
            .zones
            .lock()
            .unwrap()
            .iter()
            .filter(|z| subscribed.contains(&z.id))
            .cloned()
            .collect())
    }

    async fn pause(&self, zone_id: Uuid) -> Result<()> {
        let mut zones = self.zones.lock().unwrap();
        if let Some(zone) = zones.iter_mut().find(|z| z.id == zone_id) {
            zone.status = ZoneStatus::Paused;
        }
        Ok(())
    }
}

// =============================================================================
// SOURCES
// =============================================================================

#[derive(Default)]
pub(crate) struct InMemorySources {
    sources: Mutex<Vec<UpstreamSource>>,
    links: Mutex<Vec<(Uuid, Uuid)>>,
    subscribed_zones: Mutex<HashSet<Uuid>>,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: UpstreamSource) {
        self.sources.lock().unwrap().push(source);
    }

    pub fn all(&self) -> Vec<UpstreamSource> {
        self.sources.lock().unwrap().clone()
    }

    pub fn links_for_zone(&self, zone_id: Uuid) -> Vec<Uuid> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|(z, _)| *z == zone_id)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn get_reliability(&self, source_id: Uuid) -> f64 {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.reliability)
            .expect("source not inserted")
    }

    pub fn is_active(&self, source_id: Uuid) -> bool {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.active)
            .expect("source not inserted")
    }
}

#[async_trait]
impl SourceRepository for InMemorySources {
    async fn upsert_discovered(&self, discovered: &DiscoveredSource) -> Result<Uuid> {
        let mut sources = self.sources.lock().unwrap();
        let existing = sources.iter_mut().find(|s| {
            (discovered.place_id.is_some() && s.place_id == discovered.place_id)
                || s.name.to_lowercase() == discovered.name.to_lowercase()
        });
        if let Some(source) = existing {
            source.latitude = Some(discovered.latitude);
            source.longitude = Some(discovered.longitude);
            source.address = discovered.address.clone();
            source.phone = discovered.phone.clone();
            source.website = discovered.website.clone();
            return Ok(source.id);
        }
        let mut source = source_with(&discovered.name, None, defaults::RELIABILITY_INITIAL);
        source.place_id = discovered.place_id.clone();
        source.latitude = Some(discovered.latitude);
        source.longitude = Some(discovered.longitude);
        source.address = discovered.address.clone();
        source.phone = discovered.phone.clone();
        source.website = discovered.website.clone();
        let id = source.id;
        sources.push(source);
        Ok(id)
    }

    async fn link_zone(&self, source_id: Uuid, zone_id: Uuid) -> Result<()> {
        let mut links = self.links.lock().unwrap();
        if !links.contains(&(zone_id, source_id)) {
            links.push((zone_id, source_id));
        }
        Ok(())
    }

    async fn adjust_reliability(&self, source_id: Uuid, delta: f64, floor: f64) -> Result<f64> {
        let mut sources = self.sources.lock().unwrap();
        let source = sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or(Error::SourceNotFound(source_id))?;
        source.reliability = (source.reliability + delta).clamp(0.0, 1.0);
        if source.reliability < floor {
            source.active = false;
        }
        source.last_checked_at = Some(Utc::now());
        Ok(source.reliability)
    }

    async fn set_menu_url(&self, source_id: Uuid, menu_url: &str) -> Result<()> {
        let mut sources = self.sources.lock().unwrap();
        if let Some(source) = sources.iter_mut().find(|s| s.id == source_id) {
            source.menu_url = Some(menu_url.to_string());
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<UpstreamSource>> {
        Ok(self
            .sources
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }

    async fn list_for_subscribed_zones(&self) -> Result<Vec<UpstreamSource>> {
        let subscribed = self.subscribed_zones.lock().unwrap();
        let links = self.links.lock().unwrap();
        let linked_ids: HashSet<Uuid> = links
            .iter()
            .filter(|(z, _)| subscribed.contains(z))
            .map(|(_, s)| *s)
            .collect();
        Ok(self
            .sources
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.active && linked_ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn get(&self, source_id: Uuid) -> Result<UpstreamSource> {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == source_id)
            .cloned()
            .ok_or(Error::SourceNotFound(source_id))
    }
}

// =============================================================================
// DEALS
// =============================================================================

#[derive(Default)]
pub(crate) struct InMemoryDeals {
    deals: Mutex<Vec<Deal>>,
    source_info: Mutex<HashMap<Uuid, (String, Option<f64>, Option<f64>)>>,
}

impl InMemoryDeals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Deal> {
        self.deals.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn register_source(&self, id: Uuid, name: &str, lat: Option<f64>, lng: Option<f64>) {
        self.source_info
            .lock()
            .unwrap()
            .insert(id, (name.to_string(), lat, lng));
    }
}

#[async_trait]
impl DealRepository for InMemoryDeals {
    async fn insert(&self, deal: &NewDeal) -> Result<Option<Uuid>> {
        let mut deals = self.deals.lock().unwrap();
        if deals
            .iter()
            .any(|d| d.source_id == deal.source_id && d.identity_hash == deal.identity_hash)
        {
            return Ok(None);
        }
        let id = new_v7();
        deals.push(Deal {
            id,
            source_id: deal.source_id,
            category: deal.category,
            title: deal.title.clone(),
            normalized_title: deal.normalized_title.clone(),
            brand: deal.brand.clone(),
            product_name: deal.product_name.clone(),
            price_text: deal.price_text.clone(),
            confidence: deal.confidence,
            identity_hash: deal.identity_hash.clone(),
            valid: deal.valid,
            needs_review: deal.needs_review,
            review_reason: deal.review_reason.clone(),
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn exists_exact(&self, source_id: Uuid, identity_hash: &str) -> Result<bool> {
        Ok(self
            .deals
            .lock()
            .unwrap()
            .iter()
            .any(|d| d.source_id == source_id && d.identity_hash == identity_hash))
    }

    async fn recent_for_source(
        &self,
        source_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Deal>> {
        Ok(self
            .deals
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.source_id == source_id && d.created_at >= since)
            .cloned()
            .collect())
    }

    async fn feed(&self, query: &FeedQuery) -> Result<Vec<DealWithSource>> {
        let since = query
            .since
            .unwrap_or_else(|| Utc::now() - Duration::days(defaults::FEED_WINDOW_DAYS));
        let info = self.source_info.lock().unwrap();
        Ok(self
            .deals
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.valid && !d.needs_review && d.created_at >= since)
            .filter(|d| query.category.map(|c| d.category == c).unwrap_or(true))
            .map(|d| {
                let (name, lat, lng) = info
                    .get(&d.source_id)
                    .cloned()
                    .unwrap_or_else(|| (String::new(), None, None));
                DealWithSource {
                    deal: d.clone(),
                    source_name: name,
                    source_latitude: lat,
                    source_longitude: lng,
                }
            })
            .collect())
    }
}

// =============================================================================
// REVIEW FLAGS, SUBSCRIBERS, NOTIFICATIONS
// =============================================================================

#[derive(Default)]
pub(crate) struct InMemoryReviewFlags {
    flags: Mutex<Vec<ReviewFlag>>,
}

impl InMemoryReviewFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ReviewFlag> {
        self.flags.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewFlagRepository for InMemoryReviewFlags {
    async fn create(&self, deal_id: Uuid, reason: &str) -> Result<Uuid> {
        let id = new_v7();
        self.flags.lock().unwrap().push(ReviewFlag {
            id,
            deal_id,
            reason: reason.to_string(),
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<ReviewFlag>> {
        Ok(self
            .flags
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.status == ReviewStatus::Pending)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemorySubscribers {
    by_zone: Mutex<HashMap<Uuid, Vec<Subscriber>>>,
}

impl InMemorySubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, zone_id: Uuid, email: &str) {
        self.by_zone
            .lock()
            .unwrap()
            .entry(zone_id)
            .or_default()
            .push(Subscriber {
                id: new_v7(),
                email: email.to_string(),
                postal_code: String::new(),
                active: true,
                created_at: Utc::now(),
            });
    }
}

#[async_trait]
impl SubscriberRepository for InMemorySubscribers {
    async fn create(&self, _email: &str, _postal_code: &str) -> Result<Uuid> {
        Ok(new_v7())
    }

    async fn for_zone(&self, zone_id: Uuid) -> Result<Vec<Subscriber>> {
        Ok(self
            .by_zone
            .lock()
            .unwrap()
            .get(&zone_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryNotifications {
    sent: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for_zone(&self, zone_id: Uuid) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, z)| *z == zone_id)
            .count()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotifications {
    async fn notify_zone_refreshed(&self, zone_id: Uuid, subscriber_ids: &[Uuid]) -> Result<i64> {
        let mut sent = self.sent.lock().unwrap();
        let mut created = 0i64;
        for subscriber_id in subscriber_ids {
            if sent.insert((*subscriber_id, zone_id)) {
                created += 1;
            }
        }
        Ok(created)
    }
}
