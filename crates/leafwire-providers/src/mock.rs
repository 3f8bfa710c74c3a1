//! Mock collaborators for deterministic testing.
//!
//! Each mock records its calls and returns configured responses, so tests
//! can assert both outcomes and interaction patterns (call counts, peak
//! concurrency) without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use leafwire_core::{
    CandidateDeal, DiscoveredSource, Error, ExtractionProvider, GeocodedLocation, Geocoder,
    Result, SourceDiscovery,
};

// =============================================================================
// MOCK GEOCODER
// =============================================================================

/// Mock geocoder returning configured locations per postal code.
#[derive(Clone, Default)]
pub struct MockGeocoder {
    locations: Arc<Mutex<HashMap<String, GeocodedLocation>>>,
    fail: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockGeocoder {
    /// Create a mock that resolves nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a postal code resolution.
    pub fn with_location(self, postal_code: &str, latitude: f64, longitude: f64) -> Self {
        self.locations.lock().unwrap().insert(
            postal_code.to_string(),
            GeocodedLocation {
                latitude,
                longitude,
                city: Some("Testville".to_string()),
                region: Some("MI".to_string()),
            },
        );
        self
    }

    /// Make every call return a transport error.
    pub fn failing(self) -> Self {
        *self.fail.lock().unwrap() = true;
        self
    }

    /// Postal codes resolved so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn resolve(&self, postal_code: &str) -> Result<Option<GeocodedLocation>> {
        self.calls.lock().unwrap().push(postal_code.to_string());
        if *self.fail.lock().unwrap() {
            return Err(Error::Geocode("mock transport failure".to_string()));
        }
        Ok(self.locations.lock().unwrap().get(postal_code).cloned())
    }
}

// =============================================================================
// MOCK SOURCE DISCOVERY
// =============================================================================

/// Mock discovery returning a fixed source list.
#[derive(Clone, Default)]
pub struct MockSourceDiscovery {
    sources: Arc<Mutex<Vec<DiscoveredSource>>>,
    fail: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<(f64, f64)>>>,
}

impl MockSourceDiscovery {
    /// Create a mock that discovers nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a discovered source to every search result.
    pub fn with_source(self, name: &str, latitude: f64, longitude: f64) -> Self {
        self.sources.lock().unwrap().push(DiscoveredSource {
            place_id: Some(format!("place-{}", name.to_lowercase().replace(' ', "-"))),
            name: name.to_string(),
            address: None,
            latitude,
            longitude,
            phone: None,
            website: None,
        });
        self
    }

    /// Make every call return a transport error.
    pub fn failing(self) -> Self {
        *self.fail.lock().unwrap() = true;
        self
    }

    /// Search origins seen so far.
    pub fn calls(&self) -> Vec<(f64, f64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceDiscovery for MockSourceDiscovery {
    async fn search(
        &self,
        latitude: f64,
        longitude: f64,
        _radius_meters: u32,
        max_results: u32,
    ) -> Result<Vec<DiscoveredSource>> {
        self.calls.lock().unwrap().push((latitude, longitude));
        if *self.fail.lock().unwrap() {
            return Err(Error::Discovery("mock transport failure".to_string()));
        }
        let sources = self.sources.lock().unwrap();
        Ok(sources.iter().take(max_results as usize).cloned().collect())
    }
}

// =============================================================================
// MOCK EXTRACTION PROVIDER
// =============================================================================

/// Mock extraction provider with per-URL responses, optional latency, and
/// a live in-flight counter for concurrency assertions.
#[derive(Clone, Default)]
pub struct MockExtractionProvider {
    responses: Arc<Mutex<HashMap<String, Vec<CandidateDeal>>>>,
    default_response: Arc<Mutex<Vec<CandidateDeal>>>,
    failing_urls: Arc<Mutex<Vec<String>>>,
    delay_ms: Arc<Mutex<u64>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockExtractionProvider {
    /// Create a mock that extracts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register candidates returned for a specific URL.
    pub fn with_response(self, url: &str, candidates: Vec<CandidateDeal>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), candidates);
        self
    }

    /// Candidates returned for any URL without a specific mapping.
    pub fn with_default_response(self, candidates: Vec<CandidateDeal>) -> Self {
        *self.default_response.lock().unwrap() = candidates;
        self
    }

    /// Make extraction fail for one URL.
    pub fn with_failure(self, url: &str) -> Self {
        self.failing_urls.lock().unwrap().push(url.to_string());
        self
    }

    /// Hold each call open for `ms` so concurrent calls overlap.
    pub fn with_delay_ms(self, ms: u64) -> Self {
        *self.delay_ms.lock().unwrap() = ms;
        self
    }

    /// URLs extracted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionProvider for MockExtractionProvider {
    async fn extract(&self, url: &str) -> Result<Vec<CandidateDeal>> {
        self.calls.lock().unwrap().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay_ms.lock().unwrap();
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_urls.lock().unwrap().iter().any(|u| u == url) {
            return Err(Error::Extraction("mock transport failure".to_string()));
        }

        if let Some(candidates) = self.responses.lock().unwrap().get(url) {
            return Ok(candidates.clone());
        }
        Ok(self.default_response.lock().unwrap().clone())
    }
}
