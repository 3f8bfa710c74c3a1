//! Source discovery backend (Places-style nearby search).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use leafwire_core::{DiscoveredSource, Error, Result, SourceDiscovery};

/// Default discovery endpoint.
pub const DEFAULT_DISCOVERY_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Search keyword passed to the places API.
pub const DISCOVERY_KEYWORD: &str = "cannabis dispensary";

/// Timeout for discovery requests (seconds).
pub const DISCOVERY_TIMEOUT_SECS: u64 = 20;

/// HTTP discovery client against a Places-style nearby search API.
pub struct PlacesDiscovery {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NearbySearchResponse {
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    place_id: Option<String>,
    name: String,
    vicinity: Option<String>,
    geometry: PlaceGeometry,
    #[serde(rename = "formatted_phone_number")]
    phone: Option<String>,
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceGeometry {
    location: PlaceLocation,
}

#[derive(Debug, Deserialize)]
struct PlaceLocation {
    lat: f64,
    lng: f64,
}

impl PlacesDiscovery {
    /// Create a discovery client with an explicit base URL and key.
    pub fn with_config(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DISCOVERY_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Create a discovery client from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DISCOVERY_URL` | Google Places | Base URL |
    /// | `DISCOVERY_API_KEY` | (required) | API key |
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("DISCOVERY_URL").unwrap_or_else(|_| DEFAULT_DISCOVERY_URL.to_string());
        let api_key = std::env::var("DISCOVERY_API_KEY")
            .map_err(|_| Error::Config("DISCOVERY_API_KEY is not set".to_string()))?;
        Ok(Self::with_config(base_url, api_key))
    }
}

#[async_trait]
impl SourceDiscovery for PlacesDiscovery {
    async fn search(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: u32,
        max_results: u32,
    ) -> Result<Vec<DiscoveredSource>> {
        let url = format!("{}/nearbysearch/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("location", format!("{},{}", latitude, longitude)),
                ("radius", radius_meters.to_string()),
                ("keyword", DISCOVERY_KEYWORD.to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Discovery(format!(
                "Discovery returned {}",
                response.status()
            )));
        }

        let body: NearbySearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;

        debug!(
            result_count = body.results.len(),
            latitude, longitude, radius_meters, "Discovery search complete"
        );

        Ok(body
            .results
            .into_iter()
            .take(max_results as usize)
            .map(|p| DiscoveredSource {
                place_id: p.place_id,
                name: p.name,
                address: p.vicinity,
                latitude: p.geometry.location.lat,
                longitude: p.geometry.location.lng,
                phone: p.phone,
                website: p.website,
            })
            .collect())
    }
}
