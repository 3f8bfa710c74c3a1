//! Postal-code geocoding backend (Zippopotam-style API).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use leafwire_core::{Error, GeocodedLocation, Geocoder, Result};

/// Default geocoding endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://api.zippopotam.us";

/// Default country segment for postal lookups.
pub const DEFAULT_COUNTRY: &str = "us";

/// Timeout for geocoding requests (seconds).
pub const GEOCODE_TIMEOUT_SECS: u64 = 15;

/// HTTP geocoder resolving postal codes against a Zippopotam-style API.
pub struct HttpGeocoder {
    client: Client,
    base_url: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct PostalResponse {
    places: Vec<PostalPlace>,
}

#[derive(Debug, Deserialize)]
struct PostalPlace {
    #[serde(rename = "place name")]
    place_name: Option<String>,
    state: Option<String>,
    latitude: String,
    longitude: String,
}

impl HttpGeocoder {
    /// Create a geocoder with default settings.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_GEOCODER_URL.to_string(), DEFAULT_COUNTRY.to_string())
    }

    /// Create a geocoder with a custom base URL and country.
    pub fn with_config(base_url: String, country: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(GEOCODE_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url,
            country,
        }
    }

    /// Create a geocoder from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `GEOCODER_URL` | zippopotam.us | Base URL |
    /// | `GEOCODER_COUNTRY` | `us` | Country path segment |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("GEOCODER_URL").unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string());
        let country =
            std::env::var("GEOCODER_COUNTRY").unwrap_or_else(|_| DEFAULT_COUNTRY.to_string());
        Self::with_config(base_url, country)
    }
}

impl Default for HttpGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn resolve(&self, postal_code: &str) -> Result<Option<GeocodedLocation>> {
        let url = format!("{}/{}/{}", self.base_url, self.country, postal_code);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Geocode(e.to_string()))?;

        // An unknown postal code is a miss, not an error.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(postal_code, "Geocoder could not resolve postal code");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Geocode(format!(
                "Geocoder returned {} for {}",
                response.status(),
                postal_code
            )));
        }

        let body: PostalResponse = response
            .json()
            .await
            .map_err(|e| Error::Geocode(e.to_string()))?;

        let place = match body.places.into_iter().next() {
            Some(p) => p,
            None => {
                warn!(postal_code, "Geocoder returned no places");
                return Ok(None);
            }
        };

        let latitude = place
            .latitude
            .parse::<f64>()
            .map_err(|e| Error::Geocode(format!("Bad latitude: {}", e)))?;
        let longitude = place
            .longitude
            .parse::<f64>()
            .map_err(|e| Error::Geocode(format!("Bad longitude: {}", e)))?;

        Ok(Some(GeocodedLocation {
            latitude,
            longitude,
            city: place.place_name,
            region: place.state,
        }))
    }
}
