//! Deal extraction backend.
//!
//! The extraction service is an opaque collaborator: given a menu URL it
//! returns zero or more unvalidated candidate deal records with a
//! confidence score. Everything downstream of the HTTP call (dedup,
//! confidence gating, heuristics) lives in `leafwire-ingest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use leafwire_core::{CandidateDeal, DealCategory, Error, ExtractionProvider, Result};

/// Timeout for extraction requests (seconds). Menu pages are rendered and
/// run through a vision model upstream, so this is generous.
pub const EXTRACT_TIMEOUT_SECS: u64 = 120;

/// HTTP client for the extraction service.
pub struct HttpExtractionProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    deals: Vec<ExtractedDeal>,
}

#[derive(Debug, Deserialize)]
struct ExtractedDeal {
    category: Option<String>,
    title: String,
    brand: Option<String>,
    product_name: Option<String>,
    price_text: Option<String>,
    confidence: Option<f64>,
}

impl HttpExtractionProvider {
    /// Create an extraction client with an explicit base URL and key.
    pub fn with_config(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(EXTRACT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Create an extraction client from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `EXTRACTION_URL` | (required) | Base URL of the extraction service |
    /// | `EXTRACTION_API_KEY` | (required) | Bearer credential |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("EXTRACTION_URL")
            .map_err(|_| Error::Config("EXTRACTION_URL is not set".to_string()))?;
        let api_key = std::env::var("EXTRACTION_API_KEY")
            .map_err(|_| Error::Config("EXTRACTION_API_KEY is not set".to_string()))?;
        Ok(Self::with_config(base_url, api_key))
    }

    fn parse_category(s: Option<&str>) -> DealCategory {
        match s.map(|v| v.to_lowercase()).as_deref() {
            Some("flower") => DealCategory::Flower,
            Some("edible") | Some("edibles") => DealCategory::Edible,
            Some("vape") | Some("cartridge") => DealCategory::Vape,
            Some("concentrate") | Some("concentrates") => DealCategory::Concentrate,
            Some("preroll") | Some("pre-roll") => DealCategory::Preroll,
            Some("accessory") | Some("accessories") => DealCategory::Accessory,
            _ => DealCategory::Other,
        }
    }
}

#[async_trait]
impl ExtractionProvider for HttpExtractionProvider {
    async fn extract(&self, url: &str) -> Result<Vec<CandidateDeal>> {
        let endpoint = format!("{}/v1/extract", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&ExtractRequest { url })
            .send()
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Extraction(format!(
                "Extraction service returned {}",
                response.status()
            )));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;

        debug!(candidate_count = body.deals.len(), url, "Extraction complete");

        Ok(body
            .deals
            .into_iter()
            .map(|d| CandidateDeal {
                category: Self::parse_category(d.category.as_deref()),
                title: d.title,
                brand: d.brand,
                product_name: d.product_name,
                price_text: d.price_text.unwrap_or_default(),
                confidence: d.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            })
            .collect())
    }
}
