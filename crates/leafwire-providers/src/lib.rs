//! # leafwire-providers
//!
//! External collaborator clients for leafwire: geocoding, source
//! discovery, and deal extraction.
//!
//! The traits live in `leafwire-core`; this crate provides the HTTP
//! implementations plus deterministic mocks (behind the `mock` feature)
//! for tests.

pub mod discovery;
pub mod extraction;
pub mod geocoder;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use discovery::PlacesDiscovery;
pub use extraction::HttpExtractionProvider;
pub use geocoder::HttpGeocoder;

// Re-export the collaborator traits for convenience
pub use leafwire_core::{ExtractionProvider, Geocoder, SourceDiscovery};
