//! # leafwire-core
//!
//! Core types, traits, and abstractions for the leafwire ingestion
//! pipeline.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other leafwire crates depend on.

pub mod defaults;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use geo::haversine_distance_miles;
pub use models::*;
pub use normalize::{identity_hash, leading_price, normalize_price, normalize_title};
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
