//! # leafwire-rank
//!
//! Read-time ranking policy for deal feeds: distance-based selection of
//! one representative per cross-source duplicate group, then display
//! decoration (price labels, category ordering).
//!
//! Everything here is pure: no I/O, no store access. Callers join deals
//! with source coordinates before ranking.

pub mod presentation;
pub mod ranker;

pub use presentation::{category_rank, present, price_label, PresentedDeal};
pub use ranker::{distance_to_origin, rank};
