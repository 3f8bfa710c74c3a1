//! Presentation policy applied after ranking: price labels and category
//! sort scores. Kept out of the ranker so ranking stays a pure grouping
//! decision.

use serde::{Deserialize, Serialize};

use leafwire_core::{leading_price, DealCategory, DealWithSource};

use crate::ranker::distance_to_origin;

/// A ranked deal decorated for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentedDeal {
    #[serde(flatten)]
    pub deal: DealWithSource,
    /// Formatted leading price, or the raw text when no number parses.
    pub price_label: String,
    /// Category position in display order (lower sorts first).
    pub category_rank: usize,
    /// Distance from the requesting location, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
}

/// Format a deal's price text into a display label.
///
/// "$15 today only" becomes "$15.00"; text without a leading number is
/// passed through untouched.
pub fn price_label(price_text: &str) -> String {
    match leading_price(price_text) {
        Some(price) => format!("${:.2}", price),
        None => price_text.to_string(),
    }
}

/// Category position in display order.
pub fn category_rank(category: DealCategory) -> usize {
    DealCategory::all()
        .iter()
        .position(|c| *c == category)
        .unwrap_or(DealCategory::all().len())
}

/// Decorate ranked deals and sort them for display: category order first,
/// cheaper offers first within a category.
pub fn present(deals: Vec<DealWithSource>, origin: Option<(f64, f64)>) -> Vec<PresentedDeal> {
    let mut presented: Vec<PresentedDeal> = deals
        .into_iter()
        .map(|deal| {
            let distance_miles = distance_to_origin(&deal, origin);
            PresentedDeal {
                price_label: price_label(&deal.deal.price_text),
                category_rank: category_rank(deal.deal.category),
                distance_miles,
                deal,
            }
        })
        .collect();

    presented.sort_by(|a, b| {
        a.category_rank.cmp(&b.category_rank).then(
            leading_price(&a.deal.deal.price_text)
                .unwrap_or(f64::MAX)
                .total_cmp(&leading_price(&b.deal.deal.price_text).unwrap_or(f64::MAX)),
        )
    });
    presented
}
