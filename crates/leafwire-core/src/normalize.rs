//! Text normalization and identity hashing for deal deduplication.
//!
//! The identity hash is a pure function of (source name, normalized title,
//! normalized price, date): same inputs always produce the same hash, which
//! gives exact-duplicate detection a stable key that is unique per source
//! per day.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static LEADING_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid price regex"));

/// Normalize a title for dedup comparison: trim, lowercase, collapse
/// internal whitespace.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize price text the same way titles are normalized. "$15.00 OFF"
/// and "$15.00 off" hash identically.
pub fn normalize_price(price_text: &str) -> String {
    normalize_title(price_text)
}

/// Extract the leading numeric price from free-form price text.
///
/// Returns the first number found, so "$15.00 (was $20)" yields 15.0 and
/// "2 for $30" yields 2.0. The comparison is only ever against text from
/// the same extractor, so the convention is self-consistent.
pub fn leading_price(price_text: &str) -> Option<f64> {
    LEADING_PRICE_RE
        .captures(price_text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Compute the content-derived identity hash for a deal.
pub fn identity_hash(source_name: &str, title: &str, price_text: &str, date: NaiveDate) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        normalize_title(source_name),
        normalize_title(title),
        normalize_price(price_text),
        date.format("%Y-%m-%d"),
    );
    let digest = Sha256::digest(key.as_bytes());
    format!("sha256:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
    }

    #[test]
    fn test_normalize_title_collapses_whitespace() {
        assert_eq!(normalize_title("  Brand X   1g  "), "brand x 1g");
    }

    #[test]
    fn test_leading_price_simple() {
        assert_eq!(leading_price("$15"), Some(15.0));
        assert_eq!(leading_price("$15.99 each"), Some(15.99));
        assert_eq!(leading_price("was $20, now $10"), Some(20.0));
        assert_eq!(leading_price("no price here"), None);
    }

    #[test]
    fn test_leading_price_trailing_dot_not_consumed() {
        // "15." should parse as 15, not fail
        assert_eq!(leading_price("$15. Limited time"), Some(15.0));
    }

    #[test]
    fn test_identity_hash_deterministic() {
        let a = identity_hash("Green Relief", "Brand X 1g", "$15", date());
        let b = identity_hash("Green Relief", "Brand X 1g", "$15", date());
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
    }

    #[test]
    fn test_identity_hash_normalization_invariant() {
        let a = identity_hash("Green Relief", "  Brand X  1g ", "$15 OFF", date());
        let b = identity_hash("green relief", "brand x 1g", "$15 off", date());
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_hash_varies_by_date() {
        let a = identity_hash("Green Relief", "Brand X 1g", "$15", date());
        let b = identity_hash(
            "Green Relief",
            "Brand X 1g",
            "$15",
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_hash_varies_by_source() {
        let a = identity_hash("Green Relief", "Brand X 1g", "$15", date());
        let b = identity_hash("Herbal Wellness", "Brand X 1g", "$15", date());
        assert_ne!(a, b);
    }
}
