//! Distance-based representative selection among cross-source duplicates.
//!
//! The same offer often appears at several competing sources. The ranker
//! groups deals by (normalized title, normalized price) and keeps exactly
//! one representative per group: the source nearest the requesting
//! location when an origin is known, otherwise the first member in stable
//! input order. This is a pure function; presentation fields are computed
//! after ranking so it stays insulated from display logic.

use std::collections::HashMap;

use leafwire_core::{
    haversine_distance_miles, normalize_price, normalize_title, DealWithSource,
};

/// Pick one representative per duplicate group.
///
/// Groups are emitted in first-appearance order. Within a group, a source
/// without coordinates sorts after every source that has them.
pub fn rank(deals: Vec<DealWithSource>, origin: Option<(f64, f64)>) -> Vec<DealWithSource> {
    let mut group_index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<DealWithSource>> = Vec::new();

    for deal in deals {
        let key = (
            normalize_title(&deal.deal.title),
            normalize_price(&deal.deal.price_text),
        );
        match group_index.get(&key) {
            Some(&i) => groups[i].push(deal),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![deal]);
            }
        }
    }

    groups
        .into_iter()
        .map(|group| pick_representative(group, origin))
        .collect()
}

/// Distance from the origin to a deal's source, if both have coordinates.
pub fn distance_to_origin(deal: &DealWithSource, origin: Option<(f64, f64)>) -> Option<f64> {
    let (olat, olng) = origin?;
    let lat = deal.source_latitude?;
    let lng = deal.source_longitude?;
    Some(haversine_distance_miles(olat, olng, lat, lng))
}

fn pick_representative(
    mut group: Vec<DealWithSource>,
    origin: Option<(f64, f64)>,
) -> DealWithSource {
    if group.len() == 1 {
        return group.remove(0);
    }
    let Some(origin) = origin else {
        // No origin: stable first-wins.
        return group.remove(0);
    };

    let mut best = 0usize;
    let mut best_distance = distance_to_origin(&group[0], Some(origin));
    for (i, deal) in group.iter().enumerate().skip(1) {
        let distance = distance_to_origin(deal, Some(origin));
        let closer = match (distance, best_distance) {
            (Some(d), Some(b)) => d < b,
            // Known coordinates always beat unknown.
            (Some(_), None) => true,
            _ => false,
        };
        if closer {
            best = i;
            best_distance = distance;
        }
    }
    group.remove(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leafwire_core::{new_v7, Deal, DealCategory};

    fn deal_at(
        title: &str,
        price_text: &str,
        source_name: &str,
        coords: Option<(f64, f64)>,
    ) -> DealWithSource {
        DealWithSource {
            deal: Deal {
                id: new_v7(),
                source_id: new_v7(),
                category: DealCategory::Flower,
                title: title.to_string(),
                normalized_title: title.to_lowercase(),
                brand: None,
                product_name: None,
                price_text: price_text.to_string(),
                confidence: 0.9,
                identity_hash: format!("sha256:{}", source_name),
                valid: true,
                needs_review: false,
                review_reason: None,
                created_at: Utc::now(),
            },
            source_name: source_name.to_string(),
            source_latitude: coords.map(|c| c.0),
            source_longitude: coords.map(|c| c.1),
        }
    }

    // Origin in downtown Detroit; offsets chosen to land ~2mi and ~7mi out.
    const ORIGIN: (f64, f64) = (42.3314, -83.0458);

    #[test]
    fn test_nearest_source_wins() {
        let near = deal_at("Brand X 1g", "$15", "Near", Some((42.3600, -83.0458)));
        let far = deal_at("Brand X 1g", "$15", "Far", Some((42.4300, -83.0458)));
        let unknown = deal_at("Brand X 1g", "$15", "Unknown", None);

        let ranked = rank(vec![far, unknown, near], Some(ORIGIN));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source_name, "Near");
    }

    #[test]
    fn test_unknown_coordinates_sort_last() {
        let unknown = deal_at("Brand X 1g", "$15", "Unknown", None);
        let known = deal_at("Brand X 1g", "$15", "Known", Some((42.5, -83.0)));

        let ranked = rank(vec![unknown, known], Some(ORIGIN));
        assert_eq!(ranked[0].source_name, "Known");
    }

    #[test]
    fn test_no_origin_keeps_first_in_stable_order() {
        let a = deal_at("Brand X 1g", "$15", "First", Some((42.5, -83.0)));
        let b = deal_at("Brand X 1g", "$15", "Second", Some((42.34, -83.05)));

        let ranked = rank(vec![a, b], None);
        assert_eq!(ranked[0].source_name, "First");
    }

    #[test]
    fn test_distinct_offers_all_survive() {
        let a = deal_at("Brand X 1g", "$15", "A", None);
        let b = deal_at("Brand Y 1g", "$15", "B", None);
        let c = deal_at("Brand X 1g", "$20", "C", None);

        let ranked = rank(vec![a, b, c], Some(ORIGIN));
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_group_key_uses_normalization() {
        let a = deal_at("Brand X 1g", "$15", "A", Some((42.34, -83.05)));
        let b = deal_at("  brand x  1G ", "$15 ", "B", Some((42.6, -83.0)));

        let ranked = rank(vec![a, b], Some(ORIGIN));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source_name, "A");
    }

    #[test]
    fn test_groups_emitted_in_first_appearance_order() {
        let a = deal_at("Zeta deal", "$10", "A", None);
        let b = deal_at("Alpha deal", "$10", "B", None);

        let ranked = rank(vec![a, b], None);
        assert_eq!(ranked[0].source_name, "A");
        assert_eq!(ranked[1].source_name, "B");
    }

    #[test]
    fn test_empty_input() {
        assert!(rank(vec![], Some(ORIGIN)).is_empty());
    }
}
