//! Great-circle distance helpers.

use std::f64::consts::PI;

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Haversine distance between two lat/lng points in miles.
pub fn haversine_distance_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let to_rad = |deg: f64| deg * PI / 180.0;

    let dlat = to_rad(lat2 - lat1);
    let dlng = to_rad(lng2 - lng1);

    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_MILES * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detroit_to_ann_arbor() {
        // ~35 miles apart
        let d = haversine_distance_miles(42.3314, -83.0458, 42.2808, -83.7430);
        assert!((d - 35.0).abs() < 2.0, "Expected ~35 miles, got {d}");
    }

    #[test]
    fn test_zero_distance() {
        let d = haversine_distance_miles(42.33, -83.04, 42.33, -83.04);
        assert!(d.abs() < 1e-9);
    }
}
