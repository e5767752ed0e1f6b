//! Geodesic math for proximity checks.
//!
//! Distances use the haversine formula on a spherical earth with the mean
//! radius [`EARTH_RADIUS_METERS`]. This is accurate to well under a percent
//! at venue scale, which is far below typical sensor uncertainty.

mod types;

pub use types::{Coordinate, CoordError, TargetZone, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
///
/// ```text
/// a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)
/// d = 2·R·asin(√a)
/// ```
#[inline]
pub fn haversine_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.longitude() - from.longitude()).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let a = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;

    // Rounding can push `a` a hair past 1.0 for antipodal points
    2.0 * EARTH_RADIUS_METERS * a.min(1.0).sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_same_point_is_zero() {
        let p = coord(6.50837, 3.384247);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        // One degree of arc on the mean sphere: 2πR / 360
        let d = haversine_distance(&coord(0.0, 0.0), &coord(1.0, 0.0));
        let expected = 2.0 * std::f64::consts::PI * EARTH_RADIUS_METERS / 360.0;
        assert!((d - expected).abs() < 1e-6, "got {}", d);
    }

    #[test]
    fn test_lagos_reference_distance() {
        let venue = coord(6.50837, 3.384247);
        let nearby = coord(6.515, 3.39);
        let d = haversine_distance(&venue, &nearby);
        assert!(d > 900.0 && d < 1000.0, "expected ~960 m, got {}", d);
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine_distance(&coord(0.0, 0.0), &coord(0.0, 180.0));
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((d - half_circumference).abs() < 1e-3);
    }

    #[test]
    fn test_distance_to_delegates() {
        let a = coord(51.5, -0.12);
        let b = coord(48.85, 2.35);
        assert_eq!(a.distance_to(&b), haversine_distance(&a, &b));
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let a = coord(lat1, lon1);
            let b = coord(lat2, lon2);
            let ab = haversine_distance(&a, &b);
            let ba = haversine_distance(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-6, "ab={} ba={}", ab, ba);
        }

        #[test]
        fn prop_self_distance_is_zero(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let p = coord(lat, lon);
            prop_assert_eq!(haversine_distance(&p, &p), 0.0);
        }

        #[test]
        fn prop_distance_is_bounded(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let d = haversine_distance(&coord(lat1, lon1), &coord(lat2, lon2));
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_METERS + 1e-6);
        }
    }
}
