//! Containment evaluation shared by every read path.

use super::{Containment, ContainmentResult};
use crate::geo::{haversine_distance, TargetZone};
use crate::sensor::Fix;

/// Distance the device might actually be from the target, giving it the
/// benefit of the sensor's uncertainty.
///
/// Negative accuracy is treated as zero, so the result never exceeds the raw
/// distance.
#[inline]
pub fn effective_distance(distance_meters: f64, accuracy_meters: f64) -> f64 {
    (distance_meters - accuracy_meters.max(0.0)).max(0.0)
}

/// Evaluate a fix against a zone.
///
/// 1. Haversine distance from the fix to the zone center.
/// 2. Clamp the reported accuracy to be non-negative.
/// 3. Subtract it from the distance (optimistic lower bound, floored at 0).
/// 4. Inside when that bound is within the radius, boundary included.
pub fn evaluate(zone: &TargetZone, fix: &Fix) -> ContainmentResult {
    let distance = haversine_distance(&fix.coordinate, &zone.center());
    let accuracy = fix.accuracy_meters.max(0.0);
    let inside = effective_distance(distance, accuracy) <= zone.radius_meters();
    ContainmentResult::from_fix(Containment::from(inside), distance, accuracy, *fix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Coordinate, EARTH_RADIUS_METERS};

    const VENUE_LAT: f64 = 6.50837;
    const VENUE_LON: f64 = 3.384247;

    fn zone(radius: f64) -> TargetZone {
        TargetZone::from_degrees(VENUE_LAT, VENUE_LON, radius).unwrap()
    }

    /// A point `meters` due north of the venue along the meridian.
    fn north_of_venue(meters: f64) -> Coordinate {
        let dlat = (meters / EARTH_RADIUS_METERS).to_degrees();
        Coordinate::new(VENUE_LAT + dlat, VENUE_LON).unwrap()
    }

    #[test]
    fn test_fix_at_target_is_inside() {
        let fix = Fix::new(zone(250.0).center(), 0.0);
        let result = evaluate(&zone(250.0), &fix);
        assert_eq!(result.containment(), Containment::Inside);
        assert_eq!(result.distance_meters(), Some(0.0));
        assert!(result.error().is_none());
    }

    #[test]
    fn test_far_fix_is_outside() {
        let fix = Fix::new(Coordinate::new(6.515, 3.39).unwrap(), 10.0);
        let result = evaluate(&zone(250.0), &fix);
        assert_eq!(result.containment(), Containment::Outside);
        let d = result.distance_meters().unwrap();
        assert!(d > 900.0 && d < 1000.0, "got {}", d);
    }

    #[test]
    fn test_accuracy_compensation_flips_to_inside() {
        let fix = Fix::new(north_of_venue(260.0), 50.0);
        let result = evaluate(&zone(250.0), &fix);
        let d = result.distance_meters().unwrap();
        assert!((d - 260.0).abs() < 1e-6, "got {}", d);
        assert_eq!(result.containment(), Containment::Inside);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        // d - a == radius exactly when computed from the fix's own distance
        let fix = Fix::new(north_of_venue(300.0), 0.0);
        let d = haversine_distance(&fix.coordinate, &zone(1.0).center());
        let on_boundary = Fix::new(fix.coordinate, d - 250.0);
        let radius = d - on_boundary.accuracy_meters;

        let result = evaluate(&zone(radius), &on_boundary);
        assert_eq!(result.containment(), Containment::Inside);

        let just_outside = zone(radius - 1e-6);
        assert_eq!(
            evaluate(&just_outside, &on_boundary).containment(),
            Containment::Outside
        );
    }

    #[test]
    fn test_negative_accuracy_is_clamped() {
        let fix = Fix::new(north_of_venue(260.0), -100.0);
        let result = evaluate(&zone(250.0), &fix);
        assert_eq!(result.accuracy_meters(), Some(0.0));
        assert_eq!(result.containment(), Containment::Outside);
        assert_eq!(effective_distance(260.0, -100.0), 260.0);
    }

    #[test]
    fn test_effective_distance_floors_at_zero() {
        assert_eq!(effective_distance(10.0, 50.0), 0.0);
        assert_eq!(effective_distance(260.0, 50.0), 210.0);
    }

    #[test]
    fn test_distance_and_accuracy_from_same_fix() {
        let fix = Fix::new(north_of_venue(120.0), 7.5);
        let result = evaluate(&zone(250.0), &fix);
        assert_eq!(result.last_fix(), Some(&fix));
        assert_eq!(result.accuracy_meters(), Some(7.5));
    }
}
