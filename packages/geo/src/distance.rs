//! Great-circle distance, bearing, and speed between positions.

use geo::{Bearing as _, Haversine, Point};
use safe_wander_geo_models::{Coordinate, LocationSample};

/// Earth radius used for all distance math, in meters.
///
/// Zone radii and the danger proximity threshold were calibrated against
/// this value, so it is intentionally not the IUGG mean radius.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates in meters.
#[must_use]
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` to `to`, in degrees clockwise from north
/// (`0.0..360.0`).
#[must_use]
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    Haversine
        .bearing(Point::new(from.lng, from.lat), Point::new(to.lng, to.lat))
        .rem_euclid(360.0)
}

/// Average speed in m/s between two samples.
///
/// Order does not matter. Samples with identical timestamps return `0.0`.
#[must_use]
pub fn calculate_speed(a: &LocationSample, b: &LocationSample) -> f64 {
    let distance = haversine_distance(a.position, b.position);
    #[allow(clippy::cast_precision_loss)]
    let elapsed = (b.timestamp - a.timestamp).num_milliseconds().abs() as f64 / 1000.0;

    if elapsed > 0.0 {
        distance / elapsed
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(lat: f64, lng: f64, secs: i64) -> LocationSample {
        LocationSample {
            subject_id: "p1".to_string(),
            position: Coordinate::new(lat, lng),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            accuracy_m: None,
            speed_mps: None,
            heading_deg: None,
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(37.7749, -122.4194);
        let b = Coordinate::new(37.7849, -122.4094);
        let ab = haversine_distance(a, b);
        let ba = haversine_distance(b, a);
        assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = Coordinate::new(51.5007, -0.1246);
        assert!(haversine_distance(a, a).abs() < f64::EPSILON);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!(bearing(origin, Coordinate::new(1.0, 0.0)).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_crosses_the_antimeridian_eastward() {
        let east = bearing(Coordinate::new(0.0, 179.5), Coordinate::new(0.0, -179.5));
        assert!((east - 90.0).abs() < 1e-6, "bearing {east}");

        let diagonal = bearing(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0));
        assert!((diagonal - 45.0).abs() < 0.01, "bearing {diagonal}");
    }

    #[test]
    fn speed_with_identical_timestamps_is_zero() {
        let a = sample(0.0, 0.0, 0);
        let b = sample(0.001, 0.0, 0);
        assert!(calculate_speed(&a, &b).abs() < f64::EPSILON);
    }

    #[test]
    fn speed_is_distance_over_time() {
        let a = sample(0.0, 0.0, 0);
        let b = sample(0.001, 0.0, 100);
        let expected = haversine_distance(a.position, b.position) / 100.0;
        assert!((calculate_speed(&a, &b) - expected).abs() < 1e-9);
        assert!((calculate_speed(&b, &a) - expected).abs() < 1e-9);
    }
}
