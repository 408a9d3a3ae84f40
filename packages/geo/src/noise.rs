//! GPS noise handling.
//!
//! Consumer-grade trackers jitter by tens of meters between fixes. Both
//! helpers here take samples in chronological order (oldest first, most
//! recent last).

use geo::{Centroid, MultiPoint, Point};
use safe_wander_geo_models::{Coordinate, Geofence, LocationSample};

use crate::zones::point_in_circle;

/// Mean position of the most recent `window` samples.
///
/// Uses every sample when fewer than `window` exist. Returns `None` for an
/// empty slice.
#[must_use]
pub fn moving_average(samples: &[LocationSample], window: usize) -> Option<Coordinate> {
    let window = window.max(1);
    let start = samples.len().saturating_sub(window);

    let points: Vec<Point<f64>> = samples[start..]
        .iter()
        .map(|s| Point::new(s.position.lng, s.position.lat))
        .collect();

    MultiPoint::from(points)
        .centroid()
        .map(|p| Coordinate::new(p.y(), p.x()))
}

/// Whether the `n` most recent samples all lie outside `zone`.
///
/// Returns `false` when fewer than `n` samples exist, so a fresh track can
/// never register an exit on its first fix.
#[must_use]
pub fn consecutive_outside(samples: &[LocationSample], zone: &Geofence, n: usize) -> bool {
    let n = n.max(1);
    if samples.len() < n {
        return false;
    }

    let Some(center) = zone.center else {
        return true;
    };

    samples[samples.len() - n..]
        .iter()
        .all(|s| !point_in_circle(s.position, center, zone.radius_m))
}
