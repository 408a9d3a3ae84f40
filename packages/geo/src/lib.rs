#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geofence evaluation for tracked subjects.
//!
//! Classifies a coordinate against a subject's circular zones using
//! great-circle distance, and provides the GPS noise handling (moving
//! average smoothing and a consecutive-outside exit gate) that keeps single
//! jittery fixes from registering as zone exits.

pub mod distance;
pub mod noise;
pub mod zones;

pub use distance::{EARTH_RADIUS_M, bearing, calculate_speed, haversine_distance};
pub use noise::{consecutive_outside, moving_average};
pub use zones::{ZoneSet, buffer_for, evaluate_zones, point_in_circle};
