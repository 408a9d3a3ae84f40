#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-subject behavioral modeling.
//!
//! [`baseline`] keeps an adaptive statistical profile of each subject's
//! usual movement; [`anomaly`] compares live movement against it.

pub mod anomaly;
pub mod baseline;

pub use anomaly::{
    assess_wandering, count_direction_changes, describe_anomalies, detect_anomaly,
    headings_from_track, is_circling, wandering_score,
};
pub use baseline::BaselineRegistry;
