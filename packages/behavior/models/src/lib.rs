#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Behavioral baseline and anomaly detection types.
//!
//! A baseline is a small statistical profile of how one subject usually
//! moves: typical walking speed, typical trip length, and the hours of day
//! they are usually out. Anomaly detection compares live movement against it.

use serde::{Deserialize, Serialize};

/// Morning and early-evening walks, assumed until a subject's own hours
/// are observed.
pub const DEFAULT_ACTIVE_HOURS: [u32; 6] = [7, 8, 9, 17, 18, 19];

/// Per-subject movement profile.
///
/// The `std_*` fields are an exponential moving average of the absolute
/// deviation from the running mean, not a statistical standard deviation.
/// Anomaly thresholds are calibrated against this approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralBaseline {
    /// Typical walking speed in m/s.
    pub avg_speed_mps: f64,
    /// Typical time away from a safe zone per trip, in seconds.
    pub avg_duration_secs: f64,
    /// Smoothed absolute speed deviation in m/s.
    pub std_speed_mps: f64,
    /// Smoothed absolute duration deviation in seconds.
    pub std_duration_secs: f64,
    /// Number of trips folded into the averages.
    pub sample_count: u64,
    /// Hours of day (0-23) the subject has recently been out, most recent
    /// last.
    pub common_active_hours: Vec<u32>,
}

impl Default for BehavioralBaseline {
    fn default() -> Self {
        Self {
            avg_speed_mps: 0.8,
            avg_duration_secs: 900.0,
            std_speed_mps: 0.2,
            std_duration_secs: 300.0,
            sample_count: 0,
            common_active_hours: DEFAULT_ACTIVE_HOURS.to_vec(),
        }
    }
}

/// Baseline adaptation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// EMA smoothing factor. Lower adapts more slowly.
    pub smoothing_alpha: f64,
    /// How many distinct active hours are remembered.
    pub max_active_hours: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.1,
            max_active_hours: 10,
        }
    }
}

/// Anomaly detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Absolute speed difference from the baseline average (m/s) that
    /// counts as anomalous.
    pub speed_deviation_threshold_mps: f64,
    /// Trips longer than `avg + multiplier * std` are anomalous.
    pub duration_std_multiplier: f64,
    /// Heading change (degrees) that counts as a direction change.
    pub direction_change_threshold_deg: f64,
    /// "Returned to start" distance for circling detection. Leaving
    /// counts at three times this distance.
    pub circling_reference_m: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            speed_deviation_threshold_mps: 0.5,
            duration_std_multiplier: 2.0,
            direction_change_threshold_deg: 45.0,
            circling_reference_m: 20.0,
        }
    }
}

/// Movement pattern summary behind a wandering score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WanderingAssessment {
    /// Significant heading changes along the recent track.
    pub direction_changes: usize,
    /// Whether the track loops back to its start repeatedly.
    pub circling: bool,
    /// Current trip duration divided by the baseline average.
    pub duration_ratio: f64,
    /// Composite confusion score, 0-100.
    pub score: u8,
}
