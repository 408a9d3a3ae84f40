#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate, geofence, and zone status types.
//!
//! These are the plain data types shared by the zone evaluator, the risk
//! scorer, and the monitoring orchestrator. Zones are circular: a center
//! coordinate plus a radius in meters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    #[serde(alias = "lon")]
    pub lng: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Classification of a geofence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ZoneType {
    /// Home, day center, or any place the subject is expected to be.
    Safe,
    /// Auto-generated halo around a safe zone for early exit warning.
    Buffer,
    /// Roads, water, rail lines.
    Danger,
    /// Places the subject should not enter but that are not immediately
    /// dangerous.
    Restricted,
}

impl ZoneType {
    /// Label used when a zone carries no name of its own.
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Safe => "Safe Zone",
            Self::Buffer => "Buffer Zone",
            Self::Danger => "Danger Zone",
            Self::Restricted => "Restricted Zone",
        }
    }
}

/// A circular geofence belonging to one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    /// Unique zone ID.
    pub id: String,
    /// Subject this zone belongs to.
    pub subject_id: String,
    /// Caregiver-facing name. Empty names fall back to
    /// [`ZoneType::default_label`].
    #[serde(default)]
    pub name: String,
    /// Zone classification.
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    /// Zone center. Zones without a center are ignored by evaluation.
    pub center: Option<Coordinate>,
    /// Radius in meters.
    pub radius_m: f64,
    /// Inactive zones are ignored by evaluation.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Whether this zone was generated (buffer halos) rather than drawn by
    /// a caregiver.
    #[serde(default)]
    pub auto_generated: bool,
    /// Owning zone for generated zones. A buffer shares the lifecycle of
    /// its parent safe zone.
    #[serde(default)]
    pub parent_id: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl Geofence {
    /// Returns the zone's name, or the type's default label if unnamed.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.zone_type.default_label()
        } else {
            &self.name
        }
    }
}

/// Result of classifying one coordinate against a subject's zones.
///
/// Computed fresh on every evaluation and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    /// Inside at least one safe zone.
    pub in_safe: bool,
    /// Inside at least one buffer zone.
    pub in_buffer: bool,
    /// Inside at least one danger zone.
    pub in_danger: bool,
    /// Inside at least one restricted zone.
    pub in_restricted: bool,
    /// Distance to the closest danger zone center, inside or not.
    /// [`f64::INFINITY`] when the subject has no danger zones.
    pub nearest_danger_distance_m: f64,
    /// Label of the zone the subject is considered to be in.
    pub current_zone_name: Option<String>,
}

impl Default for ZoneStatus {
    fn default() -> Self {
        Self {
            in_safe: false,
            in_buffer: false,
            in_danger: false,
            in_restricted: false,
            nearest_danger_distance_m: f64::INFINITY,
            current_zone_name: None,
        }
    }
}

impl ZoneStatus {
    /// Whether the nearest danger center is closer than `threshold_m`.
    #[must_use]
    pub fn is_near_danger(&self, threshold_m: f64) -> bool {
        self.nearest_danger_distance_m < threshold_m
    }
}

/// One position report from a subject's tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    /// Subject the sample belongs to.
    pub subject_id: String,
    /// Reported position.
    pub position: Coordinate,
    /// When the device took the fix.
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy in meters, if the device reports it.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Ground speed in m/s, if the device reports it.
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Course over ground in degrees, if the device reports it.
    #[serde(default)]
    pub heading_deg: Option<f64>,
}

/// Default radii used when a caregiver creates a zone without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneDefaults {
    /// Safe zone radius in meters.
    pub safe_radius_m: f64,
    /// Added to a safe zone's radius to size its buffer halo.
    pub buffer_offset_m: f64,
    /// Danger zone radius in meters.
    pub danger_radius_m: f64,
    /// Restricted zone radius in meters.
    pub restricted_radius_m: f64,
}

impl Default for ZoneDefaults {
    fn default() -> Self {
        Self {
            safe_radius_m: 100.0,
            buffer_offset_m: 50.0,
            danger_radius_m: 50.0,
            restricted_radius_m: 75.0,
        }
    }
}

impl ZoneDefaults {
    /// Default radius for a zone type. Buffers are sized from their parent,
    /// so this returns the safe radius plus the offset for them.
    #[must_use]
    pub fn radius_for(&self, zone_type: ZoneType) -> f64 {
        match zone_type {
            ZoneType::Safe => self.safe_radius_m,
            ZoneType::Buffer => self.safe_radius_m + self.buffer_offset_m,
            ZoneType::Danger => self.danger_radius_m,
            ZoneType::Restricted => self.restricted_radius_m,
        }
    }
}

/// GPS noise handling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsNoiseConfig {
    /// Number of recent samples averaged to smooth jitter.
    pub smoothing_window: usize,
    /// Samples that must all fall outside a zone before an exit counts.
    pub consecutive_outside: usize,
    /// Accuracy worse than this (meters) marks the signal as weak.
    pub weak_accuracy_m: f64,
    /// A latest fix older than this (seconds) marks the signal as lost.
    pub lost_after_secs: i64,
}

impl Default for GpsNoiseConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            consecutive_outside: 3,
            weak_accuracy_m: 50.0,
            lost_after_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_type_parses_case_insensitively() {
        assert_eq!("SAFE".parse::<ZoneType>().unwrap(), ZoneType::Safe);
        assert_eq!("danger".parse::<ZoneType>().unwrap(), ZoneType::Danger);
        assert!("routine".parse::<ZoneType>().is_err());
    }

    #[test]
    fn unnamed_zone_uses_type_label() {
        let zone = Geofence {
            id: "z1".to_string(),
            subject_id: "p1".to_string(),
            name: String::new(),
            zone_type: ZoneType::Restricted,
            center: None,
            radius_m: 75.0,
            active: true,
            auto_generated: false,
            parent_id: None,
        };
        assert_eq!(zone.label(), "Restricted Zone");
    }

    #[test]
    fn default_status_has_no_danger_nearby() {
        let status = ZoneStatus::default();
        assert!(status.nearest_danger_distance_m.is_infinite());
        assert!(!status.is_near_danger(50.0));
    }

    #[test]
    fn buffer_default_radius_includes_offset() {
        let defaults = ZoneDefaults::default();
        assert!((defaults.radius_for(ZoneType::Buffer) - 150.0).abs() < f64::EPSILON);
    }
}
