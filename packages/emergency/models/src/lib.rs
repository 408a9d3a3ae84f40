#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Emergency search types.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use safe_wander_geo_models::Coordinate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// How far and fast a subject can realistically travel on their own.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MobilityLevel {
    High,
    #[default]
    Medium,
    Low,
    Wheelchair,
}

impl MobilityLevel {
    /// Parses a stored mobility name, treating anything unrecognized as
    /// [`MobilityLevel::Medium`].
    #[must_use]
    pub fn parse_or_medium(value: &str) -> Self {
        Self::from_str(value.trim()).unwrap_or_default()
    }
}

/// Search distance multipliers per mobility level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilityFactors {
    /// Walks briskly and unaided.
    pub high: f64,
    /// Typical unaided walking.
    pub medium: f64,
    /// Slow or assisted walking.
    pub low: f64,
    /// Moves in a wheelchair.
    pub wheelchair: f64,
}

impl Default for MobilityFactors {
    fn default() -> Self {
        Self {
            high: 1.2,
            medium: 1.0,
            low: 0.5,
            wheelchair: 0.3,
        }
    }
}

impl MobilityFactors {
    /// Multiplier for `level`.
    #[must_use]
    pub const fn factor(&self, level: MobilityLevel) -> f64 {
        match level {
            MobilityLevel::High => self.high,
            MobilityLevel::Medium => self.medium,
            MobilityLevel::Low => self.low,
            MobilityLevel::Wheelchair => self.wheelchair,
        }
    }
}

/// Search radius estimation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Flat multiplier for the surroundings. 1.0 means open, walkable
    /// ground.
    pub terrain_factor: f64,
    /// Smallest radius ever suggested, in meters.
    pub min_radius_m: f64,
    /// Largest estimated radius, in meters. Explicit overrides may exceed
    /// it.
    pub max_radius_m: f64,
    /// Radius used when no estimate can be made, such as when the time
    /// missing is unknown.
    pub default_radius_m: f64,
    /// Per-mobility multipliers.
    pub mobility: MobilityFactors,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            terrain_factor: 1.0,
            min_radius_m: 100.0,
            max_radius_m: 5000.0,
            default_radius_m: 500.0,
            mobility: MobilityFactors::default(),
        }
    }
}

/// Lifecycle status of an emergency.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmergencyStatus {
    /// Search ongoing.
    #[default]
    Active,
    /// Subject found.
    Resolved,
    /// Raised in error.
    FalseAlarm,
}

impl EmergencyStatus {
    /// Whether no further changes are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Category of a timeline entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimelineKind {
    /// Lifecycle event.
    System,
    /// Change to search parameters.
    Update,
}

/// One append-only timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub time: DateTime<Utc>,
    pub event: String,
    #[serde(rename = "type")]
    pub kind: TimelineKind,
}

/// An active or concluded search for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRecord {
    /// Record ID, assigned at activation.
    pub id: Uuid,
    /// Subject being searched for.
    pub subject_id: String,
    /// Last position known before the subject went missing.
    pub last_known_location: Option<Coordinate>,
    /// Current search radius in meters.
    pub search_radius_m: f64,
    /// Active until resolved or marked a false alarm.
    pub status: EmergencyStatus,
    /// When the subject was last confirmed inside a safe zone, or the
    /// activation time when unknown.
    pub missing_since: DateTime<Utc>,
    /// When the emergency was opened.
    pub activated_at: DateTime<Utc>,
    /// When the emergency was closed. `None` while active.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Events in the order they happened. Never rewritten.
    pub timeline: Vec<TimelineEntry>,
}

impl EmergencyRecord {
    /// Whether the search is still ongoing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, EmergencyStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mobility_is_medium() {
        assert_eq!(MobilityLevel::parse_or_medium("Wheelchair"), MobilityLevel::Wheelchair);
        assert_eq!(MobilityLevel::parse_or_medium("rollerblades"), MobilityLevel::Medium);
    }

    #[test]
    fn default_factors() {
        let factors = MobilityFactors::default();
        assert!((factors.factor(MobilityLevel::High) - 1.2).abs() < f64::EPSILON);
        assert!((factors.factor(MobilityLevel::Wheelchair) - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn status_names() {
        assert_eq!(EmergencyStatus::FalseAlarm.to_string(), "false_alarm");
        assert!(EmergencyStatus::Resolved.is_terminal());
        assert!(!EmergencyStatus::Active.is_terminal());
    }
}
