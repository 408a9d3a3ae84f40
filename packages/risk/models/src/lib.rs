#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk factor, weight, and assessment types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Tracker signal quality as reported by the device.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum GpsSignal {
    /// Normal fix quality.
    #[default]
    Good,
    /// Degraded accuracy.
    Weak,
    /// No recent fix.
    Lost,
}

/// Points contributed by each risk factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Not inside any safe zone.
    pub outside_safe_zone: u32,
    /// Within the proximity threshold of a danger zone center. Applied a
    /// second time when actually inside a danger zone.
    pub near_danger_zone: u32,
    /// During the night window.
    pub night_hours: u32,
    /// Away from safe zones longer than the duration threshold.
    pub duration_outside: u32,
    /// Alerts unacknowledged longer than the response threshold.
    pub no_caregiver_response: u32,
    /// Weak GPS signal. A lost signal scores double.
    pub gps_weak: u32,
    /// Inside a buffer halo.
    pub in_buffer_zone: u32,
    /// Inside a restricted zone.
    pub in_restricted_zone: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            outside_safe_zone: 30,
            near_danger_zone: 40,
            night_hours: 15,
            duration_outside: 20,
            no_caregiver_response: 25,
            gps_weak: 10,
            in_buffer_zone: 10,
            in_restricted_zone: 25,
        }
    }
}

/// Risk scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Factor weights.
    pub weights: RiskWeights,
    /// First hour (0-23) of the night window.
    pub night_start_hour: u32,
    /// Hour (0-23) the night window ends, exclusive. May be earlier than
    /// the start hour to wrap past midnight.
    pub night_end_hour: u32,
    /// Distance to a danger zone center (meters) that counts as near.
    pub danger_proximity_m: f64,
    /// Seconds outside safe zones before the duration factor applies.
    pub time_outside_threshold_secs: i64,
    /// Seconds without caregiver acknowledgement before the response
    /// factor applies.
    pub no_response_threshold_secs: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            night_start_hour: 20,
            night_end_hour: 6,
            danger_proximity_m: 50.0,
            time_outside_threshold_secs: 600,
            no_response_threshold_secs: 600,
        }
    }
}

impl RiskConfig {
    /// Whether `hour` falls in the night window.
    #[must_use]
    pub const fn is_night(&self, hour: u32) -> bool {
        if self.night_start_hour > self.night_end_hour {
            hour >= self.night_start_hour || hour < self.night_end_hour
        } else {
            hour >= self.night_start_hour && hour < self.night_end_hour
        }
    }
}

/// One contributing reason behind a risk score, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "factor", rename_all = "camelCase")]
pub enum RiskFactor {
    /// Not inside any safe zone.
    OutsideSafeZone,
    /// Inside a buffer halo.
    InBufferZone,
    /// Inside a restricted zone.
    InRestrictedZone,
    /// Within the proximity threshold of a danger zone center.
    NearDangerZone {
        /// Distance to the nearest danger center in meters.
        distance_m: f64,
    },
    /// Inside a danger zone boundary.
    InsideDangerZone,
    /// During the night window.
    NightHours,
    /// Away from safe zones longer than the threshold.
    ProlongedAbsence {
        /// Seconds since the confirmed safe-zone exit.
        seconds: i64,
    },
    /// Alerts unacknowledged longer than the threshold.
    NoCaregiverResponse {
        /// Seconds since the oldest unacknowledged alert.
        seconds: i64,
    },
    /// Degraded or missing GPS fix.
    GpsDegraded {
        /// The degraded signal state.
        signal: GpsSignal,
    },
    /// Movement departs from the subject's baseline.
    BehavioralAnomaly,
}

impl std::fmt::Display for RiskFactor {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutsideSafeZone => f.write_str("Outside safe zone"),
            Self::InBufferZone => f.write_str("In buffer zone"),
            Self::InRestrictedZone => f.write_str("In restricted zone"),
            Self::NearDangerZone { distance_m } => {
                write!(f, "Near danger zone ({}m)", distance_m.trunc() as i64)
            }
            Self::InsideDangerZone => f.write_str("INSIDE danger zone"),
            Self::NightHours => f.write_str("Night hours"),
            Self::ProlongedAbsence { seconds } => {
                write!(f, "Outside for {} minutes", seconds / 60)
            }
            Self::NoCaregiverResponse { seconds } => {
                write!(f, "No response for {} minutes", seconds / 60)
            }
            Self::GpsDegraded { signal } => write!(f, "GPS signal {signal}"),
            Self::BehavioralAnomaly => f.write_str("Behavioral anomaly detected"),
        }
    }
}

/// Coarse risk band for dashboards.
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
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    /// Score below 20.
    Low,
    /// Score 20-39.
    Medium,
    /// Score 40-59.
    High,
    /// Score 60 and above.
    Critical,
}

/// A scored risk evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Final score, 0-100.
    pub score: u8,
    /// Factors that fired, in evaluation order.
    pub factors: Vec<RiskFactor>,
    /// Sum of factor points before adjustments and clamping.
    pub raw_points: u32,
    /// The usual-activity-time reduction was applied.
    pub usual_time_reduction: bool,
    /// The night-exit escalation was applied.
    pub night_exit_escalation: bool,
}

impl RiskAssessment {
    /// Human-readable factor labels, in evaluation order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.factors.iter().map(ToString::to_string).collect()
    }
}
