#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Records exchanged between the monitor and its collaborators.
//!
//! [`SubjectRecord`] is read and written back by the monitor each pass.
//! [`AlertRecord`] and [`ActivityRecord`] are produced for the store to
//! persist, and [`MonitorEvent`]s for observers to broadcast.

use chrono::{DateTime, Utc};
use safe_wander_emergency_models::{EmergencyStatus, MobilityLevel};
use safe_wander_escalation_models::{AlertLevel, EscalationState};
use safe_wander_geo_models::Coordinate;
use safe_wander_risk_models::{GpsSignal, RiskLevel};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Alert type for escalation state changes.
pub const GEOFENCE_ALERT_TYPE: &str = "geofence";

/// A monitored person and the state the monitor keeps for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Unrecognized values read as medium.
    #[serde(default, deserialize_with = "lenient_mobility")]
    pub mobility: MobilityLevel,
    /// Unrecognized values read as safe.
    #[serde(default, deserialize_with = "lenient_state")]
    pub state: EscalationState,
    /// When the current state was entered. Unknown means "now".
    #[serde(default)]
    pub state_entered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub risk_score: u8,
    /// Confirmed exit from the last safe zone, cleared on return.
    #[serde(default)]
    pub last_safe_zone_exit: Option<DateTime<Utc>>,
    /// Signal quality last reported by the device itself.
    #[serde(default)]
    pub device_gps_signal: GpsSignal,
    /// Timestamp of the oldest alert no caregiver has acknowledged.
    #[serde(default)]
    pub oldest_unacknowledged_alert: Option<DateTime<Utc>>,
    /// How a caregiver resolved the situation, if they have. Consumed by
    /// the next evaluation, which returns the subject to safe and closes
    /// any emergency with this status.
    #[serde(default)]
    pub pending_resolution: Option<EmergencyStatus>,
    #[serde(default = "default_true")]
    pub monitoring_active: bool,
}

impl SubjectRecord {
    /// A newly enrolled subject in the safe state.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mobility: MobilityLevel::default(),
            state: EscalationState::Safe,
            state_entered_at: None,
            risk_score: 0,
            last_safe_zone_exit: None,
            device_gps_signal: GpsSignal::Good,
            oldest_unacknowledged_alert: None,
            pending_resolution: None,
            monitoring_active: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

fn lenient_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EscalationState, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(EscalationState::parse_or_safe(&value))
}

fn lenient_mobility<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MobilityLevel, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(MobilityLevel::parse_or_medium(&value))
}

/// A caregiver alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: Uuid,
    pub subject_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub level: AlertLevel,
    /// Transition message naming the trigger.
    pub message: String,
    pub description: String,
    /// Unusual behavior observed when the alert was raised.
    #[serde(default)]
    pub details: Vec<String>,
    pub location: Option<Coordinate>,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Kind of an activity log entry.
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
pub enum ActivityKind {
    StateChange,
    ZoneExit,
    ZoneEntry,
    Emergency,
}

/// One entry in a subject's activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub subject_id: String,
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Notifications published while processing a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MonitorEvent {
    /// Fresh risk evaluation.
    #[serde(rename_all = "camelCase")]
    RiskUpdated {
        subject_id: String,
        score: u8,
        level: RiskLevel,
        factors: Vec<String>,
        zone: Option<String>,
        position: Coordinate,
        timestamp: DateTime<Utc>,
    },
    /// The escalation state changed.
    #[serde(rename_all = "camelCase")]
    StateChanged {
        subject_id: String,
        from: EscalationState,
        to: EscalationState,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// An alert was raised.
    AlertRaised(AlertRecord),
    /// A confirmed safe-zone exit.
    #[serde(rename_all = "camelCase")]
    SafeZoneExited {
        subject_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A return to a safe zone after a confirmed exit.
    #[serde(rename_all = "camelCase")]
    SafeZoneEntered {
        subject_id: String,
        trip_secs: i64,
        timestamp: DateTime<Utc>,
    },
    /// A search was started.
    #[serde(rename_all = "camelCase")]
    EmergencyActivated {
        subject_id: String,
        emergency_id: Uuid,
        search_radius_m: f64,
    },
    /// A search was concluded.
    #[serde(rename_all = "camelCase")]
    EmergencyResolved {
        subject_id: String,
        emergency_id: Uuid,
        status: EmergencyStatus,
    },
}

/// Result of evaluating one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOutcome {
    pub subject_id: String,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
    pub previous_state: EscalationState,
    pub state: EscalationState,
    /// Transition message, when a rule fired.
    pub transition_message: Option<String>,
    /// Position the zones were evaluated at, after smoothing.
    pub position: Coordinate,
    pub zone: Option<String>,
    pub gps_signal: GpsSignal,
    pub anomaly: bool,
    /// Caregiver-facing descriptions of unusual movement.
    pub anomalies: Vec<String>,
    pub wandering_score: u8,
    pub alert_raised: bool,
    /// Current search radius while an emergency is active.
    pub search_radius_m: Option<f64>,
}

/// A subject whose evaluation failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectFailure {
    pub subject_id: String,
    pub error: String,
}

/// Totals for one periodic pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    /// Subjects evaluated successfully.
    pub processed: usize,
    /// Subjects with no location history.
    pub skipped: usize,
    pub failed: Vec<SubjectFailure>,
    /// Successful evaluations that changed state.
    pub transitions: usize,
    pub outcomes: Vec<SubjectOutcome>,
}
