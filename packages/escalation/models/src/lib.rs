#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Escalation state types.

use std::str::FromStr as _;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Graded caregiver attention level, least to most severe.
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
pub enum EscalationState {
    /// Normal activity.
    #[default]
    Safe,
    /// Minor risk, being watched.
    Advisory,
    /// Possibly wandering.
    Warning,
    /// At risk, immediate response needed.
    Urgent,
    /// Missing or in danger.
    Emergency,
}

impl EscalationState {
    /// Every state, least severe first.
    pub const ALL: [Self; 5] = [
        Self::Safe,
        Self::Advisory,
        Self::Warning,
        Self::Urgent,
        Self::Emergency,
    ];

    /// Parses a stored state name, treating anything unrecognized as
    /// [`EscalationState::Safe`].
    #[must_use]
    pub fn parse_or_safe(value: &str) -> Self {
        Self::from_str(value.trim()).unwrap_or_default()
    }

    /// Numeric severity, 0 for safe through 4 for emergency.
    #[must_use]
    pub const fn severity_rank(self) -> u8 {
        match self {
            Self::Safe => 0,
            Self::Advisory => 1,
            Self::Warning => 2,
            Self::Urgent => 3,
            Self::Emergency => 4,
        }
    }

    /// Alert level used when this state raises an alert.
    #[must_use]
    pub const fn alert_level(self) -> AlertLevel {
        match self {
            Self::Safe | Self::Advisory => AlertLevel::Low,
            Self::Warning => AlertLevel::Medium,
            Self::Urgent => AlertLevel::High,
            Self::Emergency => AlertLevel::Critical,
        }
    }
}

/// Alert severity shown to caregivers.
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
pub enum AlertLevel {
    /// Safe or advisory. Informational.
    Low,
    /// Warning. A caregiver should check in.
    Medium,
    /// Urgent. A caregiver should respond now.
    High,
    /// Emergency. Start searching.
    Critical,
}

/// Risk thresholds and hold times for the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
    /// Safe to advisory, and advisory back to safe below it.
    pub advisory_risk: u8,
    /// Advisory to warning, and warning or emergency back down below it.
    pub warning_risk: u8,
    /// Warning to urgent, and urgent back to warning below it.
    pub urgent_risk: u8,
    /// Urgent to emergency.
    pub emergency_risk: u8,
    /// Seconds in advisory before warning can fire.
    pub advisory_hold_secs: i64,
    /// Seconds in urgent before emergency can fire.
    pub urgent_hold_secs: i64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            advisory_risk: 20,
            warning_risk: 40,
            urgent_risk: 60,
            emergency_risk: 80,
            advisory_hold_secs: 300,
            urgent_hold_secs: 600,
        }
    }
}

/// Outcome of one state machine evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// State before evaluation, after coercing unknown names.
    pub from: EscalationState,
    /// State after evaluation. Equal to `from` when nothing fired.
    pub state: EscalationState,
    /// Explanation naming the trigger. `None` when nothing fired.
    pub message: Option<String>,
}

impl Transition {
    /// Whether a transition rule fired.
    #[must_use]
    pub const fn fired(&self) -> bool {
        self.message.is_some()
    }
}
