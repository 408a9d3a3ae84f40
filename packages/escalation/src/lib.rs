#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Five-state escalation machine.
//!
//! Moves a subject between safe, advisory, warning, urgent and emergency
//! based on the current risk score and danger proximity. Upward moves out
//! of advisory and urgent require the risk to have been held for a minimum
//! time in that state; downward moves use lower thresholds than the upward
//! ones so a score hovering at a boundary does not flap.
//!
//! Evaluation is pure: time in state is passed in, and the caller owns the
//! state and its entry timestamp.

use chrono::{DateTime, TimeDelta, Utc};
use safe_wander_escalation_models::{EscalationState, EscalationThresholds, Transition};

/// Message used whenever a caregiver resolves the situation.
pub const CAREGIVER_RESOLVED_MESSAGE: &str =
    "Caregiver resolved situation - returning to safe state";

/// Evaluates one step of the state machine.
///
/// Caregiver resolution is checked before anything else and always lands
/// in [`EscalationState::Safe`].
#[must_use]
pub fn transition(
    current: EscalationState,
    risk: u8,
    time_in_state: TimeDelta,
    near_danger: bool,
    manual_resolve: bool,
    thresholds: &EscalationThresholds,
) -> Transition {
    let (state, message) = if manual_resolve {
        (
            EscalationState::Safe,
            Some(CAREGIVER_RESOLVED_MESSAGE.to_string()),
        )
    } else {
        evaluate(current, risk, time_in_state, near_danger, thresholds)
    };

    if let Some(message) = &message {
        log::debug!("Escalation {current} -> {state}: {message}");
    }

    Transition {
        from: current,
        state,
        message,
    }
}

/// [`transition`] for a stored state name. Unknown names are treated as
/// safe.
#[must_use]
pub fn transition_named(
    current: &str,
    risk: u8,
    time_in_state: TimeDelta,
    near_danger: bool,
    manual_resolve: bool,
    thresholds: &EscalationThresholds,
) -> Transition {
    transition(
        EscalationState::parse_or_safe(current),
        risk,
        time_in_state,
        near_danger,
        manual_resolve,
        thresholds,
    )
}

/// [`transition`] with time in state measured from `entered_at` to `now`.
///
/// An entry timestamp in the future counts as zero time in state.
#[must_use]
pub fn transition_at(
    current: EscalationState,
    risk: u8,
    entered_at: DateTime<Utc>,
    now: DateTime<Utc>,
    near_danger: bool,
    manual_resolve: bool,
    thresholds: &EscalationThresholds,
) -> Transition {
    let time_in_state = (now - entered_at).max(TimeDelta::zero());
    transition(
        current,
        risk,
        time_in_state,
        near_danger,
        manual_resolve,
        thresholds,
    )
}

fn evaluate(
    current: EscalationState,
    risk: u8,
    time_in_state: TimeDelta,
    near_danger: bool,
    thresholds: &EscalationThresholds,
) -> (EscalationState, Option<String>) {
    let advisory_hold = TimeDelta::seconds(thresholds.advisory_hold_secs);
    let urgent_hold = TimeDelta::seconds(thresholds.urgent_hold_secs);
    let held_minutes = time_in_state.num_minutes();

    match current {
        EscalationState::Safe => {
            if risk >= thresholds.advisory_risk {
                return (
                    EscalationState::Advisory,
                    Some(format!("Risk elevated to {risk} - entering advisory mode")),
                );
            }
        }
        EscalationState::Advisory => {
            if risk >= thresholds.warning_risk {
                if time_in_state > advisory_hold {
                    return (
                        EscalationState::Warning,
                        Some(format!(
                            "Sustained risk ({risk}) for {held_minutes}min - entering warning mode"
                        )),
                    );
                }
            } else if risk < thresholds.advisory_risk {
                return (
                    EscalationState::Safe,
                    Some("Risk normalized - returning to safe state".to_string()),
                );
            }
        }
        EscalationState::Warning => {
            if risk >= thresholds.urgent_risk || near_danger {
                let reason = if near_danger {
                    "NEAR DANGER ZONE".to_string()
                } else {
                    format!("HIGH RISK ({risk})")
                };
                return (
                    EscalationState::Urgent,
                    Some(format!("{reason} - entering urgent mode")),
                );
            } else if risk < thresholds.warning_risk {
                return (
                    EscalationState::Advisory,
                    Some("Risk decreased - returning to advisory mode".to_string()),
                );
            }
        }
        EscalationState::Urgent => {
            if risk >= thresholds.emergency_risk {
                if time_in_state > urgent_hold {
                    return (
                        EscalationState::Emergency,
                        Some(format!(
                            "EMERGENCY: Critical risk ({risk}) sustained for {held_minutes}min - immediate action required"
                        )),
                    );
                }
            } else if risk < thresholds.urgent_risk && !near_danger {
                return (
                    EscalationState::Warning,
                    Some("Risk decreased - returning to warning mode".to_string()),
                );
            }
        }
        EscalationState::Emergency => {
            if risk < thresholds.warning_risk && !near_danger {
                return (
                    EscalationState::Warning,
                    Some("Risk decreased significantly - de-escalating from emergency".to_string()),
                );
            }
        }
    }

    (current, None)
}

/// Whether moving from `old` to `new` should raise a caregiver alert.
///
/// Any change in severity counts, in either direction.
#[must_use]
pub const fn is_alert_worthy(old: EscalationState, new: EscalationState) -> bool {
    old.severity_rank() != new.severity_rank()
}

/// Caregiver-facing description of a state.
#[must_use]
pub const fn describe(state: EscalationState) -> &'static str {
    match state {
        EscalationState::Safe => "Patient is in a safe zone with normal activity",
        EscalationState::Advisory => "Patient activity being monitored - minor risk detected",
        EscalationState::Warning => "Patient may be wandering - caregiver attention recommended",
        EscalationState::Urgent => "Patient at risk - immediate caregiver response required",
        EscalationState::Emergency => {
            "EMERGENCY - Patient missing or in danger - activate search protocol"
        }
    }
}
