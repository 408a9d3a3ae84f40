//! Emergency record lifecycle.
//!
//! A record starts active, may have its search radius revised any number
//! of times, and ends either resolved or as a false alarm. Every change
//! appends to the timeline.

use chrono::{DateTime, Utc};
use safe_wander_emergency_models::{
    EmergencyRecord, EmergencyStatus, TimelineEntry, TimelineKind,
};
use safe_wander_geo_models::Coordinate;
use uuid::Uuid;

use crate::EmergencyError;

/// Opens a new emergency for `subject_id`.
#[must_use]
pub fn activate(
    subject_id: impl Into<String>,
    last_known_location: Option<Coordinate>,
    search_radius_m: f64,
    missing_since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EmergencyRecord {
    let record = EmergencyRecord {
        id: Uuid::new_v4(),
        subject_id: subject_id.into(),
        last_known_location,
        search_radius_m,
        status: EmergencyStatus::Active,
        missing_since,
        activated_at: now,
        resolved_at: None,
        timeline: vec![TimelineEntry {
            time: now,
            event: "Emergency activated".to_string(),
            kind: TimelineKind::System,
        }],
    };

    log::info!(
        "Emergency {} activated for {} with search radius {:.0}m",
        record.id,
        record.subject_id,
        record.search_radius_m
    );

    record
}

/// Sets a new search radius.
///
/// # Errors
///
/// * [`EmergencyError::AlreadyClosed`] if the record is no longer active
/// * [`EmergencyError::InvalidRadius`] if `radius_m` is not a positive
///   finite number
pub fn update_search_radius(
    record: &mut EmergencyRecord,
    radius_m: f64,
    now: DateTime<Utc>,
) -> Result<(), EmergencyError> {
    ensure_active(record)?;
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(EmergencyError::InvalidRadius(radius_m));
    }

    record.search_radius_m = radius_m;
    record.timeline.push(TimelineEntry {
        time: now,
        event: format!("Search radius updated to {radius_m:.0}m"),
        kind: TimelineKind::Update,
    });
    Ok(())
}

/// Closes the emergency as `resolution`.
///
/// # Errors
///
/// * [`EmergencyError::AlreadyClosed`] if the record is no longer active
/// * [`EmergencyError::InvalidResolution`] if `resolution` is
///   [`EmergencyStatus::Active`]
pub fn resolve(
    record: &mut EmergencyRecord,
    resolution: EmergencyStatus,
    now: DateTime<Utc>,
) -> Result<(), EmergencyError> {
    ensure_active(record)?;
    if !resolution.is_terminal() {
        return Err(EmergencyError::InvalidResolution {
            id: record.id,
            status: resolution,
        });
    }

    record.status = resolution;
    record.resolved_at = Some(now);
    record.timeline.push(TimelineEntry {
        time: now,
        event: format!("Emergency {resolution}"),
        kind: TimelineKind::System,
    });

    log::info!(
        "Emergency {} for {} closed as {resolution}",
        record.id,
        record.subject_id
    );
    Ok(())
}

const fn ensure_active(record: &EmergencyRecord) -> Result<(), EmergencyError> {
    if record.status.is_terminal() {
        return Err(EmergencyError::AlreadyClosed {
            id: record.id,
            status: record.status,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn record() -> EmergencyRecord {
        activate(
            "p1",
            Some(Coordinate::new(45.0, 7.0)),
            500.0,
            start() - TimeDelta::minutes(30),
            start(),
        )
    }

    #[test]
    fn activation_opens_the_timeline() {
        let record = record();
        assert!(record.is_active());
        assert_eq!(record.timeline.len(), 1);
        assert_eq!(record.timeline[0].event, "Emergency activated");
        assert_eq!(record.timeline[0].kind, TimelineKind::System);
    }

    #[test]
    fn radius_updates_are_recorded() {
        let mut record = record();
        update_search_radius(&mut record, 1440.0, start() + TimeDelta::minutes(5)).unwrap();
        assert!((record.search_radius_m - 1440.0).abs() < f64::EPSILON);
        let last = record.timeline.last().unwrap();
        assert_eq!(last.event, "Search radius updated to 1440m");
        assert_eq!(last.kind, TimelineKind::Update);
    }

    #[test]
    fn invalid_radius_is_rejected() {
        let mut record = record();
        let result = update_search_radius(&mut record, 0.0, start());
        assert!(matches!(result, Err(EmergencyError::InvalidRadius(_))));
        assert_eq!(record.timeline.len(), 1);
    }

    #[test]
    fn resolution_is_terminal() {
        let mut record = record();
        let later = start() + TimeDelta::minutes(45);
        resolve(&mut record, EmergencyStatus::FalseAlarm, later).unwrap();

        assert_eq!(record.status, EmergencyStatus::FalseAlarm);
        assert_eq!(record.resolved_at, Some(later));
        assert_eq!(
            record.timeline.last().map(|e| e.event.as_str()),
            Some("Emergency false_alarm")
        );

        let again = resolve(&mut record, EmergencyStatus::Resolved, later);
        assert!(matches!(again, Err(EmergencyError::AlreadyClosed { .. })));

        let radius = update_search_radius(&mut record, 900.0, later);
        assert!(matches!(radius, Err(EmergencyError::AlreadyClosed { .. })));
        assert_eq!(record.timeline.len(), 2, "timeline unchanged after close");
    }

    #[test]
    fn active_is_not_a_resolution() {
        let mut record = record();
        let result = resolve(&mut record, EmergencyStatus::Active, start());
        assert!(matches!(
            result,
            Err(EmergencyError::InvalidResolution { .. })
        ));
        assert!(record.is_active());
    }
}
