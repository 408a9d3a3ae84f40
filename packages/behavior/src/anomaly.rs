//! Statistical anomaly detection.
//!
//! Flags movement that departs from a subject's baseline and scores
//! patterns associated with disorientation (frequent direction changes,
//! looping back to the starting point, unusually long trips). Plain
//! threshold statistics only.

use safe_wander_behavior_models::{AnomalyConfig, BehavioralBaseline, WanderingAssessment};
use safe_wander_geo::{bearing, haversine_distance};
use safe_wander_geo_models::{Coordinate, LocationSample};

/// Minimum number of positions before circling can be detected.
pub const CIRCLING_MIN_SAMPLES: usize = 5;

/// Returns to the start needed before a track counts as circling.
pub const CIRCLING_MIN_RETURNS: usize = 2;

/// Whether the current trip departs from the subject's baseline.
///
/// Fires when the trip has lasted longer than
/// `avg_duration + multiplier * std_duration`, or when the current speed
/// differs from the average by more than the fixed speed threshold. The
/// speed check deliberately ignores the baseline's own `std_speed`.
#[must_use]
pub fn detect_anomaly(
    speed_mps: f64,
    duration_secs: f64,
    baseline: &BehavioralBaseline,
    config: &AnomalyConfig,
) -> bool {
    is_duration_outlier(duration_secs, baseline, config)
        || is_speed_outlier(speed_mps, baseline, config)
}

fn is_duration_outlier(
    duration_secs: f64,
    baseline: &BehavioralBaseline,
    config: &AnomalyConfig,
) -> bool {
    duration_secs
        > config
            .duration_std_multiplier
            .mul_add(baseline.std_duration_secs, baseline.avg_duration_secs)
}

fn is_speed_outlier(speed_mps: f64, baseline: &BehavioralBaseline, config: &AnomalyConfig) -> bool {
    (speed_mps - baseline.avg_speed_mps).abs() > config.speed_deviation_threshold_mps
}

/// Counts adjacent heading pairs that differ by more than `threshold_deg`,
/// measured the short way around the compass.
#[must_use]
pub fn count_direction_changes(headings: &[f64], threshold_deg: f64) -> usize {
    headings
        .windows(2)
        .filter(|pair| {
            let mut diff = (pair[1] - pair[0]).abs() % 360.0;
            if diff > 180.0 {
                diff = 360.0 - diff;
            }
            diff > threshold_deg
        })
        .count()
}

/// Whether a chronological track repeatedly leaves and returns to its
/// starting point.
///
/// Moving more than three times `reference_m` from the start marks the
/// subject as "away"; coming back within `reference_m` while away counts
/// one return.
#[must_use]
pub fn is_circling(positions: &[Coordinate], reference_m: f64) -> bool {
    if positions.len() < CIRCLING_MIN_SAMPLES {
        return false;
    }

    let start = positions[0];
    let mut returns = 0;
    let mut was_far = false;

    for &position in &positions[1..] {
        let distance = haversine_distance(start, position);
        if distance > reference_m * 3.0 {
            was_far = true;
        } else if was_far && distance < reference_m {
            returns += 1;
            was_far = false;
        }
    }

    returns >= CIRCLING_MIN_RETURNS
}

/// Composite 0-100 confusion score.
#[must_use]
pub fn wandering_score(direction_changes: usize, circling: bool, duration_ratio: f64) -> u8 {
    let mut score: u32 = 0;

    score += match direction_changes {
        n if n > 10 => 40,
        n if n > 5 => 25,
        n if n > 2 => 10,
        _ => 0,
    };

    if circling {
        score += 30;
    }

    if duration_ratio > 3.0 {
        score += 30;
    } else if duration_ratio > 2.0 {
        score += 20;
    } else if duration_ratio > 1.5 {
        score += 10;
    }

    u8::try_from(score.min(100)).unwrap_or(100)
}

/// Headings along a chronological track.
///
/// Uses the device-reported heading when present, otherwise the bearing
/// from the previous fix. The first fix only contributes a reported
/// heading.
#[must_use]
pub fn headings_from_track(track: &[LocationSample]) -> Vec<f64> {
    let mut headings = Vec::with_capacity(track.len());

    for (i, sample) in track.iter().enumerate() {
        if let Some(heading) = sample.heading_deg {
            headings.push(heading);
        } else if i > 0 {
            let previous = &track[i - 1];
            if previous.position != sample.position {
                headings.push(bearing(previous.position, sample.position));
            }
        }
    }

    headings
}

/// Scores the wandering pattern of a chronological track.
#[must_use]
pub fn assess_wandering(
    track: &[LocationSample],
    duration_secs: f64,
    baseline: &BehavioralBaseline,
    config: &AnomalyConfig,
) -> WanderingAssessment {
    let headings = headings_from_track(track);
    let direction_changes =
        count_direction_changes(&headings, config.direction_change_threshold_deg);

    let positions: Vec<Coordinate> = track.iter().map(|s| s.position).collect();
    let circling = is_circling(&positions, config.circling_reference_m);

    let duration_ratio = if baseline.avg_duration_secs > 0.0 {
        duration_secs / baseline.avg_duration_secs
    } else {
        0.0
    };

    WanderingAssessment {
        direction_changes,
        circling,
        duration_ratio,
        score: wandering_score(direction_changes, circling, duration_ratio),
    }
}

/// Caregiver-facing descriptions of whatever is unusual right now.
#[must_use]
pub fn describe_anomalies(
    speed_mps: f64,
    duration_secs: f64,
    baseline: &BehavioralBaseline,
    direction_changes: usize,
    config: &AnomalyConfig,
) -> Vec<String> {
    let mut descriptions = Vec::new();

    if is_duration_outlier(duration_secs, baseline, config) {
        descriptions.push(format!(
            "Trip unusually long: {}min vs typical {}min",
            whole_minutes(duration_secs),
            whole_minutes(baseline.avg_duration_secs),
        ));
    }

    if is_speed_outlier(speed_mps, baseline, config) {
        let direction = if speed_mps > baseline.avg_speed_mps {
            "faster"
        } else {
            "slower"
        };
        descriptions.push(format!(
            "Moving {direction} than usual: {speed_mps:.1}m/s vs {:.1}m/s",
            baseline.avg_speed_mps
        ));
    }

    if direction_changes > 5 {
        descriptions.push(format!(
            "Frequent direction changes: {direction_changes} changes detected"
        ));
    }

    descriptions
}

#[allow(clippy::cast_possible_truncation)]
fn whole_minutes(secs: f64) -> i64 {
    (secs / 60.0).trunc() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const START: Coordinate = Coordinate::new(45.0, 7.0);

    /// A position `meters` north of [`START`].
    fn north(meters: f64) -> Coordinate {
        let degrees = (meters / safe_wander_geo::EARTH_RADIUS_M).to_degrees();
        Coordinate::new(START.lat + degrees, START.lng)
    }

    fn track(positions: &[Coordinate]) -> Vec<LocationSample> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &position)| LocationSample {
                subject_id: "p1".to_string(),
                position,
                timestamp: Utc
                    .timestamp_opt(1_700_000_000 + i64::try_from(i).unwrap() * 10, 0)
                    .unwrap(),
                accuracy_m: None,
                speed_mps: None,
                heading_deg: None,
            })
            .collect()
    }

    #[test]
    fn long_trip_is_anomalous() {
        let baseline = BehavioralBaseline::default();
        let config = AnomalyConfig::default();
        // 900 + 2 * 300 = 1500
        assert!(!detect_anomaly(0.8, 1500.0, &baseline, &config));
        assert!(detect_anomaly(0.8, 1501.0, &baseline, &config));
    }

    #[test]
    fn speed_outlier_ignores_baseline_deviation() {
        let mut baseline = BehavioralBaseline::default();
        baseline.std_speed_mps = 5.0;
        let config = AnomalyConfig::default();
        assert!(detect_anomaly(1.4, 0.0, &baseline, &config));
        assert!(detect_anomaly(0.2, 0.0, &baseline, &config));
        assert!(!detect_anomaly(1.2, 0.0, &baseline, &config));
    }

    #[test]
    fn direction_changes_wrap_around_north() {
        // 350 -> 10 is a 20 degree turn, not 340.
        assert_eq!(count_direction_changes(&[350.0, 10.0], 45.0), 0);
        assert_eq!(count_direction_changes(&[0.0, 90.0, 180.0, 185.0], 45.0), 2);
        assert_eq!(count_direction_changes(&[], 45.0), 0);
        assert_eq!(count_direction_changes(&[120.0], 45.0), 0);
    }

    #[test]
    fn two_returns_is_circling() {
        let positions = vec![START, north(80.0), north(5.0), north(90.0), north(10.0)];
        assert!(is_circling(&positions, 20.0));
    }

    #[test]
    fn one_return_is_not_circling() {
        let positions = vec![START, north(80.0), north(5.0), north(90.0), north(100.0)];
        assert!(!is_circling(&positions, 20.0));
    }

    #[test]
    fn short_track_is_never_circling() {
        let positions = vec![START, north(80.0), north(5.0), north(90.0)];
        assert!(!is_circling(&positions, 20.0));
    }

    #[test]
    fn wandering_score_tiers() {
        assert_eq!(wandering_score(0, false, 1.0), 0);
        assert_eq!(wandering_score(3, false, 1.0), 10);
        assert_eq!(wandering_score(6, false, 1.6), 35);
        assert_eq!(wandering_score(11, true, 2.5), 90);
        assert_eq!(wandering_score(11, true, 3.5), 100);
    }

    #[test]
    fn headings_fall_back_to_bearing() {
        let mut samples = track(&[START, north(50.0), north(100.0)]);
        samples[2].heading_deg = Some(270.0);

        let headings = headings_from_track(&samples);
        assert_eq!(headings.len(), 2);
        assert!(headings[0].abs() < 1e-6 || (headings[0] - 360.0).abs() < 1e-6);
        assert!((headings[1] - 270.0).abs() < f64::EPSILON);
    }

    #[test]
    fn assess_wandering_combines_signals() {
        let samples = track(&[START, north(80.0), north(5.0), north(90.0), north(10.0)]);
        let assessment = assess_wandering(
            &samples,
            2700.0,
            &BehavioralBaseline::default(),
            &AnomalyConfig::default(),
        );
        assert!(assessment.circling);
        assert_eq!(assessment.direction_changes, 3);
        assert!((assessment.duration_ratio - 3.0).abs() < f64::EPSILON);
        // 10 (3 changes) + 30 (circling) + 20 (ratio exactly 3.0 is not > 3.0)
        assert_eq!(assessment.score, 60);
    }

    #[test]
    fn descriptions_name_each_anomaly() {
        let baseline = BehavioralBaseline::default();
        let lines = describe_anomalies(0.1, 2400.0, &baseline, 7, &AnomalyConfig::default());
        assert_eq!(
            lines,
            vec![
                "Trip unusually long: 40min vs typical 15min".to_string(),
                "Moving slower than usual: 0.1m/s vs 0.8m/s".to_string(),
                "Frequent direction changes: 7 changes detected".to_string(),
            ]
        );
    }
}
