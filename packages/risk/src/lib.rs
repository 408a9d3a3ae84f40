#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Weighted risk scoring.
//!
//! Every predicate is evaluated once, in a fixed order, into a list of
//! [`RiskFactor`]s. The numeric score and the human-readable explanation
//! are both derived from that one list, so they always agree.

use safe_wander_geo::evaluate_zones;
use safe_wander_geo_models::{Coordinate, Geofence, ZoneStatus};
use safe_wander_risk_models::{
    GpsSignal, RiskAssessment, RiskConfig, RiskFactor, RiskLevel, RiskWeights,
};

/// Flat bonus for a behavioral anomaly. Not part of the weight table.
pub const ANOMALY_BONUS: u32 = 10;

/// Scale applied during the subject's usual activity hours.
pub const USUAL_TIME_FACTOR: f64 = 0.7;

/// Scale applied at night when the subject is outside every safe zone.
pub const NIGHT_EXIT_FACTOR: f64 = 1.3;

/// Maximum score.
pub const MAX_SCORE: u8 = 100;

/// Non-zone inputs to a risk evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiskContext {
    /// Tracker signal quality.
    pub gps_signal: GpsSignal,
    /// Seconds since the confirmed safe-zone exit, 0 when inside.
    pub time_outside_secs: i64,
    /// Seconds since the oldest unacknowledged alert, 0 when none.
    pub no_response_secs: i64,
    /// Local hour of day, 0-23.
    pub hour: u32,
    /// Behavioral anomaly flag.
    pub anomaly: bool,
    /// The hour is one of the subject's usual activity hours.
    pub usual_time: bool,
}

/// Points a single factor contributes under `weights`.
#[must_use]
pub const fn factor_points(factor: &RiskFactor, weights: &RiskWeights) -> u32 {
    match factor {
        RiskFactor::OutsideSafeZone => weights.outside_safe_zone,
        RiskFactor::InBufferZone => weights.in_buffer_zone,
        RiskFactor::InRestrictedZone => weights.in_restricted_zone,
        RiskFactor::NearDangerZone { .. } | RiskFactor::InsideDangerZone => {
            weights.near_danger_zone
        }
        RiskFactor::NightHours => weights.night_hours,
        RiskFactor::ProlongedAbsence { .. } => weights.duration_outside,
        RiskFactor::NoCaregiverResponse { .. } => weights.no_caregiver_response,
        RiskFactor::GpsDegraded { signal } => match signal {
            GpsSignal::Good => 0,
            GpsSignal::Weak => weights.gps_weak,
            GpsSignal::Lost => weights.gps_weak.saturating_mul(2),
        },
        RiskFactor::BehavioralAnomaly => ANOMALY_BONUS,
    }
}

/// Evaluates every risk predicate in order.
#[must_use]
pub fn risk_factors(
    status: &ZoneStatus,
    context: &RiskContext,
    config: &RiskConfig,
) -> Vec<RiskFactor> {
    let mut factors = Vec::new();

    if !status.in_safe {
        factors.push(RiskFactor::OutsideSafeZone);
    }
    if status.in_buffer {
        factors.push(RiskFactor::InBufferZone);
    }
    if status.in_restricted {
        factors.push(RiskFactor::InRestrictedZone);
    }
    if status.is_near_danger(config.danger_proximity_m) {
        factors.push(RiskFactor::NearDangerZone {
            distance_m: status.nearest_danger_distance_m,
        });
    }
    // Stacks with proximity when inside the boundary.
    if status.in_danger {
        factors.push(RiskFactor::InsideDangerZone);
    }
    if config.is_night(context.hour) {
        factors.push(RiskFactor::NightHours);
    }
    if context.time_outside_secs > config.time_outside_threshold_secs {
        factors.push(RiskFactor::ProlongedAbsence {
            seconds: context.time_outside_secs,
        });
    }
    if context.no_response_secs > config.no_response_threshold_secs {
        factors.push(RiskFactor::NoCaregiverResponse {
            seconds: context.no_response_secs,
        });
    }
    if context.gps_signal != GpsSignal::Good {
        factors.push(RiskFactor::GpsDegraded {
            signal: context.gps_signal,
        });
    }
    if context.anomaly {
        factors.push(RiskFactor::BehavioralAnomaly);
    }

    factors
}

/// Scores an already-evaluated zone status.
///
/// After summing factor points, a usual-activity hour scales the total by
/// 0.7 and then a night hour spent outside every safe zone scales it by
/// 1.3. Both steps truncate toward zero. The result is clamped to 100.
#[must_use]
pub fn assess(status: &ZoneStatus, context: &RiskContext, config: &RiskConfig) -> RiskAssessment {
    let factors = risk_factors(status, context, config);
    let raw_points = factors
        .iter()
        .map(|factor| factor_points(factor, &config.weights))
        .fold(0_u32, u32::saturating_add);

    let mut total = raw_points;

    let usual_time_reduction = context.usual_time;
    if usual_time_reduction {
        total = scale(total, USUAL_TIME_FACTOR);
    }

    let night_exit_escalation = config.is_night(context.hour) && !status.in_safe;
    if night_exit_escalation {
        total = scale(total, NIGHT_EXIT_FACTOR);
    }

    let score = u8::try_from(total.min(u32::from(MAX_SCORE))).unwrap_or(MAX_SCORE);

    RiskAssessment {
        score,
        factors,
        raw_points,
        usual_time_reduction,
        night_exit_escalation,
    }
}

/// Multiplies in floating point and truncates toward zero, so 90 points at
/// a usual hour become 62 rather than 63.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(points: u32, factor: f64) -> u32 {
    (f64::from(points) * factor).trunc() as u32
}

/// Evaluates `zones` at `point` and scores the result.
#[must_use]
pub fn assess_point(
    point: Coordinate,
    zones: &[Geofence],
    context: &RiskContext,
    config: &RiskConfig,
) -> RiskAssessment {
    let status = evaluate_zones(point, zones);
    assess(&status, context, config)
}

/// Risk score, 0-100, for a subject at `point`.
#[must_use]
pub fn compute_risk(
    point: Coordinate,
    zones: &[Geofence],
    context: &RiskContext,
    config: &RiskConfig,
) -> u8 {
    assess_point(point, zones, context, config).score
}

/// Labels of the factors that contributed to [`compute_risk`] for the same
/// inputs, in evaluation order.
#[must_use]
pub fn explain(
    point: Coordinate,
    zones: &[Geofence],
    context: &RiskContext,
    config: &RiskConfig,
) -> Vec<String> {
    assess_point(point, zones, context, config).labels()
}

/// Coarse band for a score.
#[must_use]
pub const fn risk_level(score: u8) -> RiskLevel {
    match score {
        0..20 => RiskLevel::Low,
        20..40 => RiskLevel::Medium,
        40..60 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> ZoneStatus {
        ZoneStatus {
            in_safe: true,
            ..ZoneStatus::default()
        }
    }

    fn day() -> RiskContext {
        RiskContext {
            hour: 12,
            ..RiskContext::default()
        }
    }

    #[test]
    fn inside_safe_zone_at_midday_is_zero() {
        let assessment = assess(&status(), &day(), &RiskConfig::default());
        assert_eq!(assessment.score, 0);
        assert!(assessment.factors.is_empty());
    }

    #[test]
    fn buffer_does_not_suppress_outside_safe() {
        let zone_status = ZoneStatus {
            in_buffer: true,
            ..ZoneStatus::default()
        };
        let assessment = assess(&zone_status, &day(), &RiskConfig::default());
        assert_eq!(assessment.score, 40);
        assert_eq!(assessment.labels(), vec!["Outside safe zone", "In buffer zone"]);
    }

    #[test]
    fn inside_danger_stacks_with_proximity() {
        let zone_status = ZoneStatus {
            in_danger: true,
            nearest_danger_distance_m: 12.5,
            current_zone_name: Some("River".to_string()),
            ..ZoneStatus::default()
        };
        let assessment = assess(&zone_status, &day(), &RiskConfig::default());
        // 30 + 40 + 40
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.raw_points, 110);
        assert_eq!(
            assessment.labels(),
            vec![
                "Outside safe zone",
                "Near danger zone (12m)",
                "INSIDE danger zone"
            ]
        );
    }

    #[test]
    fn lost_signal_scores_double_weak() {
        let config = RiskConfig::default();
        let weak = RiskContext {
            gps_signal: GpsSignal::Weak,
            ..day()
        };
        let lost = RiskContext {
            gps_signal: GpsSignal::Lost,
            ..day()
        };
        assert_eq!(assess(&status(), &weak, &config).score, 10);
        assert_eq!(assess(&status(), &lost, &config).score, 20);
    }

    #[test]
    fn thresholds_are_strict() {
        let config = RiskConfig::default();
        let at_threshold = RiskContext {
            time_outside_secs: 600,
            no_response_secs: 600,
            ..day()
        };
        assert_eq!(assess(&status(), &at_threshold, &config).score, 0);

        let past_threshold = RiskContext {
            time_outside_secs: 601,
            no_response_secs: 900,
            ..day()
        };
        let assessment = assess(&status(), &past_threshold, &config);
        assert_eq!(assessment.score, 45);
        assert_eq!(
            assessment.labels(),
            vec!["Outside for 10 minutes", "No response for 15 minutes"]
        );
    }

    #[test]
    fn usual_time_reduction_truncates() {
        let context = RiskContext {
            anomaly: true,
            usual_time: true,
            ..day()
        };
        let zone_status = ZoneStatus::default();
        // (30 + 10) * 0.7 = 28
        let assessment = assess(&zone_status, &context, &RiskConfig::default());
        assert_eq!(assessment.score, 28);
        assert!(assessment.usual_time_reduction);
        assert!(!assessment.night_exit_escalation);
    }

    #[test]
    fn usual_time_reduction_matches_float_truncation() {
        let context = RiskContext {
            gps_signal: GpsSignal::Weak,
            anomaly: true,
            usual_time: true,
            ..day()
        };
        let zone_status = ZoneStatus {
            nearest_danger_distance_m: 45.0,
            ..ZoneStatus::default()
        };
        // 30 + 40 + 10 + 10 = 90, 90 * 0.7 = 62.99999
        let assessment = assess(&zone_status, &context, &RiskConfig::default());
        assert_eq!(assessment.raw_points, 90);
        assert_eq!(assessment.score, 62);
    }

    #[test]
    fn night_exit_escalates_after_reduction() {
        let context = RiskContext {
            hour: 22,
            usual_time: true,
            ..RiskContext::default()
        };
        // (30 + 15) = 45 -> 31 -> 40
        let assessment = assess(&ZoneStatus::default(), &context, &RiskConfig::default());
        assert_eq!(assessment.raw_points, 45);
        assert_eq!(assessment.score, 40);
        assert!(assessment.night_exit_escalation);
    }

    #[test]
    fn night_inside_safe_zone_is_not_escalated() {
        let context = RiskContext {
            hour: 2,
            ..RiskContext::default()
        };
        let assessment = assess(&status(), &context, &RiskConfig::default());
        assert_eq!(assessment.score, 15);
        assert!(!assessment.night_exit_escalation);
    }

    #[test]
    fn score_is_clamped() {
        let zone_status = ZoneStatus {
            in_restricted: true,
            in_danger: true,
            nearest_danger_distance_m: 0.0,
            ..ZoneStatus::default()
        };
        let context = RiskContext {
            gps_signal: GpsSignal::Lost,
            time_outside_secs: 3600,
            no_response_secs: 3600,
            hour: 23,
            anomaly: true,
            usual_time: false,
        };
        let assessment = assess(&zone_status, &context, &RiskConfig::default());
        assert_eq!(assessment.score, MAX_SCORE);
    }

    #[test]
    fn explanation_points_reconstruct_the_raw_sum() {
        let config = RiskConfig::default();
        let contexts = [
            day(),
            RiskContext {
                gps_signal: GpsSignal::Weak,
                hour: 21,
                anomaly: true,
                time_outside_secs: 700,
                ..RiskContext::default()
            },
            RiskContext {
                gps_signal: GpsSignal::Lost,
                no_response_secs: 1200,
                usual_time: true,
                hour: 8,
                ..RiskContext::default()
            },
        ];
        let statuses = [
            status(),
            ZoneStatus::default(),
            ZoneStatus {
                in_buffer: true,
                in_restricted: true,
                nearest_danger_distance_m: 30.0,
                ..ZoneStatus::default()
            },
        ];

        for zone_status in &statuses {
            for context in &contexts {
                let assessment = assess(zone_status, context, &config);
                let reconstructed: u32 = assessment
                    .factors
                    .iter()
                    .map(|f| factor_points(f, &config.weights))
                    .sum();
                assert_eq!(reconstructed, assessment.raw_points);
                assert_eq!(assessment.labels().len(), assessment.factors.len());
                assert!(
                    u32::from(assessment.score) <= reconstructed.max(1) * 13 / 10,
                    "score {} exceeds adjusted sum {reconstructed}",
                    assessment.score
                );
            }
        }
    }

    #[test]
    fn compute_and_explain_agree_on_a_point() {
        use safe_wander_geo_models::ZoneType;

        let home = Coordinate::new(45.0, 7.0);
        let zones = vec![Geofence {
            id: "home".to_string(),
            subject_id: "p1".to_string(),
            name: "Home".to_string(),
            zone_type: ZoneType::Safe,
            center: Some(home),
            radius_m: 100.0,
            active: true,
            auto_generated: false,
            parent_id: None,
        }];
        let away = Coordinate::new(45.01, 7.0);
        let context = RiskContext {
            hour: 21,
            ..RiskContext::default()
        };
        let config = RiskConfig::default();

        // (30 + 15) * 1.3 = 58
        assert_eq!(compute_risk(away, &zones, &context, &config), 58);
        assert_eq!(
            explain(away, &zones, &context, &config),
            vec!["Outside safe zone", "Night hours"]
        );
        assert_eq!(compute_risk(home, &zones, &context, &config), 15);
    }

    #[test]
    fn risk_level_bands() {
        assert_eq!(risk_level(0), RiskLevel::Low);
        assert_eq!(risk_level(19), RiskLevel::Low);
        assert_eq!(risk_level(20), RiskLevel::Medium);
        assert_eq!(risk_level(40), RiskLevel::High);
        assert_eq!(risk_level(59), RiskLevel::High);
        assert_eq!(risk_level(60), RiskLevel::Critical);
        assert_eq!(risk_level(100), RiskLevel::Critical);
    }

    #[test]
    fn oversized_weights_saturate_at_the_maximum() {
        let config = RiskConfig {
            weights: RiskWeights {
                outside_safe_zone: u32::MAX,
                near_danger_zone: u32::MAX,
                night_hours: u32::MAX,
                duration_outside: u32::MAX,
                no_caregiver_response: u32::MAX,
                gps_weak: u32::MAX,
                in_buffer_zone: u32::MAX,
                in_restricted_zone: u32::MAX,
            },
            ..RiskConfig::default()
        };
        let context = RiskContext {
            gps_signal: GpsSignal::Lost,
            time_outside_secs: i64::MAX,
            no_response_secs: i64::MAX,
            hour: 23,
            ..RiskContext::default()
        };

        assert_eq!(
            factor_points(&RiskFactor::GpsDegraded { signal: GpsSignal::Lost }, &config.weights),
            u32::MAX
        );
        let assessment = assess(&ZoneStatus::default(), &context, &config);
        assert_eq!(assessment.raw_points, u32::MAX);
        assert_eq!(assessment.score, MAX_SCORE);
    }
}
