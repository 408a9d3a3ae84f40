#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the safe-wander pipeline.
//!
//! Replays scripted location traces through the monitor, scores a single
//! point against a scenario's zones, estimates search radii, and prints
//! the effective configuration.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use safe_wander_config::SafeWanderConfig;
use safe_wander_geo::evaluate_zones;
use safe_wander_geo_models::Coordinate;
use safe_wander_monitor_models::{MonitorEvent, SubjectOutcome};
use safe_wander_risk::{RiskContext, assess, risk_level};
use safe_wander_risk_models::GpsSignal;

mod scenario;

use scenario::{Replay, Scenario, StepReport};

// ---------------------------------------------------------------------------
// CLI definitions
// ---------------------------------------------------------------------------

/// Behavioral risk monitoring for people living with dementia.
#[derive(Parser)]
#[command(name = "safe_wander")]
#[command(about = "Behavioral risk monitoring for people living with dementia")]
struct Cli {
    /// TOML file layered over the built-in defaults. Falls back to
    /// `SAFE_WANDER_CONFIG`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file through the monitor.
    Simulate {
        /// Scenario JSON file.
        scenario: PathBuf,

        /// Print published events as JSON lines instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Score one position against a subject's zones.
    Assess {
        /// Scenario JSON file providing the zones.
        #[arg(long)]
        scenario: PathBuf,

        /// Subject whose zones to use.
        #[arg(long)]
        subject: String,

        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Local hour, 0-23.
        #[arg(long, default_value_t = 12)]
        hour: u32,

        /// GPS signal quality ("good", "weak", "lost").
        #[arg(long, default_value = "good")]
        gps: String,

        /// Minutes since leaving the last safe zone.
        #[arg(long, default_value_t = 0)]
        minutes_outside: i64,

        /// Minutes the oldest alert has gone unacknowledged.
        #[arg(long, default_value_t = 0)]
        minutes_unacknowledged: i64,

        /// Treat the movement as anomalous.
        #[arg(long)]
        anomaly: bool,

        /// The hour is one of the subject's usual activity hours.
        #[arg(long)]
        usual_time: bool,

        /// Current escalation state, to show the transition this score
        /// would cause.
        #[arg(long, default_value = "safe")]
        state: String,

        /// Minutes spent in the current state.
        #[arg(long, default_value_t = 0)]
        minutes_in_state: i64,
    },

    /// Estimate an emergency search radius.
    Radius {
        /// Average walking speed in m/s.
        #[arg(long, default_value_t = 0.8)]
        speed: f64,

        /// Minutes since the subject went missing.
        #[arg(long)]
        minutes: f64,

        /// Mobility level ("high", "medium", "low", "wheelchair").
        #[arg(long, default_value = "medium")]
        mobility: String,

        /// Radius set by a caregiver, used as-is.
        #[arg(long = "override")]
        override_m: Option<f64>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let config = safe_wander_config::load_with_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { scenario, json } => cmd_simulate(&scenario, config, json).await,
        Commands::Assess {
            scenario,
            subject,
            lat,
            lng,
            hour,
            gps,
            minutes_outside,
            minutes_unacknowledged,
            anomaly,
            usual_time,
            state,
            minutes_in_state,
        } => {
            let context = risk_context(
                &gps,
                minutes_outside,
                minutes_unacknowledged,
                hour,
                anomaly,
                usual_time,
            )?;
            cmd_assess(
                &scenario,
                &subject,
                Coordinate::new(lat, lng),
                &context,
                &state,
                minutes_in_state,
                &config,
            )
        }
        Commands::Radius {
            speed,
            minutes,
            mobility,
            override_m,
        } => {
            cmd_radius(speed, minutes, &mobility, override_m, &config);
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_simulate(
    path: &Path,
    config: SafeWanderConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(path)?;
    if !json {
        println!("=== {} ===", scenario.name);
        println!();
    }

    let mut replay = Replay::new(scenario, config).await?;
    let steps = replay.steps().to_vec();

    for step in &steps {
        let time = replay.time_of(step).format("%H:%M:%S").to_string();
        let report = replay.apply(step).await?;
        let events = replay.drain_events();

        if json {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
            continue;
        }

        match report {
            StepReport::Outcomes(outcomes) => {
                for outcome in &outcomes {
                    print_outcome(&time, outcome);
                }
            }
            StepReport::Acknowledged { subject_id, alerts } => {
                println!("{time}  {subject_id}: caregiver acknowledged {alerts} alert(s)");
            }
            StepReport::ResolutionRequested { subject_id } => {
                println!("{time}  {subject_id}: caregiver resolved the situation");
            }
            StepReport::FalseAlarmReported { subject_id } => {
                println!("{time}  {subject_id}: caregiver reported a false alarm");
            }
        }
        for event in &events {
            print_event(event);
        }
    }

    if json {
        return Ok(());
    }

    let alerts = replay.store().alerts().await;
    println!();
    println!("Alerts:   {}", alerts.len());
    for alert in &alerts {
        println!(
            "  {} [{}] {}{}",
            alert.timestamp.format("%H:%M:%S"),
            alert.level,
            alert.description,
            if alert.acknowledged { " (ack)" } else { "" }
        );
        for detail in &alert.details {
            println!("      {detail}");
        }
    }

    let emergencies = replay.store().emergencies().await;
    println!("Emergencies: {}", emergencies.len());
    for emergency in &emergencies {
        println!(
            "  {} {} radius {:.0}m",
            emergency.id, emergency.status, emergency.search_radius_m
        );
        for entry in &emergency.timeline {
            println!("    {} {}", entry.time.format("%H:%M:%S"), entry.event);
        }
    }

    Ok(())
}

fn print_outcome(time: &str, outcome: &SubjectOutcome) {
    let state = if outcome.previous_state == outcome.state {
        outcome.state.to_string()
    } else {
        format!("{} -> {}", outcome.previous_state, outcome.state)
    };

    println!(
        "{time}  {}: risk {:>3} ({:<8}) {:<22} zone {:<12} gps {}",
        outcome.subject_id,
        outcome.risk_score,
        outcome.risk_level.as_ref(),
        state,
        outcome.zone.as_deref().unwrap_or("-"),
        outcome.gps_signal,
    );
    if !outcome.factors.is_empty() {
        println!("          factors: {}", outcome.factors.join(", "));
    }
    for anomaly in &outcome.anomalies {
        println!("          unusual: {anomaly}");
    }
    if let Some(message) = &outcome.transition_message {
        println!("          {message}");
    }
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::SafeZoneExited { subject_id, .. } => {
            println!("          {subject_id} left their safe zones");
        }
        MonitorEvent::SafeZoneEntered {
            subject_id,
            trip_secs,
            ..
        } => {
            println!(
                "          {subject_id} returned after {} min",
                trip_secs / 60
            );
        }
        MonitorEvent::EmergencyActivated {
            search_radius_m, ..
        } => {
            println!("          EMERGENCY: search radius {search_radius_m:.0}m");
        }
        MonitorEvent::EmergencyResolved { status, .. } => {
            println!("          emergency {status}");
        }
        MonitorEvent::RiskUpdated { .. }
        | MonitorEvent::StateChanged { .. }
        | MonitorEvent::AlertRaised(_) => {}
    }
}

fn risk_context(
    gps: &str,
    minutes_outside: i64,
    minutes_unacknowledged: i64,
    hour: u32,
    anomaly: bool,
    usual_time: bool,
) -> Result<RiskContext, String> {
    Ok(RiskContext {
        gps_signal: gps
            .parse::<GpsSignal>()
            .map_err(|_| format!("Unknown GPS signal '{gps}'"))?,
        time_outside_secs: minutes_outside.saturating_mul(60),
        no_response_secs: minutes_unacknowledged.saturating_mul(60),
        hour,
        anomaly,
        usual_time,
    })
}

fn cmd_assess(
    path: &Path,
    subject_id: &str,
    point: Coordinate,
    context: &RiskContext,
    state: &str,
    minutes_in_state: i64,
    config: &SafeWanderConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(path)?;
    let zones = scenario.zones_for(subject_id, config);
    if zones.is_empty() {
        log::warn!("Subject {subject_id} has no zones in {}", path.display());
    }

    let status = evaluate_zones(point, &zones);
    let assessment = assess(&status, context, &config.risk);

    println!("Position:   {:.6}, {:.6}", point.lat, point.lng);
    println!(
        "Zone:       {}",
        status.current_zone_name.as_deref().unwrap_or("outside all zones")
    );
    if status.nearest_danger_distance_m.is_finite() {
        println!("Danger:     {:.0}m away", status.nearest_danger_distance_m);
    }
    println!(
        "Risk:       {} ({})",
        assessment.score,
        risk_level(assessment.score)
    );
    println!("Raw points: {}", assessment.raw_points);
    if assessment.usual_time_reduction {
        println!("            usual hour, scaled by 0.7");
    }
    if assessment.night_exit_escalation {
        println!("            outside at night, scaled by 1.3");
    }
    for label in assessment.labels() {
        println!("  - {label}");
    }

    let transition = safe_wander_escalation::transition_named(
        state,
        assessment.score,
        TimeDelta::try_minutes(minutes_in_state.max(0)).unwrap_or(TimeDelta::MAX),
        status.is_near_danger(config.risk.danger_proximity_m),
        false,
        &config.escalation,
    );
    match &transition.message {
        Some(message) => println!(
            "Escalation: {} -> {}: {message}",
            transition.from, transition.state
        ),
        None => println!("Escalation: stays {}", transition.from),
    }

    Ok(())
}

fn cmd_radius(
    speed: f64,
    minutes: f64,
    mobility: &str,
    override_m: Option<f64>,
    config: &SafeWanderConfig,
) {
    let radius = safe_wander_emergency::estimate_search_radius_named(
        speed,
        minutes * 60.0,
        mobility,
        override_m,
        &config.search,
    );
    println!("Search radius: {radius:.0}m");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_minute_counts_saturate() {
        let context = risk_context("weak", i64::MAX, i64::MIN, 3, false, false).unwrap();
        assert_eq!(context.time_outside_secs, i64::MAX);
        assert_eq!(context.no_response_secs, i64::MIN);
        assert_eq!(context.gps_signal, GpsSignal::Weak);
    }

    #[test]
    fn unknown_gps_signal_is_rejected() {
        let result = risk_context("static", 0, 0, 12, false, false);
        assert_eq!(result, Err("Unknown GPS signal 'static'".to_string()));
    }

    #[test]
    fn assess_accepts_an_escalation_state() {
        let cli = Cli::try_parse_from([
            "safe_wander",
            "assess",
            "--scenario",
            "scenarios/evening_wander.json",
            "--subject",
            "margaret",
            "--lat",
            "52.3792",
            "--lng",
            "4.8952",
            "--state",
            "urgent",
            "--minutes-in-state",
            "11",
        ])
        .unwrap();
        let Commands::Assess {
            state,
            minutes_in_state,
            ..
        } = cli.command
        else {
            panic!("expected assess");
        };
        assert_eq!(state, "urgent");
        assert_eq!(minutes_in_state, 11);
    }
}
