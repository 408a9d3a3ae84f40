//! Scripted replays of location traces through the monitor.
//!
//! A scenario file names the subjects, their zones, optional learned
//! baselines, and a list of timed steps. Steps are applied in order against
//! an in-memory store and a manual clock, so a replay is deterministic.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, TimeDelta, Utc};
use safe_wander_behavior_models::BehavioralBaseline;
use safe_wander_config::SafeWanderConfig;
use safe_wander_geo::ZoneSet;
use safe_wander_geo_models::{Coordinate, Geofence, LocationSample, ZoneType};
use safe_wander_monitor::{
    BroadcastPublisher, ManualClock, MemoryStore, Monitor, MonitorError, MonitorStore, StoreError,
};
use safe_wander_monitor_models::{MonitorEvent, SubjectOutcome, SubjectRecord};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Errors from loading or replaying a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// A scripted replay.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Clock time of step offset zero.
    pub start: DateTime<Utc>,
    pub subjects: Vec<SubjectRecord>,
    #[serde(default)]
    pub zones: Vec<ScenarioZone>,
    /// Learned baselines to start from, keyed by subject ID.
    #[serde(default)]
    pub baselines: BTreeMap<String, BehavioralBaseline>,
    pub steps: Vec<ScenarioStep>,
}

/// A zone as written by a caregiver. Safe zones get their buffer when the
/// scenario is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioZone {
    pub subject_id: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    #[serde(default)]
    pub name: String,
    pub center: Coordinate,
    /// Falls back to the configured default for the zone type.
    #[serde(default)]
    pub radius_m: Option<f64>,
}

/// One timed action.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Seconds after [`Scenario::start`].
    pub at: i64,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ScenarioAction {
    /// A tracker fix, evaluated immediately.
    #[serde(rename_all = "camelCase")]
    Fix {
        subject_id: String,
        lat: f64,
        lng: f64,
        #[serde(default)]
        accuracy_m: Option<f64>,
        #[serde(default)]
        speed_mps: Option<f64>,
        #[serde(default)]
        heading_deg: Option<f64>,
    },
    /// A periodic pass over every subject.
    Pass,
    /// A caregiver acknowledges the subject's alerts.
    #[serde(rename_all = "camelCase")]
    Acknowledge { subject_id: String },
    /// A caregiver resolves the situation.
    #[serde(rename_all = "camelCase")]
    Resolve { subject_id: String },
    /// A caregiver reports the situation was raised in error.
    #[serde(rename_all = "camelCase")]
    FalseAlarm { subject_id: String },
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// scenario.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Zones for every subject, buffers included.
    #[must_use]
    pub fn build_zones(&self, config: &SafeWanderConfig) -> Vec<Geofence> {
        let mut sets: BTreeMap<&str, ZoneSet> = BTreeMap::new();
        for zone in &self.zones {
            sets.entry(zone.subject_id.as_str())
                .or_insert_with(|| ZoneSet::new(zone.subject_id.clone(), config.zones.clone()))
                .add_zone(zone.zone_type, zone.name.clone(), zone.center, zone.radius_m);
        }
        sets.into_values().flat_map(ZoneSet::into_zones).collect()
    }

    /// Zones for one subject.
    #[must_use]
    pub fn zones_for(&self, subject_id: &str, config: &SafeWanderConfig) -> Vec<Geofence> {
        self.build_zones(config)
            .into_iter()
            .filter(|z| z.subject_id == subject_id)
            .collect()
    }
}

/// What happened during one step.
#[derive(Debug)]
pub enum StepReport {
    Outcomes(Vec<SubjectOutcome>),
    Acknowledged { subject_id: String, alerts: usize },
    ResolutionRequested { subject_id: String },
    FalseAlarmReported { subject_id: String },
}

/// A loaded scenario ready to step through.
pub struct Replay {
    scenario: Scenario,
    monitor: Monitor,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    events: broadcast::Receiver<MonitorEvent>,
}

impl Replay {
    /// Loads the scenario's subjects, zones and baselines into a fresh
    /// in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if a baseline cannot be stored.
    pub async fn new(scenario: Scenario, config: SafeWanderConfig) -> Result<Self, ScenarioError> {
        let store = Arc::new(MemoryStore::new(config.baseline.clone()));
        for subject in &scenario.subjects {
            store.insert_subject(subject.clone()).await;
        }
        store.insert_zones(scenario.build_zones(&config)).await;
        for (subject_id, baseline) in &scenario.baselines {
            store.save_baseline(subject_id, baseline).await?;
        }

        let clock = Arc::new(ManualClock::new(scenario.start));
        let publisher = Arc::new(BroadcastPublisher::default());
        let events = publisher.subscribe();
        let monitor = Monitor::new(store.clone(), publisher, clock.clone(), config);

        log::info!(
            "Loaded scenario '{}': {} subject(s), {} step(s)",
            scenario.name,
            scenario.subjects.len(),
            scenario.steps.len()
        );

        Ok(Self {
            scenario,
            monitor,
            store,
            clock,
            events,
        })
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    #[must_use]
    pub fn steps(&self) -> &[ScenarioStep] {
        &self.scenario.steps
    }

    /// Clock time of a step.
    #[must_use]
    pub fn time_of(&self, step: &ScenarioStep) -> DateTime<Utc> {
        self.scenario.start + TimeDelta::seconds(step.at)
    }

    /// Applies one step at its scheduled time.
    ///
    /// # Errors
    ///
    /// Returns an error if the step names an unknown subject or the store
    /// fails.
    pub async fn apply(&self, step: &ScenarioStep) -> Result<StepReport, ScenarioError> {
        let now = self.time_of(step);
        self.clock.set(now);

        match &step.action {
            ScenarioAction::Fix {
                subject_id,
                lat,
                lng,
                accuracy_m,
                speed_mps,
                heading_deg,
            } => {
                let sample = LocationSample {
                    subject_id: subject_id.clone(),
                    position: Coordinate::new(*lat, *lng),
                    timestamp: now,
                    accuracy_m: *accuracy_m,
                    speed_mps: *speed_mps,
                    heading_deg: *heading_deg,
                };
                let outcome = self.monitor.ingest_location(sample).await?;
                Ok(StepReport::Outcomes(outcome.into_iter().collect()))
            }
            ScenarioAction::Pass => {
                let summary = self.monitor.run_pass().await?;
                Ok(StepReport::Outcomes(summary.outcomes))
            }
            ScenarioAction::Acknowledge { subject_id } => {
                let alerts = self.store.acknowledge_alerts(subject_id).await?;
                Ok(StepReport::Acknowledged {
                    subject_id: subject_id.clone(),
                    alerts,
                })
            }
            ScenarioAction::Resolve { subject_id } => {
                self.store.request_resolution(subject_id).await?;
                Ok(StepReport::ResolutionRequested {
                    subject_id: subject_id.clone(),
                })
            }
            ScenarioAction::FalseAlarm { subject_id } => {
                self.store.report_false_alarm(subject_id).await?;
                Ok(StepReport::FalseAlarmReported {
                    subject_id: subject_id.clone(),
                })
            }
        }
    }

    /// Events published since the last call.
    pub fn drain_events(&mut self) -> Vec<MonitorEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Event stream lagged, {skipped} event(s) dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        drained
    }
}
