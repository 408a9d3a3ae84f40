//! The per-subject pipeline and the periodic loop around it.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Timelike as _, Utc};
use safe_wander_behavior::{
    assess_wandering,
    baseline::{add_active_hour, is_usual_time, update},
    describe_anomalies, detect_anomaly,
};
use safe_wander_behavior_models::BehavioralBaseline;
use safe_wander_config::SafeWanderConfig;
use safe_wander_emergency::{activate, estimate_search_radius, resolve, update_search_radius};
use safe_wander_emergency_models::{EmergencyRecord, EmergencyStatus};
use safe_wander_escalation::{is_alert_worthy, transition_at};
use safe_wander_escalation_models::EscalationState;
use safe_wander_geo::{calculate_speed, consecutive_outside, evaluate_zones, moving_average};
use safe_wander_geo_models::{Coordinate, Geofence, GpsNoiseConfig, LocationSample, ZoneType};
use safe_wander_monitor_models::{
    ActivityKind, ActivityRecord, AlertRecord, GEOFENCE_ALERT_TYPE, MonitorEvent, PassSummary,
    SubjectFailure, SubjectOutcome, SubjectRecord,
};
use safe_wander_risk::{RiskContext, assess, risk_level};
use safe_wander_risk_models::GpsSignal;
use tokio::{
    sync::{Mutex, watch},
    time::MissedTickBehavior,
};
use uuid::Uuid;

use crate::{Clock, EventPublisher, MonitorError, MonitorStore};

/// Runs subjects through the monitoring pipeline.
pub struct Monitor {
    store: Arc<dyn MonitorStore>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    config: SafeWanderConfig,
    locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Creates a monitor over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn MonitorStore>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: SafeWanderConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            config,
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SafeWanderConfig {
        &self.config
    }

    /// Evaluates one subject.
    ///
    /// Returns `Ok(None)` when the subject has no location history yet.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::UnknownSubject`] if the subject does not exist
    /// * [`MonitorError::Store`] if reading or writing fails
    /// * [`MonitorError::Emergency`] if an emergency record rejects a change
    pub async fn process_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<SubjectOutcome>, MonitorError> {
        let lock = self.subject_lock(subject_id).await;
        let _guard = lock.lock().await;

        let subject = self.load_subject(subject_id).await?;
        self.evaluate(subject).await
    }

    /// Records a new sample and immediately evaluates its subject.
    ///
    /// # Errors
    ///
    /// See [`Monitor::process_subject`].
    pub async fn ingest_location(
        &self,
        sample: LocationSample,
    ) -> Result<Option<SubjectOutcome>, MonitorError> {
        let lock = self.subject_lock(&sample.subject_id).await;
        let _guard = lock.lock().await;

        let subject = self.load_subject(&sample.subject_id).await?;
        self.store.append_location(sample).await?;
        self.evaluate(subject).await
    }

    /// Evaluates every active subject once, in order.
    ///
    /// A failure for one subject is logged and recorded in the summary;
    /// the remaining subjects are still processed. Per-subject locks not
    /// in use are released at the end of the pass.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Store`] only if the subject list itself
    /// cannot be loaded.
    pub async fn run_pass(&self) -> Result<PassSummary, MonitorError> {
        let started = std::time::Instant::now();
        let subjects = self.store.active_subjects().await?;
        let mut summary = PassSummary::default();

        for subject in &subjects {
            match self.process_subject(&subject.id).await {
                Ok(Some(outcome)) => {
                    summary.processed += 1;
                    if outcome.previous_state != outcome.state {
                        summary.transitions += 1;
                    }
                    summary.outcomes.push(outcome);
                }
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    log::error!("Failed to process subject {}: {e}", subject.id);
                    summary.failed.push(SubjectFailure {
                        subject_id: subject.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.release_idle_locks().await;

        log::info!(
            "Monitor pass over {} subject(s): {} processed, {} skipped, {} failed, {} transition(s) in {:.2?}",
            subjects.len(),
            summary.processed,
            summary.skipped,
            summary.failed.len(),
            summary.transitions,
            started.elapsed()
        );

        Ok(summary)
    }

    /// Runs a pass every `monitor.interval_secs` until `shutdown` turns
    /// `true` or its sender is dropped.
    ///
    /// A pass always runs to completion before the next tick or the
    /// shutdown signal is observed.
    pub async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.monitor.interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Monitoring loop started with {}s interval", period.as_secs());

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_pass().await {
                        log::error!("Monitor pass failed: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::info!("Monitoring loop stopped");
    }

    async fn subject_lock(&self, subject_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(subject_id.to_string()).or_default())
    }

    /// Drops per-subject locks nobody is holding or waiting on. They are
    /// recreated on demand, so the map stays as small as the number of
    /// subjects in flight.
    async fn release_idle_locks(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    async fn load_subject(&self, subject_id: &str) -> Result<SubjectRecord, MonitorError> {
        self.store
            .subject(subject_id)
            .await?
            .ok_or_else(|| MonitorError::UnknownSubject(subject_id.to_string()))
    }

    #[allow(clippy::too_many_lines)]
    async fn evaluate(
        &self,
        mut subject: SubjectRecord,
    ) -> Result<Option<SubjectOutcome>, MonitorError> {
        let config = &self.config;
        let now = self.clock.now();

        let mut track = self
            .store
            .recent_locations(&subject.id, config.monitor.history_limit)
            .await?;
        track.reverse();
        let Some(latest) = track.last().cloned() else {
            log::debug!("No location history for subject {}, skipping", subject.id);
            return Ok(None);
        };

        let zones = self.store.active_zones(&subject.id).await?;
        let mut baseline = self.store.baseline(&subject.id).await?;
        let emergency = self.store.active_emergency(&subject.id).await?;

        let position =
            moving_average(&track, config.gps.smoothing_window).unwrap_or(latest.position);
        let status = evaluate_zones(position, &zones);

        let time_outside_secs = subject
            .last_safe_zone_exit
            .map_or(0, |exit| seconds_between(exit, now));
        let speed = current_speed(&track, &baseline);
        #[allow(clippy::cast_precision_loss)]
        let trip_duration = time_outside_secs as f64;
        let anomaly = detect_anomaly(speed, trip_duration, &baseline, &config.anomaly);
        let wandering = assess_wandering(&track, trip_duration, &baseline, &config.anomaly);
        let anomalies = describe_anomalies(
            speed,
            trip_duration,
            &baseline,
            wandering.direction_changes,
            &config.anomaly,
        );

        let gps_signal = subject
            .device_gps_signal
            .max(derived_signal(&latest, now, &config.gps));
        let hour = self.local_hour(now);
        let context = RiskContext {
            gps_signal,
            time_outside_secs,
            no_response_secs: subject
                .oldest_unacknowledged_alert
                .map_or(0, |raised| seconds_between(raised, now)),
            hour,
            anomaly,
            usual_time: is_usual_time(&baseline, hour),
        };

        let assessment = assess(&status, &context, &config.risk);
        let near_danger = status.is_near_danger(config.risk.danger_proximity_m);
        let factors = assessment.labels();
        if !factors.is_empty() {
            log::debug!(
                "Risk {} for subject {}: {}",
                assessment.score,
                subject.id,
                factors.join(", ")
            );
        }

        // Escalation
        let previous_state = subject.state;
        let resolution = subject.pending_resolution.take();
        let manual_resolve = resolution.is_some();
        if manual_resolve {
            subject.oldest_unacknowledged_alert = None;
        }
        let transition = transition_at(
            previous_state,
            assessment.score,
            subject.state_entered_at.unwrap_or(now),
            now,
            near_danger,
            manual_resolve,
            &config.escalation,
        );

        let mut alert = None;
        if let Some(message) = &transition.message {
            subject.state = transition.state;
            subject.state_entered_at = Some(now);

            if is_alert_worthy(previous_state, transition.state) {
                alert = Some(build_alert(
                    &mut subject,
                    message,
                    &anomalies,
                    position,
                    manual_resolve,
                    now,
                ));
            }
        } else if subject.state_entered_at.is_none() {
            subject.state_entered_at = Some(now);
        }

        // Safe-zone exit tracking
        let missing_since = subject.last_safe_zone_exit;
        let mut returned_from = None;
        let mut left_safe_zones = false;
        if status.in_safe {
            returned_from = subject.last_safe_zone_exit.take();
        } else if subject.last_safe_zone_exit.is_none()
            && exit_confirmed(&track, &zones, config.gps.consecutive_outside)
        {
            subject.last_safe_zone_exit = Some(now);
            left_safe_zones = true;
        }

        // Persisted before its side effects.
        subject.risk_score = assessment.score;
        self.store.save_subject(&subject).await?;

        if let Some(message) = &transition.message
            && transition.state != previous_state
        {
            log::info!(
                "Subject {} escalation {previous_state} -> {}: {message}",
                subject.id,
                transition.state
            );
            self.store
                .append_activity(ActivityRecord {
                    subject_id: subject.id.clone(),
                    kind: ActivityKind::StateChange,
                    description: message.clone(),
                    timestamp: now,
                })
                .await?;
            self.publisher.publish(MonitorEvent::StateChanged {
                subject_id: subject.id.clone(),
                from: previous_state,
                to: transition.state,
                message: message.clone(),
                timestamp: now,
            });
        }

        let alert_raised = alert.is_some();
        if let Some(alert) = alert {
            self.store.append_alert(alert.clone()).await?;
            self.publisher.publish(MonitorEvent::AlertRaised(alert));
        }

        let emergency_episode = previous_state == EscalationState::Emergency
            || subject.state == EscalationState::Emergency
            || emergency.is_some();

        let search_radius_m = self
            .sync_emergency(
                &subject,
                emergency,
                latest.position,
                missing_since,
                resolution.unwrap_or(EmergencyStatus::Resolved),
                &baseline,
                now,
            )
            .await?;

        if let Some(exit) = returned_from {
            let trip_secs = seconds_between(exit, now);
            if emergency_episode {
                log::debug!(
                    "Not learning from trip of subject {}: emergency episode",
                    subject.id
                );
            } else {
                let trip_speed = trip_speed(&track, exit).unwrap_or(speed);
                #[allow(clippy::cast_precision_loss)]
                update(
                    &mut baseline,
                    trip_speed,
                    trip_secs as f64,
                    false,
                    &config.baseline,
                );
                add_active_hour(
                    &mut baseline,
                    self.local_hour(exit),
                    config.baseline.max_active_hours,
                );
                self.store.save_baseline(&subject.id, &baseline).await?;
            }

            self.store
                .append_activity(ActivityRecord {
                    subject_id: subject.id.clone(),
                    kind: ActivityKind::ZoneEntry,
                    description: format!(
                        "Returned to {} after {} minutes",
                        status.current_zone_name.as_deref().unwrap_or("safe zone"),
                        trip_secs / 60
                    ),
                    timestamp: now,
                })
                .await?;
            self.publisher.publish(MonitorEvent::SafeZoneEntered {
                subject_id: subject.id.clone(),
                trip_secs,
                timestamp: now,
            });
        } else if left_safe_zones {
            log::info!("Subject {} left their safe zones", subject.id);
            self.store
                .append_activity(ActivityRecord {
                    subject_id: subject.id.clone(),
                    kind: ActivityKind::ZoneExit,
                    description: "Left safe zone".to_string(),
                    timestamp: now,
                })
                .await?;
            self.publisher.publish(MonitorEvent::SafeZoneExited {
                subject_id: subject.id.clone(),
                timestamp: now,
            });
        }

        self.publisher.publish(MonitorEvent::RiskUpdated {
            subject_id: subject.id.clone(),
            score: assessment.score,
            level: risk_level(assessment.score),
            factors: factors.clone(),
            zone: status.current_zone_name.clone(),
            position,
            timestamp: now,
        });

        Ok(Some(SubjectOutcome {
            subject_id: subject.id,
            risk_score: assessment.score,
            risk_level: risk_level(assessment.score),
            factors,
            previous_state,
            state: subject.state,
            transition_message: transition.message,
            position,
            zone: status.current_zone_name,
            gps_signal,
            anomaly,
            anomalies,
            wandering_score: wandering.score,
            alert_raised,
            search_radius_m,
        }))
    }

    /// Opens, updates, or closes the subject's emergency to match its
    /// state. Returns the search radius while one is active.
    ///
    /// With no recorded safe-zone exit the time missing is unknown and
    /// the configured default radius is used.
    #[allow(clippy::too_many_arguments)]
    async fn sync_emergency(
        &self,
        subject: &SubjectRecord,
        emergency: Option<EmergencyRecord>,
        last_known: Coordinate,
        missing_since: Option<DateTime<Utc>>,
        resolution: EmergencyStatus,
        baseline: &BehavioralBaseline,
        now: DateTime<Utc>,
    ) -> Result<Option<f64>, MonitorError> {
        let in_emergency = subject.state == EscalationState::Emergency;
        #[allow(clippy::cast_precision_loss)]
        let estimate = || {
            missing_since.map_or(self.config.search.default_radius_m, |since| {
                estimate_search_radius(
                    baseline.avg_speed_mps,
                    seconds_between(since, now) as f64,
                    subject.mobility,
                    None,
                    &self.config.search,
                )
            })
        };

        match (in_emergency, emergency) {
            (true, None) => {
                let record = activate(
                    subject.id.clone(),
                    Some(last_known),
                    estimate(),
                    missing_since.unwrap_or(now),
                    now,
                );
                self.store.save_emergency(&record).await?;
                self.store
                    .append_activity(ActivityRecord {
                        subject_id: subject.id.clone(),
                        kind: ActivityKind::Emergency,
                        description: "Emergency mode activated".to_string(),
                        timestamp: now,
                    })
                    .await?;
                self.publisher.publish(MonitorEvent::EmergencyActivated {
                    subject_id: subject.id.clone(),
                    emergency_id: record.id,
                    search_radius_m: record.search_radius_m,
                });
                Ok(Some(record.search_radius_m))
            }
            (true, Some(mut record)) => {
                let radius = estimate();
                if (radius - record.search_radius_m).abs() >= 1.0 {
                    update_search_radius(&mut record, radius, now)?;
                    self.store.save_emergency(&record).await?;
                }
                Ok(Some(record.search_radius_m))
            }
            (false, Some(mut record)) => {
                resolve(&mut record, resolution, now)?;
                self.store.save_emergency(&record).await?;
                self.store
                    .append_activity(ActivityRecord {
                        subject_id: subject.id.clone(),
                        kind: ActivityKind::Emergency,
                        description: format!("Emergency {}", record.status),
                        timestamp: now,
                    })
                    .await?;
                self.publisher.publish(MonitorEvent::EmergencyResolved {
                    subject_id: subject.id.clone(),
                    emergency_id: record.id,
                    status: record.status,
                });
                Ok(None)
            }
            (false, None) => Ok(None),
        }
    }

    fn local_hour(&self, time: DateTime<Utc>) -> u32 {
        (time + TimeDelta::hours(i64::from(self.config.monitor.utc_offset_hours))).hour()
    }
}

/// Caregiver alert for a transition into `subject.state`. Marks the
/// subject as awaiting a response unless the alert is already
/// acknowledged.
fn build_alert(
    subject: &mut SubjectRecord,
    message: &str,
    anomalies: &[String],
    position: Coordinate,
    acknowledged: bool,
    now: DateTime<Utc>,
) -> AlertRecord {
    if !acknowledged && subject.oldest_unacknowledged_alert.is_none() {
        subject.oldest_unacknowledged_alert = Some(now);
    }

    AlertRecord {
        id: Uuid::new_v4(),
        subject_id: subject.id.clone(),
        alert_type: GEOFENCE_ALERT_TYPE.to_string(),
        level: subject.state.alert_level(),
        message: message.to_string(),
        description: format!(
            "State changed to {}",
            subject.state.as_ref().to_uppercase()
        ),
        details: anomalies.to_vec(),
        location: Some(position),
        timestamp: now,
        acknowledged,
    }
}

/// Whole seconds from `earlier` to `later`, never negative. A partial
/// second counts as a full one.
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let millis = (later - earlier).num_milliseconds().max(0);
    millis / 1000 + i64::from(millis % 1000 != 0)
}

/// Reported speed of the latest fix, else the speed between the two most
/// recent fixes, else the baseline average.
fn current_speed(track: &[LocationSample], baseline: &BehavioralBaseline) -> f64 {
    let reported = track
        .last()
        .and_then(|s| s.speed_mps)
        .filter(|speed| speed.is_finite() && *speed >= 0.0);

    reported.unwrap_or_else(|| match track {
        [.., previous, latest] => calculate_speed(previous, latest),
        _ => baseline.avg_speed_mps,
    })
}

/// Mean speed between consecutive fixes recorded since `exit`.
fn trip_speed(track: &[LocationSample], exit: DateTime<Utc>) -> Option<f64> {
    let speeds: Vec<f64> = track
        .windows(2)
        .filter(|pair| pair[0].timestamp >= exit)
        .map(|pair| calculate_speed(&pair[0], &pair[1]))
        .collect();

    if speeds.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = speeds.iter().sum::<f64>() / speeds.len() as f64;
    Some(mean)
}

/// Signal quality implied by the latest fix alone.
fn derived_signal(latest: &LocationSample, now: DateTime<Utc>, gps: &GpsNoiseConfig) -> GpsSignal {
    if seconds_between(latest.timestamp, now) > gps.lost_after_secs {
        GpsSignal::Lost
    } else if latest.accuracy_m.is_some_and(|a| a > gps.weak_accuracy_m) {
        GpsSignal::Weak
    } else {
        GpsSignal::Good
    }
}

/// Whether the last `n` raw fixes lie outside every active safe zone.
fn exit_confirmed(track: &[LocationSample], zones: &[Geofence], n: usize) -> bool {
    track.len() >= n
        && zones
            .iter()
            .filter(|z| z.active && z.zone_type == ZoneType::Safe)
            .all(|z| consecutive_outside(track, z, n))
}
