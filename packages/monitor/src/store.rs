//! Persistence seam.
//!
//! The monitor never talks to a database directly. Everything it reads or
//! writes goes through [`MonitorStore`]; [`MemoryStore`] is the in-process
//! implementation used for simulation and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use safe_wander_behavior::BaselineRegistry;
use safe_wander_behavior_models::{BaselineConfig, BehavioralBaseline};
use safe_wander_emergency_models::{EmergencyRecord, EmergencyStatus};
use safe_wander_geo_models::{Geofence, LocationSample};
use safe_wander_monitor_models::{ActivityRecord, AlertRecord, SubjectRecord};
use tokio::sync::RwLock;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No subject with this ID exists.
    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    /// The backing store failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Data the monitor reads and writes.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Subjects currently being monitored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn active_subjects(&self) -> Result<Vec<SubjectRecord>, StoreError>;

    /// One subject, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>, StoreError>;

    /// Writes back a subject record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn save_subject(&self, subject: &SubjectRecord) -> Result<(), StoreError>;

    /// Up to `limit` most recent samples, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn recent_locations(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<LocationSample>, StoreError>;

    /// Records a new sample.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn append_location(&self, sample: LocationSample) -> Result<(), StoreError>;

    /// The subject's active zones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn active_zones(&self, subject_id: &str) -> Result<Vec<Geofence>, StoreError>;

    /// The subject's baseline, or the defaults when none is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn baseline(&self, subject_id: &str) -> Result<BehavioralBaseline, StoreError>;

    /// Stores an updated baseline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn save_baseline(
        &self,
        subject_id: &str,
        baseline: &BehavioralBaseline,
    ) -> Result<(), StoreError>;

    /// Records a new alert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn append_alert(&self, alert: AlertRecord) -> Result<(), StoreError>;

    /// Records a new activity log entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn append_activity(&self, activity: ActivityRecord) -> Result<(), StoreError>;

    /// The subject's ongoing emergency, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn active_emergency(
        &self,
        subject_id: &str,
    ) -> Result<Option<EmergencyRecord>, StoreError>;

    /// Inserts or replaces an emergency record by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    async fn save_emergency(&self, emergency: &EmergencyRecord) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    subjects: BTreeMap<String, SubjectRecord>,
    locations: BTreeMap<String, Vec<LocationSample>>,
    zones: BTreeMap<String, Vec<Geofence>>,
    baselines: BaselineRegistry,
    alerts: Vec<AlertRecord>,
    activities: Vec<ActivityRecord>,
    emergencies: Vec<EmergencyRecord>,
}

/// [`MonitorStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store whose baselines adapt with `config`.
    #[must_use]
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                baselines: BaselineRegistry::new(config),
                ..MemoryState::default()
            }),
        }
    }

    /// Adds or replaces a subject.
    pub async fn insert_subject(&self, subject: SubjectRecord) {
        let mut state = self.state.write().await;
        state.subjects.insert(subject.id.clone(), subject);
    }

    /// Replaces the zones of every subject mentioned in `zones`.
    pub async fn insert_zones(&self, zones: Vec<Geofence>) {
        let mut state = self.state.write().await;
        let mut by_subject: BTreeMap<String, Vec<Geofence>> = BTreeMap::new();
        for zone in zones {
            by_subject.entry(zone.subject_id.clone()).or_default().push(zone);
        }
        state.zones.extend(by_subject);
    }

    /// Marks every alert for the subject as acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubjectNotFound`] for an unknown subject.
    pub async fn acknowledge_alerts(&self, subject_id: &str) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let subject = state
            .subjects
            .get_mut(subject_id)
            .ok_or_else(|| StoreError::SubjectNotFound(subject_id.to_string()))?;
        subject.oldest_unacknowledged_alert = None;

        let mut count = 0;
        for alert in state
            .alerts
            .iter_mut()
            .filter(|a| a.subject_id == subject_id && !a.acknowledged)
        {
            alert.acknowledged = true;
            count += 1;
        }
        Ok(count)
    }

    /// Flags the subject as found by a caregiver. The next evaluation
    /// returns it to safe and closes any emergency as resolved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubjectNotFound`] for an unknown subject.
    pub async fn request_resolution(&self, subject_id: &str) -> Result<(), StoreError> {
        self.set_resolution(subject_id, EmergencyStatus::Resolved).await
    }

    /// Flags the situation as raised in error. The next evaluation returns
    /// the subject to safe and closes any emergency as a false alarm.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubjectNotFound`] for an unknown subject.
    pub async fn report_false_alarm(&self, subject_id: &str) -> Result<(), StoreError> {
        self.set_resolution(subject_id, EmergencyStatus::FalseAlarm).await
    }

    async fn set_resolution(
        &self,
        subject_id: &str,
        status: EmergencyStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let subject = state
            .subjects
            .get_mut(subject_id)
            .ok_or_else(|| StoreError::SubjectNotFound(subject_id.to_string()))?;
        subject.pending_resolution = Some(status);
        Ok(())
    }

    /// Restores the subject's baseline to the defaults.
    pub async fn reset_baseline(&self, subject_id: &str) {
        self.state.write().await.baselines.reset_baseline(subject_id);
    }

    /// Every alert, oldest first.
    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.state.read().await.alerts.clone()
    }

    /// Every activity entry, oldest first.
    pub async fn activities(&self) -> Vec<ActivityRecord> {
        self.state.read().await.activities.clone()
    }

    /// Every emergency, in activation order.
    pub async fn emergencies(&self) -> Vec<EmergencyRecord> {
        self.state.read().await.emergencies.clone()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn active_subjects(&self) -> Result<Vec<SubjectRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .subjects
            .values()
            .filter(|s| s.monitoring_active)
            .cloned()
            .collect())
    }

    async fn subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>, StoreError> {
        Ok(self.state.read().await.subjects.get(subject_id).cloned())
    }

    async fn save_subject(&self, subject: &SubjectRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.subjects.insert(subject.id.clone(), subject.clone());
        Ok(())
    }

    async fn recent_locations(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<LocationSample>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .locations
            .get(subject_id)
            .map(|samples| samples.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn append_location(&self, sample: LocationSample) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let samples = state.locations.entry(sample.subject_id.clone()).or_default();
        // Kept chronological even when fixes arrive out of order.
        let index = samples.partition_point(|s| s.timestamp <= sample.timestamp);
        samples.insert(index, sample);
        Ok(())
    }

    async fn active_zones(&self, subject_id: &str) -> Result<Vec<Geofence>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .zones
            .get(subject_id)
            .map(|zones| zones.iter().filter(|z| z.active).cloned().collect())
            .unwrap_or_default())
    }

    async fn baseline(&self, subject_id: &str) -> Result<BehavioralBaseline, StoreError> {
        Ok(self.state.read().await.baselines.get_baseline(subject_id))
    }

    async fn save_baseline(
        &self,
        subject_id: &str,
        baseline: &BehavioralBaseline,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.baselines.insert(subject_id, baseline.clone());
        Ok(())
    }

    async fn append_alert(&self, alert: AlertRecord) -> Result<(), StoreError> {
        self.state.write().await.alerts.push(alert);
        Ok(())
    }

    async fn append_activity(&self, activity: ActivityRecord) -> Result<(), StoreError> {
        self.state.write().await.activities.push(activity);
        Ok(())
    }

    async fn active_emergency(
        &self,
        subject_id: &str,
    ) -> Result<Option<EmergencyRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .emergencies
            .iter()
            .find(|e| e.subject_id == subject_id && e.is_active())
            .cloned())
    }

    async fn save_emergency(&self, emergency: &EmergencyRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.emergencies.iter_mut().find(|e| e.id == emergency.id) {
            Some(existing) => *existing = emergency.clone(),
            None => state.emergencies.push(emergency.clone()),
        }
        Ok(())
    }
}
