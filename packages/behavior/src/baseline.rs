//! Adaptive behavioral baseline.
//!
//! Baselines adapt by exponential moving average so a handful of unusual
//! trips cannot redefine "normal". Updates are skipped entirely while the
//! subject is in an emergency, since those trips are exactly the abnormal
//! episodes the profile must not learn from.

use std::collections::BTreeMap;

use safe_wander_behavior_models::{BaselineConfig, BehavioralBaseline};

/// Folds one completed trip into `baseline`.
///
/// No-op when `is_emergency` is set. Returns whether the baseline changed.
pub fn update(
    baseline: &mut BehavioralBaseline,
    speed_mps: f64,
    duration_secs: f64,
    is_emergency: bool,
    config: &BaselineConfig,
) -> bool {
    if is_emergency {
        return false;
    }

    let alpha = config.smoothing_alpha;
    let old_speed = baseline.avg_speed_mps;
    let old_duration = baseline.avg_duration_secs;

    baseline.avg_speed_mps = alpha.mul_add(speed_mps, (1.0 - alpha) * old_speed);
    baseline.avg_duration_secs = alpha.mul_add(duration_secs, (1.0 - alpha) * old_duration);

    baseline.std_speed_mps =
        alpha.mul_add((speed_mps - old_speed).abs(), (1.0 - alpha) * baseline.std_speed_mps);
    baseline.std_duration_secs = alpha.mul_add(
        (duration_secs - old_duration).abs(),
        (1.0 - alpha) * baseline.std_duration_secs,
    );

    baseline.sample_count += 1;
    true
}

/// Restores the defaults and zeroes the sample count.
pub fn reset(baseline: &mut BehavioralBaseline) {
    *baseline = BehavioralBaseline::default();
}

/// Remembers `hour` as an active hour.
///
/// Hours already present are left where they are; new hours are appended
/// and only the most recent `max_hours` entries are kept. Out-of-range
/// hours are ignored.
pub fn add_active_hour(baseline: &mut BehavioralBaseline, hour: u32, max_hours: usize) {
    if hour > 23 {
        log::warn!("Ignoring invalid active hour {hour}");
        return;
    }
    if baseline.common_active_hours.contains(&hour) {
        return;
    }

    baseline.common_active_hours.push(hour);
    let excess = baseline.common_active_hours.len().saturating_sub(max_hours);
    baseline.common_active_hours.drain(..excess);
}

/// Whether `hour` is one of the subject's usual activity hours.
#[must_use]
pub fn is_usual_time(baseline: &BehavioralBaseline, hour: u32) -> bool {
    baseline.common_active_hours.contains(&hour)
}

/// In-memory baselines keyed by subject ID.
///
/// Subjects without a stored baseline read as the defaults; the entry is
/// created on first update.
#[derive(Debug, Clone, Default)]
pub struct BaselineRegistry {
    config: BaselineConfig,
    baselines: BTreeMap<String, BehavioralBaseline>,
}

impl BaselineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new(config: BaselineConfig) -> Self {
        Self {
            config,
            baselines: BTreeMap::new(),
        }
    }

    /// Returns the subject's baseline, or the defaults if none exists.
    #[must_use]
    pub fn get_baseline(&self, subject_id: &str) -> BehavioralBaseline {
        self.baselines.get(subject_id).cloned().unwrap_or_default()
    }

    /// Folds one trip into the subject's baseline. No-op during an
    /// emergency.
    pub fn update_baseline(
        &mut self,
        subject_id: &str,
        speed_mps: f64,
        duration_secs: f64,
        is_emergency: bool,
    ) {
        if is_emergency {
            log::debug!("Skipping baseline update for {subject_id}: emergency active");
            return;
        }
        let baseline = self.baselines.entry(subject_id.to_string()).or_default();
        update(baseline, speed_mps, duration_secs, false, &self.config);
    }

    /// Resets the subject's baseline to the defaults.
    pub fn reset_baseline(&mut self, subject_id: &str) {
        if let Some(baseline) = self.baselines.get_mut(subject_id) {
            reset(baseline);
        }
    }

    /// Stores a baseline loaded from elsewhere.
    pub fn insert(&mut self, subject_id: impl Into<String>, baseline: BehavioralBaseline) {
        self.baselines.insert(subject_id.into(), baseline);
    }
}
