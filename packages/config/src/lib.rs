#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monitoring configuration.
//!
//! The defaults in `config/default.toml` are baked into the binary at
//! compile time via [`include_str!`]. A user file can be layered on top:
//! tables are merged key by key, so a file containing only
//! `[risk] night_start_hour = 21` changes that one value.

use std::path::{Path, PathBuf};

use safe_wander_behavior_models::{AnomalyConfig, BaselineConfig};
use safe_wander_emergency_models::SearchConfig;
use safe_wander_escalation_models::EscalationThresholds;
use safe_wander_geo_models::{GpsNoiseConfig, ZoneDefaults};
use safe_wander_risk_models::RiskConfig;
use serde::{Deserialize, Serialize};

/// Embedded default configuration.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Environment variable naming a user configuration file.
pub const CONFIG_ENV_VAR: &str = "SAFE_WANDER_CONFIG";

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The user file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has wrongly typed values.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but make no sense together.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Orchestrator loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between periodic passes.
    pub interval_secs: u64,
    /// Recent location samples loaded per subject per pass.
    pub history_limit: usize,
    /// Offset from UTC, in whole hours, used for night and usual-hour
    /// checks.
    pub utc_offset_hours: i32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            history_limit: 10,
            utc_offset_hours: 0,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeWanderConfig {
    pub monitor: MonitorSettings,
    pub zones: ZoneDefaults,
    pub gps: GpsNoiseConfig,
    pub baseline: BaselineConfig,
    pub anomaly: AnomalyConfig,
    pub risk: RiskConfig,
    pub escalation: EscalationThresholds,
    pub search: SearchConfig,
}

impl SafeWanderConfig {
    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.monitor.interval_secs == 0 {
            return invalid("monitor.interval_secs must be at least 1".to_string());
        }
        if self.monitor.history_limit == 0 {
            return invalid("monitor.history_limit must be at least 1".to_string());
        }
        if !(-12..=14).contains(&self.monitor.utc_offset_hours) {
            return invalid(format!(
                "monitor.utc_offset_hours {} is out of range",
                self.monitor.utc_offset_hours
            ));
        }
        if self.gps.smoothing_window == 0 || self.gps.consecutive_outside == 0 {
            return invalid(
                "gps.smoothing_window and gps.consecutive_outside must be at least 1".to_string(),
            );
        }
        let alpha = self.baseline.smoothing_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return invalid(format!("baseline.smoothing_alpha {alpha} must be in (0, 1]"));
        }
        if self.risk.night_start_hour > 23 || self.risk.night_end_hour > 23 {
            return invalid("risk night hours must be between 0 and 23".to_string());
        }
        let e = &self.escalation;
        if !(e.advisory_risk <= e.warning_risk
            && e.warning_risk <= e.urgent_risk
            && e.urgent_risk <= e.emergency_risk)
        {
            return invalid("escalation risk thresholds must be non-decreasing".to_string());
        }
        if self.search.min_radius_m > self.search.max_radius_m {
            return invalid(format!(
                "search.min_radius_m {} exceeds search.max_radius_m {}",
                self.search.min_radius_m, self.search.max_radius_m
            ));
        }
        let fallback = self.search.default_radius_m;
        if !(fallback.is_finite() && fallback > 0.0) {
            return invalid(format!("search.default_radius_m {fallback} must be positive"));
        }

        Ok(())
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Parses the embedded defaults.
///
/// # Errors
///
/// Returns an error if the embedded file is malformed.
pub fn defaults() -> Result<SafeWanderConfig, ConfigError> {
    from_layers(DEFAULT_CONFIG_TOML, None)
}

/// Parses `overlay` on top of the embedded defaults.
///
/// # Errors
///
/// Returns an error if either document is malformed or the merged values
/// fail [`SafeWanderConfig::validate`].
pub fn from_overlay(overlay: &str) -> Result<SafeWanderConfig, ConfigError> {
    from_layers(DEFAULT_CONFIG_TOML, Some(overlay))
}

/// Loads the defaults and, when given, layers the file at `path` on top.
///
/// # Errors
///
/// Returns an error if the file cannot be read, either document is
/// malformed, or the merged values are invalid.
pub fn load(path: Option<&Path>) -> Result<SafeWanderConfig, ConfigError> {
    let Some(path) = path else {
        log::debug!("Using embedded default config");
        return defaults();
    };

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Loading config overlay from {}", path.display());
    from_overlay(&contents)
}

/// [`load`] with `path`, falling back to the file named by
/// [`CONFIG_ENV_VAR`].
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(path: Option<&Path>) -> Result<SafeWanderConfig, ConfigError> {
    if path.is_some() {
        return load(path);
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(env_path) if !env_path.is_empty() => load(Some(Path::new(&env_path))),
        _ => load(None),
    }
}

fn from_layers(base: &str, overlay: Option<&str>) -> Result<SafeWanderConfig, ConfigError> {
    let mut table: toml::Table = toml::de::from_str(base)?;
    if let Some(overlay) = overlay {
        let overlay: toml::Table = toml::de::from_str(overlay)?;
        merge(&mut table, overlay);
    }

    let config: SafeWanderConfig = toml::Value::Table(table).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Merges `overlay` into `base`, recursing into tables present in both.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
