use crate::core::{
    DEFAULT_ACCURACY_CEILING_M, DEFAULT_HYSTERESIS_WINDOW, DEFAULT_STALENESS_WINDOW_MS,
    MAX_HYSTERESIS_WINDOW,
};
use crate::source::TrackingOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Tuning parameters for one proximity tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Samples reporting a worse accuracy than this are dropped (meters)
    pub accuracy_ceiling_m: f64,
    /// Number of recent classifications the hysteresis filter considers
    pub hysteresis_window: usize,
    /// Time without an accepted sample before state turns stale (milliseconds)
    pub staleness_window_ms: u64,
    /// Sampling parameters passed to the location source.
    ///
    /// No minimum distance by default: a device standing still must keep
    /// reporting or its state goes stale.
    pub tracking: TrackingOptions,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file could not be read or written
    #[error("config file '{path}': {message}")]
    Io { path: String, message: String },
    /// JSON serialization/deserialization error
    #[error("config file '{path}' is not valid: {message}")]
    Parse { path: String, message: String },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            accuracy_ceiling_m: DEFAULT_ACCURACY_CEILING_M,
            hysteresis_window: DEFAULT_HYSTERESIS_WINDOW,
            staleness_window_ms: DEFAULT_STALENESS_WINDOW_MS,
            tracking: TrackingOptions {
                min_distance_m: 0.0,
                ..TrackingOptions::default()
            },
        }
    }
}

impl TrackerConfig {
    /// Check every parameter, returning the first violation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.accuracy_ceiling_m.is_finite() && self.accuracy_ceiling_m > 0.0) {
            return Err(ConfigError::invalid(
                "accuracy_ceiling_m",
                self.accuracy_ceiling_m,
                "must be a positive number of meters",
            ));
        }

        if self.hysteresis_window == 0 {
            return Err(ConfigError::invalid(
                "hysteresis_window",
                self.hysteresis_window,
                "must hold at least one sample",
            ));
        }

        if self.hysteresis_window > MAX_HYSTERESIS_WINDOW {
            return Err(ConfigError::invalid(
                "hysteresis_window",
                self.hysteresis_window,
                "must not exceed 32 samples",
            ));
        }

        if self.staleness_window_ms == 0 {
            return Err(ConfigError::invalid(
                "staleness_window_ms",
                self.staleness_window_ms,
                "must be greater than zero",
            ));
        }

        let min_distance = self.tracking.min_distance_m;
        if !(min_distance.is_finite() && min_distance >= 0.0) {
            return Err(ConfigError::invalid(
                "tracking.min_distance_m",
                min_distance,
                "must be zero or a positive number of meters",
            ));
        }

        Ok(())
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_millis(self.staleness_window_ms)
    }

    /// Load and validate a configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        let config: TrackerConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path_str,
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            path: path_str,
            message: e.to_string(),
        })
    }
}
