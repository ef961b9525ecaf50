use crate::core::{
    AnchorSet, Point2, ESTIMATION_PERIOD, MAX_ANCHORS, MAX_ESTIMATION_PERIOD, MIN_ANCHORS,
    STALE_CYCLE_LIMIT,
};
use crate::hardware::TransceiverConfig;
use crate::utils::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("Invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file I/O error
    #[error("Config I/O error: {message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("Config serialization error: {message}")]
    SerializationError { message: String },
}

/// Everything needed to run one localization session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Serial link to the UWB module
    pub serial: TransceiverConfig,
    /// Anchor coordinates in meters, in declaration order. Empty selects the
    /// built-in deployment layout.
    pub anchors: Vec<Point2>,
    /// Period of the estimation loop (milliseconds)
    pub estimation_period_ms: u64,
    /// Consecutive cycles without a reading before the session shuts down
    pub stale_cycle_limit: u32,
    pub log_level: LogLevel,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            serial: TransceiverConfig::default(),
            anchors: Vec::new(),
            estimation_period_ms: ESTIMATION_PERIOD.as_millis() as u64,
            stale_cycle_limit: STALE_CYCLE_LIMIT,
            log_level: LogLevel::default(),
        }
    }
}

impl LocalizationConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config = Self::from_json(&content).map_err(|e| match e {
            ConfigError::SerializationError { message } => ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, message),
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::SerializationError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serial.validate().map_err(|e| ConfigError::InvalidParameter {
            parameter: "serial".to_string(),
            value: self.serial.port_path.clone(),
            reason: e.to_string(),
        })?;

        let max_period_ms = MAX_ESTIMATION_PERIOD.as_millis() as u64;
        if self.estimation_period_ms == 0 || self.estimation_period_ms > max_period_ms {
            return Err(ConfigError::InvalidParameter {
                parameter: "estimation_period_ms".to_string(),
                value: self.estimation_period_ms.to_string(),
                reason: format!("Estimation period must be between 1 and {} ms", max_period_ms),
            });
        }

        if self.stale_cycle_limit == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "stale_cycle_limit".to_string(),
                value: "0".to_string(),
                reason: "Stale cycle limit must be positive".to_string(),
            });
        }

        if !self.anchors.is_empty() && !(MIN_ANCHORS..=MAX_ANCHORS).contains(&self.anchors.len()) {
            return Err(ConfigError::InvalidParameter {
                parameter: "anchors".to_string(),
                value: self.anchors.len().to_string(),
                reason: format!("Between {} and {} anchors are required", MIN_ANCHORS, MAX_ANCHORS),
            });
        }

        if let Some(anchor) = self.anchors.iter().find(|a| !a.x.is_finite() || !a.y.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                parameter: "anchors".to_string(),
                value: format!("({}, {})", anchor.x, anchor.y),
                reason: "Anchor coordinates must be finite".to_string(),
            });
        }

        Ok(())
    }

    /// Anchors listed in the file; empty when the default layout should apply
    pub fn anchor_set(&self) -> AnchorSet {
        let mut set = AnchorSet::new();
        for &anchor in &self.anchors {
            set.push(anchor);
        }
        set
    }

    pub fn estimation_period(&self) -> Duration {
        Duration::from_millis(self.estimation_period_ms)
    }
}
