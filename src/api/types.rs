//! Common API types and data structures

use crate::algorithms::SolveError;
use crate::hardware::CommError;
use crate::processing::ReaderCounters;
use crate::utils::ConfigError;
use thiserror::Error;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Too few anchors configured for a 2-D fix
    #[error("Insufficient anchors: {available} configured, {required} required")]
    InsufficientAnchors { available: usize, required: usize },
    /// `start()` called on a running system
    #[error("Localization system already running")]
    AlreadyRunning,
    /// `start()` called after the session ended; build a new system instead
    #[error("Localization session has ended")]
    Terminated,
    /// Serial device failure
    #[error("Hardware error: {0}")]
    Hardware(#[from] CommError),
    /// Anchor geometry or numeric failure
    #[error("Computation failure: {0}")]
    Computation(#[from] SolveError),
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Lifecycle of a localization session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Configured, not started
    Idle,
    /// Reader and estimation loop running
    Running,
    /// Session ended; terminal
    Stopped(ShutdownReason),
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// `stop()` was called
    Requested,
    /// The liveness monitor saw no readings for too long
    SensorSilence,
}

/// Point-in-time view of the system for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub state: SystemState,
    /// Whether any position has been computed yet
    pub has_fix: bool,
    /// Consecutive cycles without a fresh reading
    pub stale_cycles: u32,
    pub anchor_count: usize,
    pub reader: ReaderCounters,
}

impl SystemStatus {
    pub fn is_running(&self) -> bool {
        self.state == SystemState::Running
    }

    /// Whether the session ended because the sensor stopped reporting
    pub fn sensor_lost(&self) -> bool {
        self.state == SystemState::Stopped(ShutdownReason::SensorSilence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: ApiError = CommError::Closed.into();
        assert!(matches!(err, ApiError::Hardware(CommError::Closed)));

        let err: ApiError = SolveError::DegenerateGeometry {
            condition_number: f64::INFINITY,
        }
        .into();
        assert!(err.to_string().starts_with("Computation failure"));
    }

    #[test]
    fn test_status_running() {
        let status = SystemStatus {
            state: SystemState::Stopped(ShutdownReason::SensorSilence),
            has_fix: false,
            stale_cycles: 200,
            anchor_count: 3,
            reader: ReaderCounters::default(),
        };
        assert!(!status.is_running());
        assert!(status.sensor_lost());

        let requested = SystemStatus {
            state: SystemState::Stopped(ShutdownReason::Requested),
            ..status
        };
        assert!(!requested.sensor_lost());
    }
}
