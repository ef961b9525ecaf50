//! Communication error types and handling

use thiserror::Error;

/// Communication error types for transceiver interfaces
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommError {
    /// Serial device could not be opened
    #[error("Failed to open {port}: {details}")]
    OpenFailed { port: String, details: String },
    /// Connection to the device was lost
    #[error("Connection lost to {port}")]
    ConnectionLost { port: String },
    /// No data within the read timeout
    #[error("Communication timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },
    /// Operation on a transceiver that has already been closed
    #[error("Transceiver closed")]
    Closed,
    /// Underlying I/O failure
    #[error("I/O error: {details}")]
    Io { details: String },
    /// Configuration error
    #[error("Configuration error: invalid {parameter} = {value}")]
    ConfigurationError { parameter: String, value: String },
    /// Reader lifecycle misuse
    #[error("Reader error: {details}")]
    ReaderState { details: String },
}

impl From<std::io::Error> for CommError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                CommError::Timeout { timeout_ms: 0 }
            }
            _ => CommError::Io {
                details: error.to_string(),
            },
        }
    }
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;

/// What the read loop should do after a communication failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the operation immediately
    Retry,
    /// Drop the offending data and continue
    Skip,
    /// Give up on the device
    Fail,
}

impl CommError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CommError::Timeout { .. } => RecoveryStrategy::Retry,
            CommError::Io { .. } => RecoveryStrategy::Skip,
            CommError::OpenFailed { .. }
            | CommError::ConnectionLost { .. }
            | CommError::Closed
            | CommError::ConfigurationError { .. }
            | CommError::ReaderState { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }
}
