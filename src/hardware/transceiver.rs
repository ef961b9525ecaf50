//! Transceiver interface trait and configuration

use crate::core::{DEFAULT_BAUD_RATE, DEFAULT_PORT_PATH};
use crate::hardware::{CommError, CommResult, RawMessage};
use serde::{Deserialize, Serialize};

/// Hardware abstraction for the UWB module's serial link.
///
/// Implementations are moved into the reader thread, so they must be `Send`.
pub trait TransceiverInterface: Send {
    /// Read the next line from the device.
    /// Returns Ok(Some(message)) when a complete line arrived
    /// Returns Ok(None) if the read timed out without one
    /// Returns Err(error) if communication fails
    fn read_message(&mut self) -> CommResult<Option<RawMessage>>;

    /// Get current transceiver status
    fn get_status(&self) -> TransceiverStatus;

    /// Check if the device handle is open
    fn is_connected(&self) -> bool;

    /// Discard any buffered input
    fn flush(&mut self) -> CommResult<()>;

    /// Release the device. Calling it again is a no-op.
    fn close(&mut self);
}

/// Transceiver status information
#[derive(Debug, Clone, PartialEq)]
pub struct TransceiverStatus {
    pub port: String,
    pub connected: bool,
    pub last_message_time: Option<u64>,
    pub error_count: u32,
    pub messages_received: u32,
}

impl TransceiverStatus {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            connected: false,
            last_message_time: None,
            error_count: 0,
            messages_received: 0,
        }
    }
}

/// Serial link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransceiverConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub port_path: String,
    /// Baud rate for serial communication
    pub baud_rate: u32,
    /// Timeout for a single read (milliseconds); bounds how long `stop()` waits on the reader
    pub read_timeout_ms: u32,
    /// Upper bound on a buffered line before it is discarded as noise
    pub max_line_len: usize,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            port_path: DEFAULT_PORT_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 100,
            max_line_len: 256,
        }
    }
}

impl TransceiverConfig {
    pub fn serial(port_path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_path: port_path.into(),
            baud_rate,
            ..Default::default()
        }
    }

    pub fn mock() -> Self {
        Self {
            port_path: "mock".to_string(),
            read_timeout_ms: 5,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CommResult<()> {
        if self.port_path.trim().is_empty() {
            return Err(CommError::ConfigurationError {
                parameter: "port_path".to_string(),
                value: format!("{:?}", self.port_path),
            });
        }

        if self.baud_rate == 0 {
            return Err(CommError::ConfigurationError {
                parameter: "baud_rate".to_string(),
                value: self.baud_rate.to_string(),
            });
        }

        if self.read_timeout_ms == 0 || self.read_timeout_ms > 10_000 {
            return Err(CommError::ConfigurationError {
                parameter: "read_timeout_ms".to_string(),
                value: self.read_timeout_ms.to_string(),
            });
        }

        if self.max_line_len < crate::core::FRAME_LEN || self.max_line_len > 4096 {
            return Err(CommError::ConfigurationError {
                parameter: "max_line_len".to_string(),
                value: self.max_line_len.to_string(),
            });
        }

        Ok(())
    }
}
