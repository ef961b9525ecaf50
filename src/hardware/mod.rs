//! Hardware abstraction layer for the UWB module's serial link
//!
//! The reader thread only sees [`TransceiverInterface`]; the real device is
//! [`SerialTransceiver`] and tests drive [`MockTransceiver`].

pub mod transceiver;
pub mod serial;
pub mod mock;
pub mod error;

pub use transceiver::{TransceiverInterface, TransceiverStatus, TransceiverConfig};
pub use serial::SerialTransceiver;
pub use mock::{MockTransceiver, MockHandle};
pub use error::{CommError, CommResult, RecoveryStrategy};

use std::time::{SystemTime, UNIX_EPOCH};

/// One line received from the transceiver
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
}

impl RawMessage {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp_ms: 0, // Will be set by transceiver implementation
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Milliseconds since the Unix epoch, 0 if the clock is before it
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
