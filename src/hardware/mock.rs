//! Mock transceiver implementation for testing and development

use crate::core::DistanceReading;
use crate::hardware::{
    now_ms, CommError, CommResult, RawMessage, TransceiverConfig, TransceiverInterface,
    TransceiverStatus,
};
use crate::processing::parser::encode_frame;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

/// State shared between a mock transceiver and its handle
#[derive(Debug, Default)]
struct MockState {
    closed: AtomicBool,
    close_calls: AtomicU32,
    fail_next_read: AtomicBool,
    io_failures: AtomicU32,
}

/// Mock transceiver fed through a [`MockHandle`].
///
/// Reads block for up to the configured timeout like the real device does.
pub struct MockTransceiver {
    status: TransceiverStatus,
    config: TransceiverConfig,
    lines: Receiver<Vec<u8>>,
    state: Arc<MockState>,
}

/// Test-side controls for a [`MockTransceiver`] that has been moved into a reader
#[derive(Debug, Clone)]
pub struct MockHandle {
    lines: Sender<Vec<u8>>,
    state: Arc<MockState>,
}

impl MockTransceiver {
    /// Create a new mock transceiver and the handle that drives it
    pub fn new() -> (Self, MockHandle) {
        Self::with_config(TransceiverConfig::mock())
    }

    pub fn with_config(config: TransceiverConfig) -> (Self, MockHandle) {
        let (tx, rx) = mpsc::channel();
        let state = Arc::new(MockState::default());

        let mut status = TransceiverStatus::new(config.port_path.clone());
        status.connected = true;

        let transceiver = Self {
            status,
            config,
            lines: rx,
            state: Arc::clone(&state),
        };
        (transceiver, MockHandle { lines: tx, state })
    }
}

impl MockHandle {
    /// Queue a raw line, delivered verbatim
    pub fn push_line(&self, data: Vec<u8>) {
        // The receiver is gone once the reader thread exits; dropping is fine then.
        let _ = self.lines.send(data);
    }

    /// Queue a well-formed frame carrying `reading`
    pub fn push_reading(&self, reading: &DistanceReading) {
        self.push_line(encode_frame(reading).to_vec());
    }

    /// Make the next read fail with a lost connection
    pub fn fail_next_read(&self) {
        self.state.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Make the next `count` reads fail with a transient I/O error
    pub fn fail_reads_with_io(&self, count: u32) {
        self.state.io_failures.store(count, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Number of times `close()` released the device
    pub fn close_count(&self) -> u32 {
        self.state.close_calls.load(Ordering::SeqCst)
    }
}

impl TransceiverInterface for MockTransceiver {
    fn read_message(&mut self) -> CommResult<Option<RawMessage>> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(CommError::Closed);
        }

        if self.state.fail_next_read.swap(false, Ordering::SeqCst) {
            self.status.error_count += 1;
            return Err(CommError::ConnectionLost {
                port: self.config.port_path.clone(),
            });
        }

        let pending_io = self
            .state
            .io_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending_io.is_ok() {
            self.status.error_count += 1;
            return Err(CommError::Io {
                details: "input/output error".to_string(),
            });
        }

        let timeout = Duration::from_millis(u64::from(self.config.read_timeout_ms));
        match self.lines.recv_timeout(timeout) {
            Ok(data) => {
                let timestamp = now_ms();
                self.status.messages_received += 1;
                self.status.last_message_time = Some(timestamp);
                Ok(Some(RawMessage::new(data).with_timestamp(timestamp)))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // Every handle is gone; behave like an idle line.
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn get_status(&self) -> TransceiverStatus {
        self.status.clone()
    }

    fn is_connected(&self) -> bool {
        !self.state.closed.load(Ordering::SeqCst)
    }

    fn flush(&mut self) -> CommResult<()> {
        if !self.is_connected() {
            return Err(CommError::Closed);
        }
        while self.lines.try_recv().is_ok() {}
        Ok(())
    }

    fn close(&mut self) {
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            self.state.close_calls.fetch_add(1, Ordering::SeqCst);
            self.status.connected = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_transceiver_creation() {
        let (transceiver, handle) = MockTransceiver::new();
        assert!(transceiver.is_connected());
        assert!(!handle.is_closed());
    }

    #[test]
    fn test_message_queue() {
        let (mut transceiver, handle) = MockTransceiver::new();

        handle.push_line(vec![1, 2, 3, 4]);
        let message = transceiver.read_message().unwrap().unwrap();
        assert_eq!(message.data, vec![1, 2, 3, 4]);
        assert_eq!(transceiver.get_status().messages_received, 1);

        // Nothing queued: the read times out quietly
        assert!(transceiver.read_message().unwrap().is_none());
    }

    #[test]
    fn test_flush_discards_pending_lines() {
        let (mut transceiver, handle) = MockTransceiver::new();
        handle.push_line(vec![1]);
        handle.push_line(vec![2]);

        transceiver.flush().unwrap();
        assert!(transceiver.read_message().unwrap().is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut transceiver, handle) = MockTransceiver::new();

        transceiver.close();
        transceiver.close();
        assert!(handle.is_closed());
        assert_eq!(handle.close_count(), 1);
        assert!(matches!(transceiver.read_message(), Err(CommError::Closed)));
    }

    #[test]
    fn test_error_injection() {
        let (mut transceiver, handle) = MockTransceiver::new();
        handle.fail_next_read();

        let result = transceiver.read_message();
        assert!(matches!(result, Err(CommError::ConnectionLost { .. })));
        assert_eq!(transceiver.get_status().error_count, 1);
        assert!(transceiver.read_message().unwrap().is_none());
    }

    #[test]
    fn test_io_error_injection() {
        let (mut transceiver, handle) = MockTransceiver::new();
        handle.fail_reads_with_io(2);
        handle.push_line(vec![7]);

        assert!(matches!(transceiver.read_message(), Err(CommError::Io { .. })));
        assert!(matches!(transceiver.read_message(), Err(CommError::Io { .. })));
        assert_eq!(transceiver.read_message().unwrap().unwrap().data, vec![7]);
        assert_eq!(transceiver.get_status().error_count, 2);
    }
}
