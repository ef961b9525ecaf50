//! Serial/UART communication with the UWB module

use crate::hardware::{
    now_ms, CommError, CommResult, RawMessage, TransceiverConfig, TransceiverInterface,
    TransceiverStatus,
};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Accumulates raw bytes and hands out newline-terminated lines.
///
/// Lines keep their terminator, so a 16-byte frame is 15 payload bytes plus
/// `\n`. A run of bytes longer than `max_len` without a newline is dropped.
#[derive(Debug)]
struct LineBuffer {
    pending: Vec<u8>,
    max_len: usize,
}

impl LineBuffer {
    fn new(max_len: usize) -> Self {
        Self {
            pending: Vec::with_capacity(max_len),
            max_len,
        }
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > self.max_len && !self.pending.contains(&b'\n') {
            debug!(dropped = self.pending.len(), "discarding unterminated serial data");
            self.pending.clear();
        }
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        Some(self.pending.drain(..=end).collect())
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Serial transceiver backed by the `serialport` crate
pub struct SerialTransceiver {
    status: TransceiverStatus,
    config: TransceiverConfig,
    port: Option<Box<dyn SerialPort>>,
    line_buffer: LineBuffer,
}

impl SerialTransceiver {
    /// Open the configured device. Failure here is fatal to the session.
    pub fn open(config: TransceiverConfig) -> CommResult<Self> {
        config.validate()?;

        let port = serialport::new(&config.port_path, config.baud_rate)
            .timeout(Duration::from_millis(u64::from(config.read_timeout_ms)))
            .open()
            .map_err(|e| CommError::OpenFailed {
                port: config.port_path.clone(),
                details: e.to_string(),
            })?;

        let mut status = TransceiverStatus::new(config.port_path.clone());
        status.connected = true;

        let mut transceiver = Self {
            status,
            line_buffer: LineBuffer::new(config.max_line_len),
            config,
            port: Some(port),
        };
        // The module may have queued stale frames while nobody was listening.
        transceiver.flush()?;

        info!(port = %transceiver.config.port_path, baud = transceiver.config.baud_rate, "serial port opened");
        Ok(transceiver)
    }

    fn map_port_error(&self, error: serialport::Error) -> CommError {
        match error.kind() {
            serialport::ErrorKind::NoDevice => CommError::ConnectionLost {
                port: self.config.port_path.clone(),
            },
            _ => CommError::Io {
                details: error.to_string(),
            },
        }
    }

    fn accept(&mut self, line: Vec<u8>) -> RawMessage {
        let timestamp = now_ms();
        self.status.messages_received += 1;
        self.status.last_message_time = Some(timestamp);
        RawMessage::new(line).with_timestamp(timestamp)
    }
}

impl TransceiverInterface for SerialTransceiver {
    fn read_message(&mut self) -> CommResult<Option<RawMessage>> {
        if let Some(line) = self.line_buffer.next_line() {
            return Ok(Some(self.accept(line)));
        }

        let port = self.port.as_mut().ok_or(CommError::Closed)?;

        let mut chunk = [0u8; 64];
        match port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.line_buffer.extend(&chunk[..n]);
                Ok(self.line_buffer.next_line().map(|line| self.accept(line)))
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) => {
                self.status.error_count += 1;
                warn!(port = %self.config.port_path, error = %e, "serial read failed");
                Err(if e.kind() == ErrorKind::BrokenPipe {
                    CommError::ConnectionLost {
                        port: self.config.port_path.clone(),
                    }
                } else {
                    CommError::from(e)
                })
            }
        }
    }

    fn get_status(&self) -> TransceiverStatus {
        self.status.clone()
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn flush(&mut self) -> CommResult<()> {
        self.line_buffer.clear();
        let result = match self.port.as_ref() {
            Some(port) => port.clear(ClearBuffer::Input),
            None => return Err(CommError::Closed),
        };
        result.map_err(|e| self.map_port_error(e))
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            self.line_buffer.clear();
            self.status.connected = false;
            info!(port = %self.config.port_path, "serial port closed");
        }
    }
}

impl Drop for SerialTransceiver {
    fn drop(&mut self) {
        self.close();
    }
}
