//! Background frame reader
//!
//! Owns the transceiver for its whole life: the device is moved into the
//! reader thread on `start()` and closed by that thread when the loop ends.

use crate::hardware::{CommError, CommResult, RecoveryStrategy, TransceiverInterface};
use crate::processing::parser::FrameParser;
use crate::processing::store::ReadingStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Consecutive skippable read errors after which the device is given up on
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 10;

/// Pause after a skippable read error so a failing device is not polled hot
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct ReaderStats {
    frames_decoded: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Snapshot of the reader's frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderCounters {
    pub frames_decoded: u64,
    pub frames_dropped: u64,
}

/// Reads lines from a transceiver and publishes decoded readings
pub struct FrameReader {
    transceiver: Option<Box<dyn TransceiverInterface>>,
    parser: FrameParser,
    store: Arc<ReadingStore>,
    active: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
    handle: Option<JoinHandle<()>>,
}

impl FrameReader {
    pub fn new(
        transceiver: Box<dyn TransceiverInterface>,
        parser: FrameParser,
        store: Arc<ReadingStore>,
    ) -> Self {
        Self {
            transceiver: Some(transceiver),
            parser,
            store,
            active: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ReaderStats::default()),
            handle: None,
        }
    }

    /// Launch the read loop on its own thread. A reader runs at most once.
    pub fn start(&mut self) -> CommResult<()> {
        let transceiver = self.transceiver.take().ok_or_else(|| CommError::ReaderState {
            details: "reader already started or stopped".to_string(),
        })?;

        self.active.store(true, Ordering::SeqCst);

        let parser = self.parser.clone();
        let store = Arc::clone(&self.store);
        let active = Arc::clone(&self.active);
        let stats = Arc::clone(&self.stats);

        let handle = thread::Builder::new()
            .name("uwb-frame-reader".to_string())
            .spawn(move || run_read_loop(transceiver, parser, store, active, stats))
            .map_err(|e| {
                self.active.store(false, Ordering::SeqCst);
                CommError::from(e)
            })?;

        self.handle = Some(handle);
        info!(anchors = self.parser.anchor_count(), "frame reader started");
        Ok(())
    }

    /// Stop the read loop and close the device. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("frame reader thread panicked");
            }
            info!("frame reader stopped");
        }

        // Never started: the device is still ours to release.
        if let Some(mut transceiver) = self.transceiver.take() {
            transceiver.close();
        }
    }

    /// Whether the read loop is still pulling frames
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn counters(&self) -> ReaderCounters {
        ReaderCounters {
            frames_decoded: self.stats.frames_decoded.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_read_loop(
    mut transceiver: Box<dyn TransceiverInterface>,
    parser: FrameParser,
    store: Arc<ReadingStore>,
    active: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
) {
    let mut consecutive_errors = 0u32;

    while active.load(Ordering::SeqCst) {
        let result = transceiver.read_message();
        if result.is_ok() {
            consecutive_errors = 0;
        }

        match result {
            Ok(Some(message)) => match parser.parse_message(&message) {
                Ok(reading) => {
                    trace!(distances = ?reading.distances(), tag = reading.tag_id, "frame decoded");
                    stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
                    store.put(reading);
                }
                Err(e) => {
                    trace!(error = %e, "dropping serial line");
                    stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            Ok(None) => {}
            Err(e) => match e.recovery_strategy() {
                RecoveryStrategy::Retry => {}
                RecoveryStrategy::Skip => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        error!(error = %e, errors = consecutive_errors, "frame reader giving up on device");
                        break;
                    }
                    debug!(error = %e, errors = consecutive_errors, "skipping unreadable data");
                    thread::sleep(READ_ERROR_BACKOFF);
                }
                RecoveryStrategy::Fail => {
                    if active.load(Ordering::SeqCst) {
                        error!(error = %e, "frame reader giving up on device");
                    }
                    break;
                }
            },
        }
    }

    // Close first: once `active` drops, callers may assume the device is released.
    transceiver.close();
    active.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistanceReading;
    use crate::hardware::MockTransceiver;
    use std::time::{Duration, Instant};

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn reader_with_mock() -> (FrameReader, crate::hardware::MockHandle, Arc<ReadingStore>) {
        let (transceiver, handle) = MockTransceiver::new();
        let store = Arc::new(ReadingStore::new());
        let reader = FrameReader::new(Box::new(transceiver), FrameParser::default(), Arc::clone(&store));
        (reader, handle, store)
    }

    #[test]
    fn test_reader_publishes_frames() {
        let (mut reader, handle, store) = reader_with_mock();
        reader.start().unwrap();

        let reading = DistanceReading::new(&[1.5, 2.5, 3.5], 4).unwrap();
        handle.push_reading(&reading);

        assert!(wait_for(|| store.peek().is_some()));
        assert_eq!(store.take_latest(), Some(reading));
        assert_eq!(reader.counters().frames_decoded, 1);

        reader.stop();
    }

    #[test]
    fn test_bad_length_frames_leave_store_unchanged() {
        let (mut reader, handle, store) = reader_with_mock();
        reader.start().unwrap();

        let reading = DistanceReading::new(&[1.0, 2.0, 3.0], 1).unwrap();
        handle.push_reading(&reading);
        assert!(wait_for(|| store.write_count() == 1));

        handle.push_line(vec![0u8; 15]);
        handle.push_line(vec![0u8; 17]);
        assert!(wait_for(|| reader.counters().frames_dropped == 2));

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.peek(), Some(reading));

        reader.stop();
    }

    #[test]
    fn test_stop_twice_closes_device_once() {
        let (mut reader, handle, _store) = reader_with_mock();
        reader.start().unwrap();
        assert!(reader.is_running());

        reader.stop();
        reader.stop();
        assert!(!reader.is_running());
        assert!(handle.is_closed());
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_stop_without_start_releases_device() {
        let (mut reader, handle, _store) = reader_with_mock();
        reader.stop();
        assert!(handle.is_closed());
        assert!(reader.start().is_err());
    }

    #[test]
    fn test_fatal_read_error_ends_loop() {
        let (mut reader, handle, _store) = reader_with_mock();
        reader.start().unwrap();

        handle.fail_next_read();
        assert!(wait_for(|| !reader.is_running()));
        assert!(handle.is_closed());

        reader.stop();
    }

    #[test]
    fn test_transient_io_errors_are_skipped() {
        let (mut reader, handle, store) = reader_with_mock();
        handle.fail_reads_with_io(MAX_CONSECUTIVE_READ_ERRORS - 1);
        let reading = DistanceReading::new(&[2.0, 2.0, 2.0], 1).unwrap();
        handle.push_reading(&reading);
        reader.start().unwrap();

        assert!(wait_for(|| store.peek().is_some()));
        assert!(reader.is_running());
        assert!(!handle.is_closed());

        reader.stop();
    }

    #[test]
    fn test_persistent_io_errors_end_loop() {
        let (mut reader, handle, _store) = reader_with_mock();
        handle.fail_reads_with_io(u32::MAX);
        reader.start().unwrap();

        assert!(wait_for(|| !reader.is_running()));
        assert!(handle.is_closed());
        assert_eq!(handle.close_count(), 1);

        reader.stop();
    }
}
