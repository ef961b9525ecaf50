//! Localization session lifecycle
//!
//! [`LocalizationSystem`] owns the anchor layout and both background threads:
//! the frame reader (serial device → reading store) and the estimation loop
//! (reading store → solver → position cell, plus the liveness watchdog).
//! `stop()` tears both down and may run concurrently with the watchdog's own
//! shutdown; whichever gets there first does the work.

use crate::algorithms::{LivenessMonitor, Multilateration};
use crate::api::types::{ApiError, ApiResult, ShutdownReason, SystemState, SystemStatus};
use crate::core::{AnchorSet, Point2, TagPosition, MIN_ANCHORS};
use crate::hardware::{CommError, SerialTransceiver, TransceiverInterface};
use crate::processing::{
    CycleOutcome, Estimator, FrameParser, FrameReader, PositionCell, ReaderCounters, ReadingStore,
};
use crate::utils::LocalizationConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the estimation thread
struct Shared {
    store: Arc<ReadingStore>,
    position: Arc<PositionCell>,
    state: Mutex<SystemState>,
    /// Held for the whole teardown so a second caller waits for it to finish
    teardown: Mutex<()>,
    reader: Mutex<Option<FrameReader>>,
    last_counters: Mutex<ReaderCounters>,
    stale_cycles: AtomicU32,
    shutdowns: AtomicU32,
}

impl Shared {
    fn new() -> Self {
        Self {
            store: Arc::new(ReadingStore::new()),
            position: Arc::new(PositionCell::new()),
            state: Mutex::new(SystemState::Idle),
            teardown: Mutex::new(()),
            reader: Mutex::new(None),
            last_counters: Mutex::new(ReaderCounters::default()),
            stale_cycles: AtomicU32::new(0),
            shutdowns: AtomicU32::new(0),
        }
    }

    fn state(&self) -> SystemState {
        *lock(&self.state)
    }

    fn is_running(&self) -> bool {
        self.state() == SystemState::Running
    }

    /// End the session. Only the first call out of `Running` tears anything down.
    ///
    /// `Stopped` becomes visible only after the reader has closed the device
    /// and its counters are saved.
    fn shutdown(&self, reason: ShutdownReason) -> bool {
        let _teardown = lock(&self.teardown);

        match self.state() {
            SystemState::Running => {}
            SystemState::Idle => {
                *lock(&self.state) = SystemState::Stopped(reason);
                return false;
            }
            SystemState::Stopped(_) => return false,
        }

        self.shutdowns.fetch_add(1, Ordering::SeqCst);

        {
            // status() waits here rather than seeing an empty reader slot
            let mut reader = lock(&self.reader);
            if let Some(active) = reader.as_mut() {
                active.stop();
                *lock(&self.last_counters) = active.counters();
            }
            *reader = None;
        }

        *lock(&self.state) = SystemState::Stopped(reason);

        match reason {
            ShutdownReason::Requested => info!("localization stopped"),
            ShutdownReason::SensorSilence => error!("localization shut down: UWB sensor went silent"),
        }
        true
    }

    fn reader_counters(&self) -> ReaderCounters {
        match lock(&self.reader).as_ref() {
            Some(reader) => reader.counters(),
            None => *lock(&self.last_counters),
        }
    }
}

/// Tag localization session: configure anchors, `start()`, query, `stop()`.
///
/// A session runs once. After it stops, for whatever reason, build a new
/// system to try again.
pub struct LocalizationSystem {
    config: LocalizationConfig,
    anchors: AnchorSet,
    transceiver: Mutex<Option<Box<dyn TransceiverInterface>>>,
    shared: Arc<Shared>,
    estimator: Mutex<Option<JoinHandle<()>>>,
}

impl LocalizationSystem {
    /// Create a system that opens the configured serial device on `start()`
    pub fn new(config: LocalizationConfig) -> ApiResult<Self> {
        config.validate()?;
        let anchors = config.anchor_set();

        Ok(Self {
            config,
            anchors,
            transceiver: Mutex::new(None),
            shared: Arc::new(Shared::new()),
            estimator: Mutex::new(None),
        })
    }

    /// Create a system around an already-open transceiver
    pub fn with_transceiver(
        config: LocalizationConfig,
        transceiver: Box<dyn TransceiverInterface>,
    ) -> ApiResult<Self> {
        let system = Self::new(config)?;
        *lock(&system.transceiver) = Some(transceiver);
        Ok(system)
    }

    /// Append anchors in declaration order. Returns how many were accepted;
    /// anchors past capacity, or any offered once the session has started,
    /// are rejected and logged.
    pub fn configure_anchors(&mut self, positions: &[Point2]) -> usize {
        if self.shared.state() != SystemState::Idle {
            warn!(offered = positions.len(), "anchor layout is frozen once started");
            return 0;
        }

        let mut accepted = 0;
        for &position in positions {
            if self.anchors.push(position) {
                accepted += 1;
            } else {
                warn!(x = position.x, y = position.y, "anchor rejected: layout is full");
            }
        }
        accepted
    }

    /// Open the device and launch the reader and estimation threads
    pub fn start(&mut self) -> ApiResult<()> {
        match self.shared.state() {
            SystemState::Idle => {}
            SystemState::Running => return Err(ApiError::AlreadyRunning),
            SystemState::Stopped(_) => return Err(ApiError::Terminated),
        }

        let anchors = if self.anchors.is_empty() {
            info!("no anchors configured, using default layout");
            AnchorSet::default_layout()
        } else {
            self.anchors
        };
        if !anchors.is_sufficient() {
            return Err(ApiError::InsufficientAnchors {
                available: anchors.len(),
                required: MIN_ANCHORS,
            });
        }

        let condition_number = Multilateration::default().check_geometry(&anchors)?;

        let parser = FrameParser::new(anchors.len()).map_err(|e| CommError::ConfigurationError {
            parameter: "anchor_count".to_string(),
            value: e.to_string(),
        })?;

        let pending = lock(&self.transceiver).take();
        let transceiver: Box<dyn TransceiverInterface> = match pending {
            Some(transceiver) => transceiver,
            None => Box::new(SerialTransceiver::open(self.config.serial.clone())?),
        };

        let mut reader = FrameReader::new(transceiver, parser, Arc::clone(&self.shared.store));
        reader.start()?;
        *lock(&self.shared.reader) = Some(reader);
        *lock(&self.shared.state) = SystemState::Running;

        let estimator = Estimator::new(
            anchors,
            LivenessMonitor::new(self.config.stale_cycle_limit),
            Arc::clone(&self.shared.store),
            Arc::clone(&self.shared.position),
        );
        let shared = Arc::clone(&self.shared);
        let period = self.config.estimation_period();

        let spawned = thread::Builder::new()
            .name("uwb-estimator".to_string())
            .spawn(move || run_estimation_loop(shared, estimator, period));

        match spawned {
            Ok(handle) => {
                *lock(&self.estimator) = Some(handle);
                self.anchors = anchors;
            }
            Err(e) => {
                self.shared.shutdown(ShutdownReason::Requested);
                return Err(CommError::from(e).into());
            }
        }

        info!(
            anchors = anchors.len(),
            condition_number,
            period_ms = self.config.estimation_period_ms,
            "localization started"
        );
        Ok(())
    }

    /// Latest position, or the (0, 0, 0) placeholder before the first fix
    pub fn get_position(&self) -> TagPosition {
        self.shared.position.get().unwrap_or_default()
    }

    /// Latest position, `None` before the first fix
    pub fn latest_fix(&self) -> Option<TagPosition> {
        self.shared.position.get()
    }

    pub fn has_fix(&self) -> bool {
        self.latest_fix().is_some()
    }

    /// Stop both threads and close the device. Safe to call repeatedly and
    /// after the watchdog has already shut the session down.
    pub fn stop(&self) {
        self.shared.shutdown(ShutdownReason::Requested);

        if let Some(mut transceiver) = lock(&self.transceiver).take() {
            transceiver.close();
        }

        let handle = lock(&self.estimator).take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            handle.thread().unpark();
            if handle.join().is_err() {
                error!("estimation thread panicked");
            }
        }
    }

    pub fn state(&self) -> SystemState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    /// Number of times the session was torn down; never more than one
    pub fn shutdown_count(&self) -> u32 {
        self.shared.shutdowns.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            state: self.shared.state(),
            has_fix: self.has_fix(),
            stale_cycles: self.shared.stale_cycles.load(Ordering::Relaxed),
            anchor_count: self.anchors.len(),
            reader: self.shared.reader_counters(),
        }
    }
}

impl Drop for LocalizationSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_estimation_loop(shared: Arc<Shared>, mut estimator: Estimator, period: Duration) {
    let mut next_tick = Instant::now();

    while shared.is_running() {
        let outcome = estimator.cycle();
        shared.stale_cycles.store(estimator.stale_cycles(), Ordering::Relaxed);

        if matches!(outcome, CycleOutcome::Tripped | CycleOutcome::Dead) {
            shared.shutdown(ShutdownReason::SensorSilence);
            return;
        }

        let now = Instant::now();
        next_tick = (next_tick + period).max(now);

        // stop() unparks us so teardown does not wait out a long period
        while shared.is_running() {
            let now = Instant::now();
            if now >= next_tick {
                break;
            }
            thread::park_timeout(next_tick - now);
        }
    }
}
