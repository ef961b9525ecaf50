//! One estimation cycle: take the freshest reading, feed the watchdog, solve

use crate::algorithms::{LivenessMonitor, LivenessVerdict, Multilateration, SolveError};
use crate::core::{AnchorSet, TagPosition};
use crate::processing::store::{PositionCell, ReadingStore};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of a single estimation cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A new position was published
    Updated(TagPosition),
    /// No new reading this cycle
    Stale { stale_cycles: u32 },
    /// A reading arrived but could not be turned into a position
    Failed(SolveError),
    /// Silence reached the limit on this cycle; the session must end
    Tripped,
    /// The watchdog tripped earlier
    Dead,
}

/// Pulls readings from the store and maintains the position cell
pub struct Estimator {
    anchors: AnchorSet,
    solver: Multilateration,
    monitor: LivenessMonitor,
    store: Arc<ReadingStore>,
    position: Arc<PositionCell>,
    consecutive_failures: u32,
}

impl Estimator {
    pub fn new(
        anchors: AnchorSet,
        monitor: LivenessMonitor,
        store: Arc<ReadingStore>,
        position: Arc<PositionCell>,
    ) -> Self {
        Self {
            anchors,
            solver: Multilateration::default(),
            monitor,
            store,
            position,
            consecutive_failures: 0,
        }
    }

    /// Run one cycle
    pub fn cycle(&mut self) -> CycleOutcome {
        let reading = self.store.take_latest();

        let reading = match self.monitor.record(reading.is_some()) {
            LivenessVerdict::Dead => return CycleOutcome::Dead,
            LivenessVerdict::Tripped => {
                error!(
                    stale_cycles = self.monitor.stale_cycles(),
                    "no distance readings from the UWB module, giving up"
                );
                return CycleOutcome::Tripped;
            }
            LivenessVerdict::Alive { stale_cycles } => match reading {
                Some(reading) => reading,
                None => return CycleOutcome::Stale { stale_cycles },
            },
        };

        match self.solver.solve_reading(&self.anchors, &reading) {
            Ok(position) => {
                self.position.set(position);
                self.consecutive_failures = 0;
                debug!(x = position.x, y = position.y, tag = position.tag_id, "tag position updated");
                CycleOutcome::Updated(position)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures == 1 {
                    warn!(error = %e, distances = ?reading.distances(), "position solve failed");
                } else {
                    debug!(error = %e, failures = self.consecutive_failures, "position solve failed");
                }
                CycleOutcome::Failed(e)
            }
        }
    }

    pub fn stale_cycles(&self) -> u32 {
        self.monitor.stale_cycles()
    }
}
