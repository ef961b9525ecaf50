//! Stale-cycle watchdog for the estimation loop

use crate::core::STALE_CYCLE_LIMIT;

/// Outcome of recording one estimation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    /// Data is flowing, or silence has not lasted long enough yet
    Alive { stale_cycles: u32 },
    /// The limit was reached on this cycle; reported exactly once
    Tripped,
    /// Already tripped earlier; nothing further to do
    Dead,
}

/// Counts consecutive cycles without a fresh reading.
///
/// Reaching the limit trips the monitor once. After that it stays dead and
/// stops counting.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    limit: u32,
    stale_cycles: u32,
    tripped: bool,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(STALE_CYCLE_LIMIT)
    }
}

impl LivenessMonitor {
    /// A limit of 0 is treated as 1: one silent cycle is the least that can trip.
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            stale_cycles: 0,
            tripped: false,
        }
    }

    /// Record one cycle; `fresh` says whether a new reading was available
    pub fn record(&mut self, fresh: bool) -> LivenessVerdict {
        if self.tripped {
            return LivenessVerdict::Dead;
        }

        if fresh {
            self.stale_cycles = 0;
            return LivenessVerdict::Alive { stale_cycles: 0 };
        }

        self.stale_cycles += 1;
        if self.stale_cycles >= self.limit {
            self.tripped = true;
            LivenessVerdict::Tripped
        } else {
            LivenessVerdict::Alive {
                stale_cycles: self.stale_cycles,
            }
        }
    }

    pub fn stale_cycles(&self) -> u32 {
        self.stale_cycles
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}
