//! Single-slot cells shared between the reader, the estimation loop and callers

use crate::core::{DistanceReading, TagPosition};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Slot {
    latest: Option<DistanceReading>,
    fresh: bool,
    writes: u64,
}

/// Latest-value cell holding at most one [`DistanceReading`].
///
/// Writes always overwrite; a reading that is replaced before anyone takes it
/// is lost. The whole reading sits behind one mutex so a taker never sees the
/// distances of one frame paired with the tag id of another.
#[derive(Debug, Default)]
pub struct ReadingStore {
    slot: Mutex<Slot>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicking writer cannot leave a half-written Copy value behind.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a new reading, replacing whatever was there
    pub fn put(&self, reading: DistanceReading) {
        let mut slot = self.lock();
        slot.latest = Some(reading);
        slot.fresh = true;
        slot.writes += 1;
    }

    /// Take the newest reading if one arrived since the previous take
    pub fn take_latest(&self) -> Option<DistanceReading> {
        let mut slot = self.lock();
        if slot.fresh {
            slot.fresh = false;
            slot.latest
        } else {
            None
        }
    }

    /// Newest reading ever stored, without consuming it
    pub fn peek(&self) -> Option<DistanceReading> {
        self.lock().latest
    }

    /// Total number of readings published
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }
}

/// Holds the most recent position estimate
#[derive(Debug, Default)]
pub struct PositionCell {
    latest: Mutex<Option<TagPosition>>,
}

impl PositionCell {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<TagPosition>> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, position: TagPosition) {
        *self.lock() = Some(position);
    }

    /// Latest estimate, or `None` before the first fix
    pub fn get(&self) -> Option<TagPosition> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn reading(d: f64, tag: u8) -> DistanceReading {
        DistanceReading::new(&[d, d, d], tag).unwrap()
    }

    #[test]
    fn test_empty_store() {
        let store = ReadingStore::new();
        assert!(store.take_latest().is_none());
        assert!(store.peek().is_none());
    }

    #[test]
    fn test_take_consumes_freshness() {
        let store = ReadingStore::new();
        store.put(reading(1.0, 1));

        assert_eq!(store.take_latest(), Some(reading(1.0, 1)));
        assert!(store.take_latest().is_none());
        // The value itself is still visible for diagnostics
        assert_eq!(store.peek(), Some(reading(1.0, 1)));
    }

    #[test]
    fn test_last_write_wins() {
        let store = ReadingStore::new();
        store.put(reading(1.0, 1));
        store.put(reading(2.0, 2));

        assert_eq!(store.take_latest(), Some(reading(2.0, 2)));
        assert!(store.take_latest().is_none());
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_concurrent_readings_are_never_torn() {
        let store = Arc::new(ReadingStore::new());
        let writer_store = Arc::clone(&store);

        let writer = thread::spawn(move || {
            for i in 1..=2000u32 {
                let tag = (i % 250) as u8 + 1;
                writer_store.put(reading(f64::from(tag), tag));
            }
        });

        let mut seen = 0;
        while !writer.is_finished() || seen == 0 {
            if let Some(r) = store.take_latest() {
                // Every distance in a reading was written together with its tag
                assert!(r.distances().iter().all(|&d| d == f64::from(r.tag_id)));
                seen += 1;
            }
        }
        writer.join().unwrap();
        assert!(seen > 0);
    }

    #[test]
    fn test_position_cell() {
        let cell = PositionCell::new();
        assert!(cell.get().is_none());

        let position = TagPosition { x: 1.0, y: -2.0, tag_id: 3 };
        cell.set(position);
        assert_eq!(cell.get(), Some(position));
    }
}
