//! Core data types for the localization system

use crate::core::constants::{DEFAULT_ANCHOR_LAYOUT, MAX_ANCHORS, MIN_ANCHORS};
use serde::{Deserialize, Serialize};

/// Point in the shared local frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Fixed-capacity, append-only list of anchor positions.
///
/// Anchors keep their declaration order: distance `i` of a reading always
/// belongs to anchor `i`, and the last anchor is the solver's reference.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorSet {
    positions: [Point2; MAX_ANCHORS],
    count: usize,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The deployment layout used when nothing else is configured
    pub fn default_layout() -> Self {
        let mut set = Self::new();
        for point in DEFAULT_ANCHOR_LAYOUT {
            set.push(point.into());
        }
        set
    }

    /// Append an anchor. Returns `false` and leaves the set untouched when full.
    pub fn push(&mut self, position: Point2) -> bool {
        if self.count >= MAX_ANCHORS {
            return false;
        }
        self.positions[self.count] = position;
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == MAX_ANCHORS
    }

    /// Whether enough anchors are present for a 2-D fix
    pub fn is_sufficient(&self) -> bool {
        self.count >= MIN_ANCHORS
    }

    pub fn as_slice(&self) -> &[Point2] {
        &self.positions[..self.count]
    }

    /// Reference anchor for the linearized system (the last one declared)
    pub fn reference(&self) -> Option<&Point2> {
        self.as_slice().last()
    }
}

/// Tag identifier as reported by the UWB module; 0 is the master tag
pub type TagId = u8;

/// Distances from one tag to each anchor, decoded from a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReading {
    distances: [f64; MAX_ANCHORS],
    count: usize,
    pub tag_id: TagId,
}

impl DistanceReading {
    /// Build a reading from per-anchor distances. Returns `None` when the
    /// slice is empty or longer than the frame can carry.
    pub fn new(distances: &[f64], tag_id: TagId) -> Option<Self> {
        if distances.is_empty() || distances.len() > MAX_ANCHORS {
            return None;
        }
        let mut slots = [0.0; MAX_ANCHORS];
        slots[..distances.len()].copy_from_slice(distances);
        Some(Self {
            distances: slots,
            count: distances.len(),
            tag_id,
        })
    }

    /// Exact distances from `tag` to every anchor in `anchors`
    pub fn from_geometry(anchors: &AnchorSet, tag: Point2, tag_id: TagId) -> Option<Self> {
        let distances: Vec<f64> = anchors.as_slice().iter().map(|a| a.distance_to(&tag)).collect();
        Self::new(&distances, tag_id)
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances[..self.count]
    }

    pub fn is_master(&self) -> bool {
        self.tag_id == 0
    }
}

/// Latest position estimate for a tag.
///
/// `TagPosition::default()` is the (0, 0, 0) placeholder reported before the
/// first fix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TagPosition {
    pub x: f64,
    pub y: f64,
    pub tag_id: TagId,
}

impl TagPosition {
    pub fn new(point: Point2, tag_id: TagId) -> Self {
        Self {
            x: point.x,
            y: point.y,
            tag_id,
        }
    }

    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_set_rejects_overflow() {
        let mut set = AnchorSet::new();
        for i in 0..MAX_ANCHORS {
            assert!(set.push(Point2::new(i as f64, 0.0)));
        }
        let before = set;
        assert!(!set.push(Point2::new(9.0, 9.0)));
        assert_eq!(set, before);
        assert!(set.is_full());
    }

    #[test]
    fn test_default_layout() {
        let set = AnchorSet::default_layout();
        assert_eq!(set.len(), 3);
        assert!(set.is_sufficient());
        assert_eq!(set.reference(), Some(&Point2::new(-4.34, 1.13)));
    }

    #[test]
    fn test_reading_bounds() {
        assert!(DistanceReading::new(&[], 0).is_none());
        assert!(DistanceReading::new(&[1.0; 5], 0).is_none());

        let reading = DistanceReading::new(&[1.0, 2.0, 3.0], 7).unwrap();
        assert_eq!(reading.distances(), &[1.0, 2.0, 3.0]);
        assert!(!reading.is_master());
    }

    #[test]
    fn test_placeholder_position() {
        let position = TagPosition::default();
        assert_eq!((position.x, position.y, position.tag_id), (0.0, 0.0, 0));
    }
}
