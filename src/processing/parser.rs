use crate::core::{
    DistanceReading, TagId, DISTANCE_OFFSET, DISTANCE_SCALE, FRAME_LEN, MASTER_TAG_SENTINEL,
    MAX_ANCHORS, MIN_ANCHORS, TAG_ID_OFFSET,
};
use crate::hardware::RawMessage;
use thiserror::Error;

/// Errors that can occur while decoding a distance frame
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Frame length {actual}, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
    #[error("Unsupported anchor count {count}")]
    UnsupportedAnchorCount { count: usize },
}

/// Combine a (high, low) byte pair into meters
pub fn decode_distance(high: u8, low: u8) -> f64 {
    (f64::from(high) * 256.0 + f64::from(low)) / DISTANCE_SCALE
}

/// Map the raw tag byte to a logical tag id (0 for the master tag)
pub fn decode_tag_id(raw: u8) -> TagId {
    if raw == MASTER_TAG_SENTINEL {
        0
    } else {
        raw
    }
}

/// Byte offsets of anchor `index`'s (low, high) distance pair.
///
/// The module sends each distance least-significant byte first.
fn distance_offsets(index: usize) -> (usize, usize) {
    let low = DISTANCE_OFFSET + 2 * index;
    (low, low + 1)
}

/// Decodes fixed-length distance frames from the UWB module
#[derive(Debug, Clone)]
pub struct FrameParser {
    anchor_count: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self {
            anchor_count: MIN_ANCHORS,
        }
    }
}

impl FrameParser {
    /// Create a parser that extracts one distance per configured anchor
    pub fn new(anchor_count: usize) -> Result<Self, ParseError> {
        if !(MIN_ANCHORS..=MAX_ANCHORS).contains(&anchor_count) {
            return Err(ParseError::UnsupportedAnchorCount {
                count: anchor_count,
            });
        }
        Ok(Self { anchor_count })
    }

    pub fn anchor_count(&self) -> usize {
        self.anchor_count
    }

    /// Parse a raw line into a distance reading
    pub fn parse_message(&self, raw: &RawMessage) -> Result<DistanceReading, ParseError> {
        self.parse_frame(&raw.data)
    }

    pub fn parse_frame(&self, data: &[u8]) -> Result<DistanceReading, ParseError> {
        if data.len() != FRAME_LEN {
            return Err(ParseError::WrongLength {
                expected: FRAME_LEN,
                actual: data.len(),
            });
        }

        let mut distances = [0.0; MAX_ANCHORS];
        for (index, slot) in distances.iter_mut().take(self.anchor_count).enumerate() {
            let (low, high) = distance_offsets(index);
            *slot = decode_distance(data[high], data[low]);
        }

        let tag_id = decode_tag_id(data[TAG_ID_OFFSET]);
        DistanceReading::new(&distances[..self.anchor_count], tag_id).ok_or(
            ParseError::UnsupportedAnchorCount {
                count: self.anchor_count,
            },
        )
    }
}

/// Build the frame the module would send for `reading`.
///
/// Distances are rounded to whole centimeters and saturate at the 16-bit range.
/// The last byte is the line terminator.
pub fn encode_frame(reading: &DistanceReading) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];

    frame[TAG_ID_OFFSET] = if reading.tag_id == 0 {
        MASTER_TAG_SENTINEL
    } else {
        reading.tag_id
    };

    for (index, distance) in reading.distances().iter().enumerate() {
        let centimeters = (distance * DISTANCE_SCALE).round().clamp(0.0, f64::from(u16::MAX)) as u16;
        let [high, low] = centimeters.to_be_bytes();
        let (low_at, high_at) = distance_offsets(index);
        frame[low_at] = low;
        frame[high_at] = high;
    }

    frame[FRAME_LEN - 1] = b'\n';
    frame
}
