//! Wire-format constants and system parameters

use std::time::Duration;

/// Baud rate of the UWB module's serial link in the reference deployment
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default serial device path
pub const DEFAULT_PORT_PATH: &str = "/dev/ttyUSB0";

/// Length of one distance frame, including its line terminator
pub const FRAME_LEN: usize = 16;

/// Offset of the raw tag identifier byte
pub const TAG_ID_OFFSET: usize = 4;

/// Raw tag byte reported by the master tag
pub const MASTER_TAG_SENTINEL: u8 = 0x0f;

/// Offset of the first anchor distance; each anchor occupies two bytes after it
pub const DISTANCE_OFFSET: usize = 7;

/// Distances are transmitted in centimeters
pub const DISTANCE_SCALE: f64 = 100.0;

/// Anchors needed for a 2-D fix
pub const MIN_ANCHORS: usize = 3;

/// Anchor slots available in a frame
pub const MAX_ANCHORS: usize = 4;

/// Nominal period of the estimation loop
pub const ESTIMATION_PERIOD: Duration = Duration::from_millis(10);

/// Longest accepted estimation period
pub const MAX_ESTIMATION_PERIOD: Duration = Duration::from_secs(60);

/// Consecutive stale cycles before the session is declared dead
pub const STALE_CYCLE_LIMIT: u32 = 200;

/// Anchor layout used when the caller configures none, in meters
pub const DEFAULT_ANCHOR_LAYOUT: [(f64, f64); 3] = [(0.0, 0.0), (-0.5, 3.65), (-4.34, 1.13)];
