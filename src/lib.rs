//! UWB Tag Localization
//!
//! Reads anchor-to-tag distance frames from a UWB module over a serial link,
//! solves the tag's 2-D position by linear least squares and shuts the session
//! down when the module goes silent.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod utils;
pub mod hardware;
pub mod api;

// Re-export commonly used types
pub use core::{AnchorSet, DistanceReading, Point2, TagId, TagPosition};
pub use algorithms::{LivenessMonitor, Multilateration, SolveError};
pub use processing::{encode_frame, FrameParser, ParseError, ReadingStore};
pub use hardware::{
    CommError, CommResult, MockTransceiver, RawMessage, SerialTransceiver, TransceiverConfig,
    TransceiverInterface,
};
pub use api::{
    ApiError, ApiResult, LocalizationSystem, ShutdownReason, SystemState, SystemStatus, UwbState,
};
pub use utils::{init_logging, LocalizationConfig, LogLevel};
