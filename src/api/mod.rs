//! Application-facing API
//!
//! [`LocalizationSystem`] is the entry point: configure anchors, start, poll
//! positions, stop. [`UwbState`] is the payload handed to the telemetry layer.

pub mod system;
pub mod telemetry;
pub mod types;

pub use system::LocalizationSystem;
pub use telemetry::{UwbState, PUBLISH_PERIOD};
pub use types::{ApiError, ApiResult, ShutdownReason, SystemState, SystemStatus};
