//! Configuration and logging

pub mod config;
pub mod logging;

pub use config::{LocalizationConfig, ConfigError};
pub use logging::{LogLevel, init_logging};
