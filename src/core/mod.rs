//! Core types and constants for the UWB localization system

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
