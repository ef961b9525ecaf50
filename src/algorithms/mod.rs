//! Positioning algorithms

pub mod multilateration;
pub mod liveness;

pub use multilateration::{Multilateration, SolveError, linear_system, residual_sum_of_squares};
pub use liveness::{LivenessMonitor, LivenessVerdict};
