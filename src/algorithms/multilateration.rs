//! Linear least-squares multilateration in the plane
//!
//! Subtracting the range equation of the reference anchor (the last one) from
//! that of every other anchor removes the `x² + y²` term and leaves the linear
//! system `A·p = b` with
//!
//! - row i of A: `2·(anchor_i − anchor_ref)`
//! - entry i of b: `‖anchor_i‖² − ‖anchor_ref‖² + d_ref² − d_i²`
//!
//! solved through the normal equations `p = (AᵗA)⁻¹ Aᵗ b`. With three anchors
//! the system is square and the solve is exact; a fourth anchor turns it into a
//! genuine least-squares fit.

use crate::core::{AnchorSet, DistanceReading, Point2, TagPosition, MIN_ANCHORS};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Smallest acceptable ratio between the singular values of AᵗA
pub const MIN_RECIPROCAL_CONDITION: f64 = 1e-10;

/// Multilateration failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("Insufficient anchors: {available} available, {required} required")]
    InsufficientAnchors { available: usize, required: usize },
    #[error("Got {distances} distances for {anchors} anchors")]
    DistanceCountMismatch { anchors: usize, distances: usize },
    #[error("Invalid distance {value} for anchor {index}")]
    InvalidDistance { index: usize, value: f64 },
    #[error("Degenerate anchor geometry (condition number {condition_number:e})")]
    DegenerateGeometry { condition_number: f64 },
    #[error("Numerical failure: {details}")]
    NumericalFailure { details: String },
}

/// Least-squares multilateration engine
#[derive(Debug, Clone)]
pub struct Multilateration {
    /// Solves whose AᵗA has `σ_min / σ_max` below this are rejected
    pub min_reciprocal_condition: f64,
}

impl Default for Multilateration {
    fn default() -> Self {
        Self {
            min_reciprocal_condition: MIN_RECIPROCAL_CONDITION,
        }
    }
}

/// Build the linearized system for `anchors` and `distances`
pub fn linear_system(
    anchors: &AnchorSet,
    distances: &[f64],
) -> Result<(DMatrix<f64>, DVector<f64>), SolveError> {
    let n = anchors.len();
    if n < MIN_ANCHORS {
        return Err(SolveError::InsufficientAnchors {
            available: n,
            required: MIN_ANCHORS,
        });
    }
    if distances.len() != n {
        return Err(SolveError::DistanceCountMismatch {
            anchors: n,
            distances: distances.len(),
        });
    }
    if let Some((index, &value)) = distances
        .iter()
        .enumerate()
        .find(|(_, d)| !d.is_finite() || **d < 0.0)
    {
        return Err(SolveError::InvalidDistance { index, value });
    }

    let positions = anchors.as_slice();
    let reference = positions[n - 1];
    let d_ref = distances[n - 1];

    let mut a_matrix = DMatrix::zeros(n - 1, 2);
    let mut b_vector = DVector::zeros(n - 1);

    for (row, (anchor, d)) in positions.iter().zip(distances).take(n - 1).enumerate() {
        a_matrix[(row, 0)] = 2.0 * (anchor.x - reference.x);
        a_matrix[(row, 1)] = 2.0 * (anchor.y - reference.y);
        b_vector[row] = anchor.norm_squared() - reference.norm_squared() + d_ref.powi(2) - d.powi(2);
    }

    Ok((a_matrix, b_vector))
}

/// Sum of squared residuals `‖A·p − b‖²` of `point` against the full system
pub fn residual_sum_of_squares(
    anchors: &AnchorSet,
    distances: &[f64],
    point: Point2,
) -> Result<f64, SolveError> {
    let (a_matrix, b_vector) = linear_system(anchors, distances)?;
    let p = DVector::from_column_slice(&[point.x, point.y]);
    Ok((a_matrix * p - b_vector).norm_squared())
}

impl Multilateration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition number of AᵗA for the given layout; infinite when singular.
    /// Depends only on anchor geometry, not on the measured distances.
    pub fn condition_number(&self, anchors: &AnchorSet) -> Result<f64, SolveError> {
        let zeros = vec![0.0; anchors.len()];
        let (a_matrix, _) = linear_system(anchors, &zeros)?;
        Ok(Self::normal_condition(&(a_matrix.transpose() * &a_matrix)))
    }

    /// Reject layouts the solver could never produce a position for
    pub fn check_geometry(&self, anchors: &AnchorSet) -> Result<f64, SolveError> {
        let condition_number = self.condition_number(anchors)?;
        self.ensure_conditioned(condition_number)?;
        Ok(condition_number)
    }

    fn ensure_conditioned(&self, condition_number: f64) -> Result<(), SolveError> {
        if !condition_number.is_finite() || condition_number.recip() < self.min_reciprocal_condition {
            return Err(SolveError::DegenerateGeometry { condition_number });
        }
        Ok(())
    }

    fn normal_condition(ata: &DMatrix<f64>) -> f64 {
        let singular_values = ata.clone().svd(false, false).singular_values;
        let largest = singular_values.max();
        let smallest = singular_values.min();
        if smallest > 0.0 && largest.is_finite() {
            largest / smallest
        } else {
            f64::INFINITY
        }
    }

    /// Estimate the tag position from one distance per anchor
    pub fn solve(&self, anchors: &AnchorSet, distances: &[f64]) -> Result<Point2, SolveError> {
        let (a_matrix, b_vector) = linear_system(anchors, distances)?;

        let a_t = a_matrix.transpose();
        let ata = &a_t * &a_matrix;
        let atb = &a_t * &b_vector;

        let condition_number = Self::normal_condition(&ata);
        self.ensure_conditioned(condition_number)?;

        let inverse = ata.try_inverse().ok_or(SolveError::DegenerateGeometry {
            condition_number,
        })?;
        let solution = inverse * atb;

        if !solution.iter().all(|v| v.is_finite()) {
            return Err(SolveError::NumericalFailure {
                details: format!("non-finite solution {:?}", solution.as_slice()),
            });
        }

        Ok(Point2::new(solution[0], solution[1]))
    }

    /// Solve for a decoded reading, tagging the result with its tag id
    pub fn solve_reading(
        &self,
        anchors: &AnchorSet,
        reading: &DistanceReading,
    ) -> Result<TagPosition, SolveError> {
        self.solve(anchors, reading.distances())
            .map(|point| TagPosition::new(point, reading.tag_id))
    }
}
