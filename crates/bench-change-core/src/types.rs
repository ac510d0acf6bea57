//! Type aliases and common types.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{DimensionMismatch, NumericalError};

/// Dynamically sized column vector. Summary dimensionality is protocol dependent.
pub type Vector = DVector<f64>;

/// Dynamically sized matrix.
pub type Matrix = DMatrix<f64>;

/// Row-major matrix storage used in persisted artifacts.
///
/// Keeps the on-disk layout independent of nalgebra's own serde format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row-major entries, `rows * cols` long.
    pub data: Vec<f64>,
}

impl StoredMatrix {
    /// Rebuild the nalgebra matrix.
    ///
    /// Returns `None` when `data` does not hold `rows * cols` entries.
    pub fn to_matrix(&self) -> Option<Matrix> {
        (self.data.len() == self.rows * self.cols)
            .then(|| Matrix::from_row_slice(self.rows, self.cols, &self.data))
    }
}

impl From<&Matrix> for StoredMatrix {
    fn from(m: &Matrix) -> Self {
        let mut data = Vec::with_capacity(m.nrows() * m.ncols());
        for row in m.row_iter() {
            data.extend(row.iter().copied());
        }
        Self {
            rows: m.nrows(),
            cols: m.ncols(),
            data,
        }
    }
}

/// Group-level observation for one voxel.
///
/// Produced externally by the group linear model: the baseline summary
/// vector S₀, the between-group change Δ and the noise covariance Σ of Δ.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Baseline summary vector (first group mean).
    pub baseline: Vector,
    /// Observed change in the summary vector.
    pub delta: Vector,
    /// Noise covariance of `delta`.
    pub covariance: Matrix,
}

impl Observation {
    /// Create an observation, checking that all three parts share one dimension.
    pub fn new(baseline: Vector, delta: Vector, covariance: Matrix) -> Result<Self, DimensionMismatch> {
        let dim = baseline.len();
        DimensionMismatch::check("delta", dim, delta.len())?;
        DimensionMismatch::check("covariance rows", dim, covariance.nrows())?;
        DimensionMismatch::check("covariance columns", dim, covariance.ncols())?;
        Ok(Self {
            baseline,
            delta,
            covariance,
        })
    }

    /// Summary-vector dimensionality.
    pub fn dim(&self) -> usize {
        self.baseline.len()
    }

    /// Reject observations containing NaN or infinity.
    pub fn check_finite(&self) -> Result<(), NumericalError> {
        let finite = self.baseline.iter().all(|v| v.is_finite())
            && self.delta.iter().all(|v| v.is_finite())
            && self.covariance.iter().all(|v| v.is_finite());
        if finite {
            Ok(())
        } else {
            Err(NumericalError::NonFiniteInput)
        }
    }
}
