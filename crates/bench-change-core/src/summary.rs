//! Reduction of raw measurement vectors to rotation-invariant summary vectors.
//!
//! The reduction is fixed per acquisition protocol and must be identical
//! between training and inference; it is recorded in the protocol
//! fingerprint of every trained model.

use nalgebra::Cholesky;
use serde::{Deserialize, Serialize};

use crate::acquisition::{Acquisition, Shell};
use crate::constants::MIN_DIRECTIONS_FOR_ANISOTROPY;
use crate::error::DimensionMismatch;
use crate::types::{Matrix, Vector};

/// Reduction from measurements to summary vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryReduction {
    /// Use the measurement vector as is.
    Identity,
    /// Per shell: the spherical mean signal and, for shells with enough
    /// directions, the norm of the anisotropic (l=2) part of a quadratic-form
    /// fit S(g) ≈ gᵀBg. Unweighted shells contribute the mean only.
    ShellInvariants,
}

impl SummaryReduction {
    /// Stable identifier used in fingerprints and log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::ShellInvariants => "shell_invariants",
        }
    }

    /// Precompute the per-shell projections for an acquisition.
    pub fn prepare(&self, acquisition: &Acquisition) -> PreparedReduction {
        let mut blocks = Vec::with_capacity(acquisition.shells().len());
        let mut offset = 0;
        for shell in acquisition.shells() {
            let len = shell.directions.len();
            let projector = match self {
                Self::Identity => None,
                Self::ShellInvariants => quadratic_form_projector(shell),
            };
            blocks.push(ShellBlock {
                offset,
                len,
                projector,
            });
            offset += len;
        }

        PreparedReduction {
            reduction: *self,
            n_measurements: offset,
            blocks,
        }
    }
}

/// A summary reduction bound to one acquisition.
#[derive(Debug, Clone)]
pub struct PreparedReduction {
    reduction: SummaryReduction,
    n_measurements: usize,
    blocks: Vec<ShellBlock>,
}

#[derive(Debug, Clone)]
struct ShellBlock {
    offset: usize,
    len: usize,
    /// Least-squares projector (6 × len) onto the quadratic-form coefficients
    /// [Bxx, Byy, Bzz, Bxy, Bxz, Byz]; `None` when only the mean is reported.
    projector: Option<Matrix>,
}

impl PreparedReduction {
    /// Length of the summary vector this reduction produces.
    pub fn dim(&self) -> usize {
        match self.reduction {
            SummaryReduction::Identity => self.n_measurements,
            SummaryReduction::ShellInvariants => self
                .blocks
                .iter()
                .map(|b| if b.projector.is_some() { 2 } else { 1 })
                .sum(),
        }
    }

    /// Number of raw measurements expected as input.
    pub fn n_measurements(&self) -> usize {
        self.n_measurements
    }

    /// Reduce one measurement vector.
    pub fn reduce(&self, measurement: &Vector) -> Result<Vector, DimensionMismatch> {
        DimensionMismatch::check("measurement", self.n_measurements, measurement.len())?;

        if self.reduction == SummaryReduction::Identity {
            return Ok(measurement.clone());
        }

        let mut out = Vec::with_capacity(self.dim());
        for block in &self.blocks {
            let signal = measurement.rows(block.offset, block.len);
            match &block.projector {
                None => out.push(signal.mean()),
                Some(projector) => {
                    let b = projector * signal;
                    let mean = (b[0] + b[1] + b[2]) / 3.0;
                    let aniso = ((b[0] - mean).powi(2)
                        + (b[1] - mean).powi(2)
                        + (b[2] - mean).powi(2)
                        + 2.0 * (b[3] * b[3] + b[4] * b[4] + b[5] * b[5]))
                        .sqrt();
                    out.push(mean);
                    out.push(aniso);
                }
            }
        }
        Ok(Vector::from_vec(out))
    }
}

/// Least-squares projector for S(g) = gᵀBg, or `None` when the shell cannot
/// support the fit.
fn quadratic_form_projector(shell: &Shell) -> Option<Matrix> {
    if shell.is_unweighted() || shell.directions.len() < MIN_DIRECTIONS_FOR_ANISOTROPY {
        return None;
    }

    let n = shell.directions.len();
    let mut design = Matrix::zeros(n, 6);
    for (i, g) in shell.directions.iter().enumerate() {
        design[(i, 0)] = g[0] * g[0];
        design[(i, 1)] = g[1] * g[1];
        design[(i, 2)] = g[2] * g[2];
        design[(i, 3)] = 2.0 * g[0] * g[1];
        design[(i, 4)] = 2.0 * g[0] * g[2];
        design[(i, 5)] = 2.0 * g[1] * g[2];
    }

    let gram = design.transpose() * &design;
    let chol = Cholesky::new(gram)?;
    Some(chol.solve(&design.transpose()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passes_through() {
        let acq = Acquisition::multi_shell(&[0.0, 1.0], 8);
        let prepared = SummaryReduction::Identity.prepare(&acq);
        assert_eq!(prepared.dim(), 9);
        let m = Vector::from_fn(9, |i, _| i as f64);
        assert_eq!(prepared.reduce(&m).unwrap(), m);
    }

    #[test]
    fn test_shell_invariants_dimension() {
        let acq = Acquisition::multi_shell(&[0.0, 1.0, 2.0, 3.0], 32);
        let prepared = SummaryReduction::ShellInvariants.prepare(&acq);
        // b=0 mean + 3 × (mean, anisotropy)
        assert_eq!(prepared.dim(), 7);
    }

    #[test]
    fn test_sparse_shell_reports_mean_only() {
        let acq = Acquisition::multi_shell(&[1.0], 4);
        let prepared = SummaryReduction::ShellInvariants.prepare(&acq);
        assert_eq!(prepared.dim(), 1);
        let m = Vector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        assert!((prepared.reduce(&m).unwrap()[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_isotropic_signal_has_zero_anisotropy() {
        let acq = Acquisition::multi_shell(&[2.0], 40);
        let prepared = SummaryReduction::ShellInvariants.prepare(&acq);
        let m = Vector::from_element(40, 0.3);
        let s = prepared.reduce(&m).unwrap();
        assert!((s[0] - 0.3).abs() < 1e-10);
        assert!(s[1].abs() < 1e-10);
    }

    #[test]
    fn test_quadratic_form_is_rotation_invariant() {
        // S(g) = gᵀBg for a tensor along z, then along x: same invariants
        let acq = Acquisition::multi_shell(&[1.0], 60);
        let prepared = SummaryReduction::ShellInvariants.prepare(&acq);
        let along = |axis: usize| {
            Vector::from_iterator(
                60,
                acq.measurements()
                    .map(|(_, g)| 0.2 + 0.5 * g[axis] * g[axis]),
            )
        };
        let sz = prepared.reduce(&along(2)).unwrap();
        let sx = prepared.reduce(&along(0)).unwrap();
        assert!((sz[0] - sx[0]).abs() < 1e-9);
        assert!((sz[1] - sx[1]).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_measurement_length() {
        let acq = Acquisition::multi_shell(&[1.0], 10);
        let prepared = SummaryReduction::ShellInvariants.prepare(&acq);
        let err = prepared.reduce(&Vector::zeros(9)).unwrap_err();
        assert_eq!(err.expected, 10);
        assert_eq!(err.actual, 9);
    }
}
