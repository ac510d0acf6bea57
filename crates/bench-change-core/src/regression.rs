//! Polynomial ridge regression from baseline summaries to change responses.
//!
//! Inputs are standardised per column, expanded into every monomial up to the
//! configured total degree, and fitted by solving the ridge normal equations
//! `(XᵀX + αD) β = XᵀY` with a Cholesky factorisation. The intercept column is
//! not penalised. One fit produces all output columns at once.

use nalgebra::Cholesky;
use serde::{Deserialize, Serialize};

use crate::error::{DimensionMismatch, NumericalError};
use crate::types::{Matrix, StoredMatrix, Vector};

/// Fitted multi-output polynomial ridge regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialRidge {
    /// Maximum total degree of the monomials.
    pub degree: u32,
    /// Ridge penalty applied to every non-intercept coefficient.
    pub alpha: f64,
    /// Per-input mean used for standardisation.
    pub input_mean: Vec<f64>,
    /// Per-input scale used for standardisation.
    pub input_scale: Vec<f64>,
    /// Exponent of each input in each monomial, in graded order.
    pub exponents: Vec<Vec<u32>>,
    /// `n_features × n_outputs` coefficient matrix.
    pub coefficients: StoredMatrix,
}

impl PolynomialRidge {
    /// Fit the regression to `inputs` (`n × d`) and `targets` (`n × m`).
    ///
    /// # Arguments
    ///
    /// * `inputs` - One training sample per row
    /// * `targets` - Matching rows of regression targets
    /// * `degree` - Maximum total monomial degree
    /// * `alpha` - Ridge penalty
    pub fn fit(
        inputs: &Matrix,
        targets: &Matrix,
        degree: u32,
        alpha: f64,
    ) -> Result<Self, NumericalError> {
        let n = inputs.nrows();
        if n == 0 || targets.nrows() != n {
            return Err(NumericalError::RegressionFit);
        }
        if inputs.iter().chain(targets.iter()).any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFiniteInput);
        }

        let d = inputs.ncols();
        let mut input_mean = Vec::with_capacity(d);
        let mut input_scale = Vec::with_capacity(d);
        for col in inputs.column_iter() {
            let mean = col.mean();
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let scale = var.sqrt();
            input_mean.push(mean);
            input_scale.push(if scale > f64::EPSILON * mean.abs().max(1.0) {
                scale
            } else {
                1.0
            });
        }

        let exponents = monomial_exponents(d, degree);
        let mut design = Matrix::zeros(n, exponents.len());
        for (i, row) in inputs.row_iter().enumerate() {
            let z: Vec<f64> = row
                .iter()
                .zip(input_mean.iter().zip(&input_scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect();
            for (j, powers) in exponents.iter().enumerate() {
                design[(i, j)] = monomial(&z, powers);
            }
        }

        let mut gram = design.tr_mul(&design);
        // Column 0 is the intercept
        for j in 1..gram.nrows() {
            gram[(j, j)] += alpha;
        }
        let rhs = design.tr_mul(targets);

        let chol = Cholesky::new(gram).ok_or(NumericalError::RegressionFit)?;
        let beta = chol.solve(&rhs);
        if beta.iter().any(|v| !v.is_finite()) {
            return Err(NumericalError::RegressionFit);
        }

        Ok(Self {
            degree,
            alpha,
            input_mean,
            input_scale,
            exponents,
            coefficients: StoredMatrix::from(&beta),
        })
    }

    /// A degree-0 regression that predicts `outputs` for every input.
    pub fn constant(n_inputs: usize, outputs: &[f64]) -> Self {
        Self {
            degree: 0,
            alpha: 0.0,
            input_mean: vec![0.0; n_inputs],
            input_scale: vec![1.0; n_inputs],
            exponents: vec![vec![0; n_inputs]],
            coefficients: StoredMatrix {
                rows: 1,
                cols: outputs.len(),
                data: outputs.to_vec(),
            },
        }
    }

    /// Number of input columns.
    pub fn n_inputs(&self) -> usize {
        self.input_mean.len()
    }

    /// Number of output columns.
    pub fn n_outputs(&self) -> usize {
        self.coefficients.cols
    }

    /// Predict every output for one input vector.
    pub fn predict(&self, input: &Vector) -> Result<Vector, DimensionMismatch> {
        DimensionMismatch::check("regression input", self.n_inputs(), input.len())?;
        let z: Vec<f64> = input
            .iter()
            .zip(self.input_mean.iter().zip(&self.input_scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect();

        let cols = self.coefficients.cols;
        let mut out = Vector::zeros(cols);
        for (j, powers) in self.exponents.iter().enumerate() {
            let f = monomial(&z, powers);
            let row = &self.coefficients.data[j * cols..(j + 1) * cols];
            for (o, c) in out.iter_mut().zip(row) {
                *o += f * c;
            }
        }
        Ok(out)
    }
}

fn monomial(z: &[f64], powers: &[u32]) -> f64 {
    z.iter()
        .zip(powers)
        .filter(|&(_, &p)| p > 0)
        .map(|(x, &p)| x.powi(p as i32))
        .product()
}

/// All exponent tuples over `n_inputs` variables with total degree `<= degree`.
///
/// Ordered by total degree, then lexicographically descending, so the first
/// entry is always the intercept.
pub fn monomial_exponents(n_inputs: usize, degree: u32) -> Vec<Vec<u32>> {
    fn fill(remaining: u32, slot: usize, current: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
        if slot + 1 == current.len() {
            current[slot] = remaining;
            out.push(current.clone());
            return;
        }
        for p in (0..=remaining).rev() {
            current[slot] = p;
            fill(remaining - p, slot + 1, current, out);
        }
        current[slot] = 0;
    }

    let mut out = Vec::new();
    if n_inputs == 0 {
        out.push(Vec::new());
        return out;
    }
    let mut current = vec![0; n_inputs];
    for total in 0..=degree {
        fill(total, 0, &mut current, &mut out);
    }
    out
}
