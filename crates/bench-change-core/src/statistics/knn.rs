//! Local moments of empirical sensitivities via k nearest neighbours.
//!
//! For every training sample, the sensitivities of its k nearest neighbours
//! in baseline-summary space give a local mean (the expected change per unit
//! parameter change) and a local covariance (how much that change varies
//! among voxels that look alike). Both become regression targets.

use nalgebra::Cholesky;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::NumericalError;
use crate::types::Matrix;

use super::kdtree::KdTree;
use super::tril::{pack_log_cholesky, tril_len};

/// Per-sample local mean and packed log-Cholesky covariance.
#[derive(Debug, Clone)]
pub struct LocalMoments {
    /// `n × d` local mean sensitivities.
    pub mean: Matrix,
    /// `n × d(d+1)/2` packed log-Cholesky factors of the local covariance.
    pub log_cholesky: Matrix,
}

/// Indices of the `k` nearest rows of `points` (Euclidean) for every row.
///
/// Each row's own index is included. Neighbours are ordered by distance,
/// ties by index. `k` is clamped to the number of rows.
pub fn nearest_neighbours(points: &Matrix, k: usize) -> Vec<Vec<usize>> {
    let n = points.nrows();
    let k = k.clamp(1, n.max(1));
    let tree = KdTree::new(points);

    let query = |i: usize| -> Vec<usize> {
        let row: Vec<f64> = points.row(i).iter().copied().collect();
        tree.nearest(&row, k)
    };

    #[cfg(feature = "parallel")]
    let neighbours = (0..n).into_par_iter().map(query).collect();

    #[cfg(not(feature = "parallel"))]
    let neighbours = (0..n).map(query).collect();

    neighbours
}

/// Local mean and covariance of `values` rows over each neighbourhood.
///
/// `shrinkage` is added to the covariance diagonal so every local covariance
/// is positive definite, even for neighbourhoods of identical sensitivities.
pub fn local_moments(
    values: &Matrix,
    neighbours: &[Vec<usize>],
    shrinkage: f64,
) -> Result<LocalMoments, NumericalError> {
    let n = values.nrows();
    let dim = values.ncols();

    let moments = |i: usize| -> Result<(Vec<f64>, Vec<f64>), NumericalError> {
        let idx = &neighbours[i];
        let k = idx.len() as f64;

        let mut mean = vec![0.0; dim];
        for &j in idx {
            for (c, m) in mean.iter_mut().enumerate() {
                *m += values[(j, c)];
            }
        }
        mean.iter_mut().for_each(|m| *m /= k);

        let mut cov = Matrix::identity(dim, dim) * shrinkage;
        if idx.len() > 1 {
            for &j in idx {
                for a in 0..dim {
                    let da = values[(j, a)] - mean[a];
                    for b in 0..=a {
                        cov[(a, b)] += da * (values[(j, b)] - mean[b]) / (k - 1.0);
                    }
                }
            }
        }
        cov.fill_upper_triangle_with_lower_triangle();

        let chol = Cholesky::new(cov).ok_or(NumericalError::NotPositiveDefinite)?;
        Ok((mean, pack_log_cholesky(&chol.l())))
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<_> = (0..n).into_par_iter().map(moments).collect::<Result<_, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<_> = (0..n).map(moments).collect::<Result<_, _>>()?;

    let mut mean = Matrix::zeros(n, dim);
    let mut log_cholesky = Matrix::zeros(n, tril_len(dim));
    for (i, (m, l)) in rows.into_iter().enumerate() {
        for (c, v) in m.into_iter().enumerate() {
            mean[(i, c)] = v;
        }
        for (c, v) in l.into_iter().enumerate() {
            log_cholesky[(i, c)] = v;
        }
    }

    if mean.iter().chain(log_cholesky.iter()).any(|v| !v.is_finite()) {
        return Err(NumericalError::NonFiniteInput);
    }

    Ok(LocalMoments { mean, log_cholesky })
}
