//! Log-Cholesky parameterisation of covariance matrices.
//!
//! A covariance Σ = LLᵀ is stored as the row-major lower triangle of L with
//! the diagonal replaced by its logarithm. Any real vector of the right
//! length maps back to a symmetric positive-definite matrix, which makes the
//! representation safe to regress on.

use crate::types::Matrix;

/// Number of packed entries for a `dim × dim` matrix.
#[inline]
pub fn tril_len(dim: usize) -> usize {
    dim * (dim + 1) / 2
}

/// Inverse of [`tril_len`]; `None` if `len` is not triangular.
pub fn dim_from_tril_len(len: usize) -> Option<usize> {
    let dim = ((((8 * len + 1) as f64).sqrt() - 1.0) / 2.0).round() as usize;
    (tril_len(dim) == len).then_some(dim)
}

/// Pack a lower-triangular Cholesky factor with log-transformed diagonal.
pub fn pack_log_cholesky(l: &Matrix) -> Vec<f64> {
    let dim = l.nrows();
    let mut out = Vec::with_capacity(tril_len(dim));
    for i in 0..dim {
        for j in 0..=i {
            out.push(if i == j { l[(i, i)].ln() } else { l[(i, j)] });
        }
    }
    out
}

/// Rebuild Σ = LLᵀ from a packed log-Cholesky vector of dimension `dim`.
pub fn unpack_log_cholesky(packed: &[f64], dim: usize) -> Matrix {
    let mut l = Matrix::zeros(dim, dim);
    let mut k = 0;
    for i in 0..dim {
        for j in 0..=i {
            l[(i, j)] = if i == j { packed[k].exp() } else { packed[k] };
            k += 1;
        }
    }
    &l * l.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Cholesky;

    #[test]
    fn test_tril_lengths() {
        for dim in 1..10 {
            assert_eq!(dim_from_tril_len(tril_len(dim)), Some(dim));
        }
        assert_eq!(dim_from_tril_len(4), None);
    }

    #[test]
    fn test_pack_unpack_recovers_covariance() {
        let sigma = Matrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0]);
        let l = Cholesky::new(sigma.clone()).unwrap().l();
        let packed = pack_log_cholesky(&l);
        assert_eq!(packed.len(), 6);
        let back = unpack_log_cholesky(&packed, 3);
        assert!((back - sigma).abs().max() < 1e-12);
    }

    #[test]
    fn test_arbitrary_vector_maps_to_spd() {
        let packed = [-3.0, 7.5, 0.4, -2.0, 1.0, -9.0];
        let sigma = unpack_log_cholesky(&packed, 3);
        assert!(Cholesky::new(sigma).is_some());
    }
}
