//! Per-voxel inference results.

use crate::math::entropy;

/// Outcome of comparing all change hypotheses for one voxel.
///
/// Vectors are indexed like [`ChangeModel::hypothesis_names`]: candidates in
/// model order, preceded by the "no change" hypothesis when it was included.
///
/// [`ChangeModel::hypothesis_names`]: crate::change_model::ChangeModel::hypothesis_names
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelInference {
    /// ln p(Δ | H) per hypothesis.
    pub log_evidence: Vec<f64>,
    /// Posterior probability per hypothesis; sums to 1.
    pub posterior: Vec<f64>,
    /// Most probable change amount per hypothesis (0 for "no change").
    pub amounts: Vec<f64>,
    /// Index of the hypothesis with the highest posterior probability.
    pub best: usize,
}

impl VoxelInference {
    /// Shannon entropy of the posterior, in nats.
    pub fn entropy(&self) -> f64 {
        entropy(&self.posterior)
    }

    /// Posterior probability of the best hypothesis.
    pub fn best_probability(&self) -> f64 {
        self.posterior[self.best]
    }

    /// Number of hypotheses compared.
    pub fn len(&self) -> usize {
        self.posterior.len()
    }

    /// `true` when no hypotheses were compared.
    pub fn is_empty(&self) -> bool {
        self.posterior.is_empty()
    }
}
