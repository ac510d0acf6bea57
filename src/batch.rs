//! Batch inference over voxels.
//!
//! Shapes and protocol compatibility are checked once for the whole batch
//! and abort it on mismatch. After that every voxel is independent: a voxel
//! outside the mask is skipped, and a voxel whose inputs are non-finite or
//! whose noise covariance is not positive definite is excluded without
//! affecting its siblings.

use bench_change_core::{
    infer_voxel, ChangeModel, DimensionMismatch, Matrix, NumericalError, Observation,
    ProtocolFingerprint, Vector, VoxelError, VoxelInference,
};
use tracing::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::artifact::ensure_compatible;
use crate::config::InferenceConfig;
use crate::error::{Error, Result};
use crate::progress::Progress;

/// Group-level observations for a set of voxels.
///
/// Row `i` of `baseline` and `delta` and `covariance[i]` belong to voxel `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBatch {
    /// Protocol the summaries were computed under.
    pub fingerprint: ProtocolFingerprint,
    /// `n_voxels × d` baseline summaries.
    pub baseline: Matrix,
    /// `n_voxels × d` observed changes.
    pub delta: Matrix,
    /// One `d × d` noise covariance per voxel.
    pub covariance: Vec<Matrix>,
    /// Voxels to evaluate; `false` entries are skipped.
    pub mask: Vec<bool>,
}

impl ObservationBatch {
    /// Create a batch, checking that all arrays agree in shape.
    pub fn new(
        fingerprint: ProtocolFingerprint,
        baseline: Matrix,
        delta: Matrix,
        covariance: Vec<Matrix>,
        mask: Vec<bool>,
    ) -> Result<Self> {
        let batch = Self {
            fingerprint,
            baseline,
            delta,
            covariance,
            mask,
        };
        batch.check_shapes()?;
        Ok(batch)
    }

    /// Batch with every voxel unmasked.
    pub fn unmasked(
        fingerprint: ProtocolFingerprint,
        baseline: Matrix,
        delta: Matrix,
        covariance: Vec<Matrix>,
    ) -> Result<Self> {
        let mask = vec![true; baseline.nrows()];
        Self::new(fingerprint, baseline, delta, covariance, mask)
    }

    /// Number of voxels.
    pub fn n_voxels(&self) -> usize {
        self.baseline.nrows()
    }

    /// Summary-vector dimensionality.
    pub fn summary_dim(&self) -> usize {
        self.baseline.ncols()
    }

    /// Observation for voxel `i`.
    pub fn observation(&self, i: usize) -> Observation {
        Observation {
            baseline: Vector::from_iterator(self.summary_dim(), self.baseline.row(i).iter().copied()),
            delta: Vector::from_iterator(self.summary_dim(), self.delta.row(i).iter().copied()),
            covariance: self.covariance[i].clone(),
        }
    }

    fn check_shapes(&self) -> std::result::Result<(), DimensionMismatch> {
        let n = self.n_voxels();
        let dim = self.summary_dim();
        DimensionMismatch::check("delta rows (voxels)", n, self.delta.nrows())?;
        DimensionMismatch::check("delta columns (summary)", dim, self.delta.ncols())?;
        DimensionMismatch::check("covariance count (voxels)", n, self.covariance.len())?;
        DimensionMismatch::check("mask length (voxels)", n, self.mask.len())?;
        for cov in &self.covariance {
            DimensionMismatch::check("covariance rows", dim, cov.nrows())?;
            DimensionMismatch::check("covariance columns", dim, cov.ncols())?;
        }
        Ok(())
    }
}

/// Outcome for one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelStatus {
    /// Inference succeeded.
    Valid,
    /// The voxel was outside the mask and not evaluated.
    Masked,
    /// The voxel could not be evaluated and is excluded from the maps.
    Invalid(NumericalError),
}

/// Voxel-indexed output maps.
///
/// Hypothesis order matches [`hypothesis_names`](Self::hypothesis_names),
/// which is the change model's candidate order (after the "no change"
/// hypothesis when it was requested). Masked and invalid voxels hold `NaN`
/// probabilities and amounts and no best index.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceMaps {
    /// Name of each hypothesis.
    pub hypothesis_names: Vec<String>,
    /// `posteriors[h][voxel]`.
    pub posteriors: Vec<Vec<f64>>,
    /// `amounts[h][voxel]`, the most probable change amount.
    pub amounts: Vec<Vec<f64>>,
    /// `log_evidence[h][voxel]`.
    pub log_evidence: Vec<Vec<f64>>,
    /// Best-explaining hypothesis per voxel.
    pub best: Vec<Option<usize>>,
    /// Status per voxel.
    pub statuses: Vec<VoxelStatus>,
    /// Voxels excluded for numerical failures.
    pub n_excluded: usize,
}

impl InferenceMaps {
    fn empty(hypothesis_names: Vec<String>, n_voxels: usize) -> Self {
        let n_hyp = hypothesis_names.len();
        Self {
            hypothesis_names,
            posteriors: vec![vec![f64::NAN; n_voxels]; n_hyp],
            amounts: vec![vec![f64::NAN; n_voxels]; n_hyp],
            log_evidence: vec![vec![f64::NAN; n_voxels]; n_hyp],
            best: vec![None; n_voxels],
            statuses: vec![VoxelStatus::Masked; n_voxels],
            n_excluded: 0,
        }
    }

    fn record(&mut self, voxel: usize, inference: &VoxelInference) {
        for h in 0..self.hypothesis_names.len() {
            self.posteriors[h][voxel] = inference.posterior[h];
            self.amounts[h][voxel] = inference.amounts[h];
            self.log_evidence[h][voxel] = inference.log_evidence[h];
        }
        self.best[voxel] = Some(inference.best);
        self.statuses[voxel] = VoxelStatus::Valid;
    }

    /// Number of voxels.
    pub fn n_voxels(&self) -> usize {
        self.statuses.len()
    }

    /// Number of voxels with valid results.
    pub fn n_valid(&self) -> usize {
        self.statuses.iter().filter(|s| **s == VoxelStatus::Valid).count()
    }

    /// Posterior probabilities of one voxel, if it is valid.
    pub fn voxel_posterior(&self, voxel: usize) -> Option<Vec<f64>> {
        (self.statuses[voxel] == VoxelStatus::Valid)
            .then(|| self.posteriors.iter().map(|p| p[voxel]).collect())
    }

    /// Change amounts of one voxel, if it is valid.
    pub fn voxel_amounts(&self, voxel: usize) -> Option<Vec<f64>> {
        (self.statuses[voxel] == VoxelStatus::Valid)
            .then(|| self.amounts.iter().map(|a| a[voxel]).collect())
    }
}

enum Outcome {
    Skipped,
    Done(VoxelInference),
    Failed(NumericalError),
}

/// Run inference for every voxel of `batch`.
///
/// # Errors
///
/// Fails before evaluating any voxel if the configuration is invalid, the
/// batch was produced under a different protocol than `model`, or its
/// summary dimension differs from the model's.
pub fn run_inference(
    model: &ChangeModel,
    batch: &ObservationBatch,
    config: &InferenceConfig,
) -> Result<InferenceMaps> {
    config.validate().map_err(Error::invalid_config)?;
    batch.check_shapes()?;
    ensure_compatible(model, &batch.fingerprint)?;
    DimensionMismatch::check("observation summary", model.summary_dim(), batch.summary_dim())?;

    let settings = config.settings();
    let n = batch.n_voxels();
    let progress = Progress::new(n, "inferring change");

    let evaluate = |i: usize| -> std::result::Result<Outcome, DimensionMismatch> {
        let outcome = if !batch.mask[i] {
            Outcome::Skipped
        } else {
            match infer_voxel(model, &batch.observation(i), &settings) {
                Ok(inference) => Outcome::Done(inference),
                Err(VoxelError::Numerical(e)) => Outcome::Failed(e),
                Err(VoxelError::Shape(e)) => return Err(e),
            }
        };
        progress.inc();
        Ok(outcome)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Outcome> = (0..n)
        .into_par_iter()
        .map(evaluate)
        .collect::<std::result::Result<_, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Outcome> = (0..n).map(evaluate).collect::<std::result::Result<_, _>>()?;

    progress.finish();

    let mut maps = InferenceMaps::empty(model.hypothesis_names(settings.include_null_hypothesis), n);
    for (voxel, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Outcome::Skipped => {}
            Outcome::Done(inference) => maps.record(voxel, &inference),
            Outcome::Failed(e) => {
                maps.statuses[voxel] = VoxelStatus::Invalid(e);
                maps.n_excluded += 1;
            }
        }
    }

    let n_masked = maps.statuses.iter().filter(|s| **s == VoxelStatus::Masked).count();
    if maps.n_excluded > 0 {
        warn!(
            n_excluded = maps.n_excluded,
            "Excluded voxels with invalid observations (non-finite or non-positive-definite covariance)"
        );
    }
    info!(
        n_voxels = n,
        n_valid = maps.n_valid(),
        n_masked,
        n_excluded = maps.n_excluded,
        "Inference complete"
    );
    Ok(maps)
}
