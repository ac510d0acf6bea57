//! Synthetic benchmark data and accuracy measures.
//!
//! Test samples are drawn from the same priors and forward model as the
//! training data. Each sample has a known true hypothesis, so a trained
//! change model can be scored against it.

use bench_change_core::statistics::counter_rng_seed;
use bench_change_core::{Direction, DimensionMismatch, Matrix, Vector};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::batch::{InferenceMaps, ObservationBatch, VoxelStatus};
use crate::error::{Error, Result};
use crate::trainer::Trainer;

/// Redraws allowed per sample before the effect size is declared too large.
const MAX_REDRAWS: usize = 1_000;

/// Simulated observations with known ground truth.
#[derive(Debug, Clone)]
pub struct TestSamples {
    /// True hypothesis per voxel, indexed like the inference output.
    ///
    /// With the "no change" hypothesis included, 0 means no change and
    /// `k` means candidate `k - 1`; otherwise `k` is candidate `k`.
    pub true_change: Vec<usize>,
    /// The observations.
    pub batch: ObservationBatch,
}

/// Accuracy of inference against known ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMeasures {
    /// Fraction of valid voxels whose best hypothesis is the true one.
    pub accuracy: f64,
    /// Mean posterior probability assigned to the true hypothesis.
    pub mean_true_posterior: f64,
    /// `confusion[true][predicted]` voxel counts.
    pub confusion: Vec<Vec<usize>>,
    /// Valid voxels the measures are computed over.
    pub n_evaluated: usize,
}

/// Simulate `n` observations with a known change.
///
/// Each sample picks its true hypothesis uniformly, draws baseline parameters
/// from the priors and moves them by `effect_size` along the hypothesis'
/// change vector (random sign for two-sided hypotheses, none for "no
/// change"). Parameters that leave the prior support are redrawn. Both
/// summaries receive independent Gaussian noise of standard deviation
/// `noise_level`, so the noise covariance of the change is `2·noise_level²·I`.
///
/// # Arguments
///
/// * `trainer` - Supplies the forward model, protocol, priors and hypotheses
/// * `n` - Number of samples
/// * `effect_size` - Amount of change along the unit change vector
/// * `noise_level` - Standard deviation of summary noise (must be positive)
/// * `include_null` - Whether "no change" is one of the true hypotheses
/// * `seed` - Random seed
pub fn generate_test_samples(
    trainer: &Trainer,
    n: usize,
    effect_size: f64,
    noise_level: f64,
    include_null: bool,
    seed: u64,
) -> Result<TestSamples> {
    trainer.validate()?;
    if !(noise_level > 0.0 && noise_level.is_finite()) {
        return Err(Error::invalid_config("noise_level must be positive"));
    }
    if !effect_size.is_finite() {
        return Err(Error::invalid_config("effect_size must be finite"));
    }

    let parameters = trainer.forward_model.parameter_names();
    let priors = trainer.priors.ordered_as(&parameters)?;
    let prepared = trainer.reduction.prepare(&trainer.acquisition);
    let dim = prepared.dim();
    let hypotheses = trainer
        .candidates
        .iter()
        .map(|c| Ok((c.vector.to_dense(&parameters)?, c.direction)))
        .collect::<std::result::Result<Vec<_>, bench_change_core::ConfigError>>()?;
    let offset = usize::from(include_null);
    let n_hypotheses = hypotheses.len() + offset;

    let simulate = |i: usize| -> Result<(usize, Vector, Vector)> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, i as u64));
        let truth = rng.random_range(0..n_hypotheses);

        let mut drawn = None;
        for _ in 0..MAX_REDRAWS {
            let before = priors.sample_vector(&mut rng);
            let after = if truth < offset {
                before.clone()
            } else {
                let (weights, direction) = &hypotheses[truth - offset];
                let sign = match direction {
                    Direction::Positive => 1.0,
                    Direction::Negative => -1.0,
                    Direction::TwoSided => {
                        if rng.random::<bool>() {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                };
                before
                    .iter()
                    .zip(weights)
                    .map(|(t, w)| (t + w * effect_size * sign).abs())
                    .collect()
            };
            if priors.supports(&after) {
                drawn = Some((before, after));
                break;
            }
        }
        let (before, after) = drawn.ok_or_else(|| {
            Error::invalid_config(format!(
                "effect size {} moves parameters outside the priors too often",
                effect_size
            ))
        })?;

        let mut noisy = |params: &[f64]| -> std::result::Result<Vector, DimensionMismatch> {
            let clean = prepared.reduce(&trainer.forward_model.simulate(params, &trainer.acquisition))?;
            Ok(clean.map(|v| v + noise_level * rng.sample::<f64, _>(StandardNormal)))
        };
        let s1 = noisy(&before)?;
        let s2 = noisy(&after)?;
        Ok((truth, s1.clone(), s2 - s1))
    };

    #[cfg(feature = "parallel")]
    let samples: Vec<(usize, Vector, Vector)> = (0..n).into_par_iter().map(simulate).collect::<Result<_>>()?;

    #[cfg(not(feature = "parallel"))]
    let samples: Vec<(usize, Vector, Vector)> = (0..n).map(simulate).collect::<Result<_>>()?;

    let mut baseline = Matrix::zeros(n, dim);
    let mut delta = Matrix::zeros(n, dim);
    let mut true_change = Vec::with_capacity(n);
    for (i, (truth, s1, d)) in samples.into_iter().enumerate() {
        baseline.set_row(i, &s1.transpose());
        delta.set_row(i, &d.transpose());
        true_change.push(truth);
    }
    let covariance = vec![Matrix::identity(dim, dim) * (2.0 * noise_level * noise_level); n];

    let batch = ObservationBatch::unmasked(
        trainer.acquisition.fingerprint(trainer.reduction),
        baseline,
        delta,
        covariance,
    )?;
    Ok(TestSamples { true_change, batch })
}

/// Score inference output against the true hypotheses.
///
/// Only valid voxels count. `true_change` must index the same hypotheses
/// as `maps`.
pub fn performance_measures(maps: &InferenceMaps, true_change: &[usize]) -> Result<PerformanceMeasures> {
    DimensionMismatch::check("true_change length (voxels)", maps.n_voxels(), true_change.len())?;
    let n_hyp = maps.hypothesis_names.len();
    if let Some(&bad) = true_change.iter().find(|&&t| t >= n_hyp) {
        return Err(Error::invalid_config(format!(
            "true hypothesis index {} out of range for {} hypotheses",
            bad, n_hyp
        )));
    }

    let mut confusion = vec![vec![0; n_hyp]; n_hyp];
    let mut correct = 0;
    let mut true_posterior = 0.0;
    let mut n_evaluated = 0;
    for (voxel, &truth) in true_change.iter().enumerate() {
        if maps.statuses[voxel] != VoxelStatus::Valid {
            continue;
        }
        let Some(best) = maps.best[voxel] else {
            continue;
        };
        confusion[truth][best] += 1;
        correct += usize::from(best == truth);
        true_posterior += maps.posteriors[truth][voxel];
        n_evaluated += 1;
    }

    let denom = n_evaluated.max(1) as f64;
    Ok(PerformanceMeasures {
        accuracy: correct as f64 / denom,
        mean_true_posterior: true_posterior / denom,
        confusion,
        n_evaluated,
    })
}
