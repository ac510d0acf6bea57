//! Shared fixtures.

use std::sync::{Arc, OnceLock};

use bench_change::{
    Acquisition, ChangeModel, ObservationBatch, ProtocolFingerprint, SummaryReduction, TrainConfig, Trainer,
};
use bench_change_core::models::Quadratic;
use bench_change_core::Matrix;

/// Seed used by every cached model.
pub const SEED: u64 = 0x5EED;

/// Scalar protocol of the quadratic scenario.
pub fn scalar_acquisition() -> Acquisition {
    Acquisition::scalar(1.0)
}

pub fn scalar_fingerprint() -> ProtocolFingerprint {
    scalar_acquisition().fingerprint(SummaryReduction::Identity)
}

/// measurement = radius², identity reduction, radius ~ Uniform(1, 2).
pub fn quadratic_trainer(config: TrainConfig) -> Trainer {
    Trainer::new(Arc::new(Quadratic), scalar_acquisition())
        .reduction(SummaryReduction::Identity)
        .config(config)
}

/// Quadratic model trained with N = 10,000 and ε = 0.01.
pub fn scenario_model() -> &'static ChangeModel {
    static MODEL: OnceLock<ChangeModel> = OnceLock::new();
    MODEL.get_or_init(|| {
        quadratic_trainer(TrainConfig::new().n_samples(10_000).perturbation(0.01).seed(SEED))
            .train()
            .expect("scenario model should train")
    })
}

/// Quadratic model with one hypothesis per sign of change.
pub fn signed_model() -> &'static ChangeModel {
    static MODEL: OnceLock<ChangeModel> = OnceLock::new();
    MODEL.get_or_init(|| {
        quadratic_trainer(TrainConfig::quick().perturbation(0.01).seed(SEED))
            .change_vectors(&["radius, positive negative"])
            .expect("change vectors should parse")
            .train()
            .expect("signed model should train")
    })
}

/// Batch of scalar observations, one `(baseline, delta, variance)` per voxel.
pub fn scalar_batch(voxels: &[(f64, f64, f64)]) -> ObservationBatch {
    let n = voxels.len();
    let baseline = Matrix::from_iterator(n, 1, voxels.iter().map(|v| v.0));
    let delta = Matrix::from_iterator(n, 1, voxels.iter().map(|v| v.1));
    let covariance = voxels.iter().map(|v| Matrix::from_element(1, 1, v.2)).collect();
    ObservationBatch::unmasked(scalar_fingerprint(), baseline, delta, covariance).expect("shapes agree")
}
