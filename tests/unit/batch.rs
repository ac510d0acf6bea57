//! Batch inference: exclusion of invalid voxels, masking, shape and protocol
//! checks, and the behaviour of the posterior under noise.

use bench_change::{
    run_inference, Acquisition, Error, InferenceConfig, ObservationBatch, SummaryReduction, VoxelStatus,
};
use bench_change_core::{Matrix, NumericalError};

use crate::common::{scalar_batch, scalar_fingerprint, scenario_model, signed_model};

#[test]
fn invalid_covariance_excludes_only_that_voxel() {
    let model = scenario_model();
    let batch = scalar_batch(&[
        (4.0, 0.4, 0.01),
        (3.0, 0.2, f64::NAN),
        (2.5, -0.1, -0.02),
        (1.5, 0.05, 0.01),
    ]);
    let maps = run_inference(model, &batch, &InferenceConfig::default()).unwrap();

    assert_eq!(maps.n_excluded, 2);
    assert_eq!(maps.n_valid(), 2);
    assert_eq!(maps.statuses[0], VoxelStatus::Valid);
    assert_eq!(maps.statuses[1], VoxelStatus::Invalid(NumericalError::NonFiniteInput));
    assert_eq!(maps.statuses[2], VoxelStatus::Invalid(NumericalError::NotPositiveDefinite));
    assert_eq!(maps.statuses[3], VoxelStatus::Valid);

    for voxel in [1, 2] {
        assert!(maps.posteriors[0][voxel].is_nan());
        assert!(maps.amounts[0][voxel].is_nan());
        assert_eq!(maps.best[voxel], None);
        assert!(maps.voxel_posterior(voxel).is_none());
    }

    // Valid voxels are unaffected by their invalid neighbours
    let alone = run_inference(model, &scalar_batch(&[(4.0, 0.4, 0.01)]), &InferenceConfig::default()).unwrap();
    assert_eq!(maps.amounts[0][0], alone.amounts[0][0]);
    assert_eq!(maps.posteriors[0][3], 1.0);
}

#[test]
fn non_positive_definite_matrix_is_excluded() {
    let model = signed_model();
    let mut batch = scalar_batch(&[(2.0, 0.1, 0.01), (2.0, 0.1, 0.01)]);
    batch.covariance[1] = Matrix::from_element(1, 1, 0.0);
    let maps = run_inference(model, &batch, &InferenceConfig::default()).unwrap();
    assert_eq!(maps.statuses[0], VoxelStatus::Valid);
    assert_eq!(maps.statuses[1], VoxelStatus::Invalid(NumericalError::NotPositiveDefinite));
    assert_eq!(maps.n_excluded, 1);
}

#[test]
fn masked_voxels_are_skipped_not_zero_filled() {
    let model = scenario_model();
    let mut batch = scalar_batch(&[(4.0, 0.4, 0.01), (2.0, 0.1, 0.01)]);
    batch.mask[1] = false;
    let maps = run_inference(model, &batch, &InferenceConfig::default()).unwrap();

    assert_eq!(maps.statuses[1], VoxelStatus::Masked);
    assert_eq!(maps.n_excluded, 0);
    assert!(maps.posteriors[0][1].is_nan());
    assert!(maps.amounts[0][1].is_nan());
    assert_eq!(maps.best[1], None);
}

#[test]
fn posteriors_sum_to_one_for_every_valid_voxel() {
    let model = signed_model();
    let voxels: Vec<(f64, f64, f64)> = (0..20)
        .map(|i| {
            let s0 = 1.0 + 0.15 * i as f64;
            (s0, 0.05 * (i as f64 - 10.0), 0.001 * (1 + i % 4) as f64)
        })
        .collect();
    let config = InferenceConfig::new().include_null_hypothesis(true);
    let maps = run_inference(model, &scalar_batch(&voxels), &config).unwrap();

    assert_eq!(maps.hypothesis_names, vec!["[none]", "radius, positive", "radius, negative"]);
    for voxel in 0..maps.n_voxels() {
        let p = maps.voxel_posterior(voxel).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9, "voxel {voxel}: {p:?}");
    }
}

#[test]
fn zero_change_gives_zero_amounts_and_uniform_posterior() {
    let model = signed_model();
    let batch = scalar_batch(&[(2.0, 0.0, 0.01), (3.5, 0.0, 0.001)]);
    let maps = run_inference(model, &batch, &InferenceConfig::default()).unwrap();
    for voxel in 0..2 {
        let amounts = maps.voxel_amounts(voxel).unwrap();
        assert!(amounts.iter().all(|a| a.abs() < 1e-6), "{amounts:?}");
        let p = maps.voxel_posterior(voxel).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-3, "{p:?}");
    }
}

#[test]
fn more_noise_gives_a_flatter_posterior() {
    let model = signed_model();
    let mut previous = f64::NEG_INFINITY;
    for scale in [1.0, 2.0, 4.0, 8.0, 16.0] {
        let maps = run_inference(model, &scalar_batch(&[(4.0, 0.4, 0.01 * scale)]), &InferenceConfig::default()).unwrap();
        let p = maps.voxel_posterior(0).unwrap();
        assert_eq!(maps.best[0], Some(0));
        let entropy: f64 = p.iter().filter(|&&x| x > 0.0).map(|x| -x * x.ln()).sum();
        assert!(entropy > previous, "scale {scale}: entropy {entropy} <= {previous}");
        previous = entropy;
    }
}

#[test]
fn wrong_summary_dimension_is_fatal() {
    let model = scenario_model();
    let fingerprint = scalar_fingerprint();
    let result = ObservationBatch::unmasked(
        fingerprint,
        Matrix::zeros(2, 1),
        Matrix::zeros(2, 1),
        vec![Matrix::identity(1, 1), Matrix::identity(2, 2)],
    );
    assert!(matches!(result, Err(Error::ShapeMismatch(_))));

    // Consistent arrays, but two summaries per voxel against a scalar model
    let mut batch = ObservationBatch::unmasked(
        scalar_fingerprint(),
        Matrix::zeros(1, 2),
        Matrix::zeros(1, 2),
        vec![Matrix::identity(2, 2)],
    )
    .unwrap();
    batch.fingerprint.summary_dim = 2;
    batch.fingerprint.directions_per_shell = vec![2];
    let err = run_inference(model, &batch, &InferenceConfig::default()).unwrap_err();
    assert!(matches!(err, Error::ProtocolMismatch { .. } | Error::ShapeMismatch(_)));
}

#[test]
fn mask_length_must_match() {
    let result = ObservationBatch::new(
        scalar_fingerprint(),
        Matrix::zeros(3, 1),
        Matrix::zeros(3, 1),
        vec![Matrix::identity(1, 1); 3],
        vec![true; 2],
    );
    assert!(matches!(result, Err(Error::ShapeMismatch(_))));
}

#[test]
fn protocol_mismatch_is_fatal() {
    let model = scenario_model();
    let mut batch = scalar_batch(&[(4.0, 0.4, 0.01)]);
    batch.fingerprint = Acquisition::scalar(2.0).fingerprint(SummaryReduction::Identity);
    let err = run_inference(model, &batch, &InferenceConfig::default()).unwrap_err();
    match err {
        Error::ProtocolMismatch { detail } => assert!(detail.contains("b-values"), "{detail}"),
        other => panic!("expected protocol mismatch, got {other}"),
    }

    batch.fingerprint = Acquisition::scalar(1.0).fingerprint(SummaryReduction::ShellInvariants);
    assert!(matches!(
        run_inference(model, &batch, &InferenceConfig::default()),
        Err(Error::ProtocolMismatch { .. })
    ));
}
