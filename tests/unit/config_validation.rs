//! Tests for configuration validation.
//!
//! Builder methods panic on invalid values; `validate()` and the trainer
//! report problems as errors before any simulation starts.

use bench_change::{
    CandidateSpec, Error, InferenceConfig, Prior, PriorRegistry, TrainConfig,
};
use bench_change_core::ConfigError;

use crate::common::{quadratic_trainer, scalar_batch, scenario_model};

// =============================================================================
// BUILDER PANICS
// =============================================================================

#[test]
#[should_panic(expected = "n_samples must be positive")]
fn zero_samples_panics() {
    let _ = TrainConfig::new().n_samples(0);
}

#[test]
#[should_panic(expected = "perturbation must be positive")]
fn negative_perturbation_panics() {
    let _ = TrainConfig::new().perturbation(-0.01);
}

#[test]
#[should_panic(expected = "k_neighbours must be positive")]
fn zero_neighbours_panics() {
    let _ = TrainConfig::new().k_neighbours(0);
}

#[test]
#[should_panic(expected = "amount prior sigma must be positive")]
fn zero_amount_prior_panics() {
    let _ = InferenceConfig::new().amount_prior_sigma(0.0);
}

#[test]
#[should_panic(expected = "quadrature_points must be at least 2")]
fn too_few_quadrature_points_panics() {
    let _ = InferenceConfig::new().quadrature_points(1);
}

// =============================================================================
// ERRORS BEFORE WORK STARTS
// =============================================================================

#[test]
fn invalid_train_config_is_reported() {
    let config = TrainConfig {
        perturbation: f64::NAN,
        ..TrainConfig::default()
    };
    let err = quadratic_trainer(config).train().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }), "{err}");
}

#[test]
fn unknown_parameter_is_a_configuration_error() {
    let err = quadratic_trainer(TrainConfig::quick())
        .candidates(vec![CandidateSpec::single("diameter")])
        .train()
        .unwrap_err();
    match err {
        Error::Config(ConfigError::UnknownParameter { name, available }) => {
            assert_eq!(name, "diameter");
            assert_eq!(available, vec!["radius"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn prior_registry_must_match_model() {
    let priors = PriorRegistry::new()
        .with("radius", Prior::uniform(1.0, 2.0))
        .with("length", Prior::uniform(0.0, 1.0));
    let err = quadratic_trainer(TrainConfig::quick()).priors(priors).validate().unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::PriorMismatch { ref extra, .. }) if extra == &["length".to_string()]
    ));
}

#[test]
fn invalid_prior_is_rejected() {
    let priors = PriorRegistry::new().with("radius", Prior::uniform(2.0, 1.0));
    let err = quadratic_trainer(TrainConfig::quick()).priors(priors).validate().unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::InvalidPrior { .. })));
}

#[test]
fn empty_hypothesis_list_is_rejected() {
    let err = quadratic_trainer(TrainConfig::quick())
        .candidates(Vec::new())
        .validate()
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::NoCandidates)));
}

#[test]
fn malformed_direction_is_rejected() {
    let result = quadratic_trainer(TrainConfig::quick()).change_vectors(&["radius, upwards"]);
    assert!(matches!(result, Err(Error::Config(ConfigError::InvalidChangeVector { .. }))));
}

#[test]
fn invalid_inference_config_is_reported() {
    let config = InferenceConfig {
        quadrature_points: 0,
        ..InferenceConfig::default()
    };
    let err = bench_change::run_inference(scenario_model(), &scalar_batch(&[(4.0, 0.4, 0.01)]), &config).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}
