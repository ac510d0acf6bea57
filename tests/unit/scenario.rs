//! The quadratic "radius" scenario and training determinism.

use bench_change::{run_inference, EvidenceMethod, ForwardModel, InferenceConfig, TrainConfig};
use bench_change_core::models::Quadratic;
use bench_change_core::statistics::counter_rng_seed;
use bench_change_core::Vector;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::common::{quadratic_trainer, scalar_acquisition, scalar_batch, scenario_model, SEED};

#[test]
fn radius_change_is_recovered() {
    let model = scenario_model();
    assert_eq!(model.candidate_names(), vec!["radius, twosided"]);

    // S₀ = 4 (radius 2), Δ = 0.4, Σ = [[0.01]]
    let batch = scalar_batch(&[(4.0, 0.4, 0.01)]);
    for method in [EvidenceMethod::Quadrature, EvidenceMethod::Analytic] {
        let maps = run_inference(model, &batch, &InferenceConfig::new().evidence_method(method)).unwrap();
        assert_eq!(maps.n_valid(), 1);
        assert!((maps.posteriors[0][0] - 1.0).abs() < 1e-12);
        assert_eq!(maps.best[0], Some(0));

        // Δradius ≈ Δmeasurement / (2·radius) = 0.1, shrunk slightly by the prior
        let amount = maps.amounts[0][0];
        assert!((amount - 0.1).abs() < 0.01, "{method:?}: amount = {amount}");
    }
}

#[test]
fn learned_sensitivity_matches_derivative() {
    let candidate = &scenario_model().candidates[0];
    for radius in [1.2f64, 1.5, 1.8] {
        let prediction = candidate.predict_change(&Vector::from_vec(vec![radius * radius])).unwrap();
        // d(radius²)/d(radius) = 2·radius, plus ε from the forward difference
        assert!(
            (prediction.mean[0] - (2.0 * radius + 0.01)).abs() < 0.05,
            "radius {radius}: {}",
            prediction.mean[0]
        );
        assert!(prediction.covariance[(0, 0)] > 0.0);
        assert!(prediction.covariance[(0, 0)] < 0.01);
    }
}

#[test]
fn amount_prior_reuses_parameter_prior() {
    let candidate = &scenario_model().candidates[0];
    // Standard deviation of Uniform(1, 2)
    assert!((candidate.amount_prior_sd - 1.0 / 12f64.sqrt()).abs() < 1e-12);
}

#[test]
fn training_is_deterministic_under_a_seed() {
    let config = TrainConfig::new().n_samples(500).k_neighbours(25).perturbation(0.01).seed(SEED);
    let a = quadratic_trainer(config.clone()).train().unwrap();
    let b = quadratic_trainer(config).train().unwrap();
    assert_eq!(a, b);
}

#[test]
fn training_samples_depend_only_on_seed_and_index() {
    let trainer = quadratic_trainer(TrainConfig::new().n_samples(300).perturbation(0.01));
    let samples = trainer.generate_training_samples(SEED).unwrap();
    let priors = Quadratic.default_priors();

    for i in 0..300 {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(SEED, i as u64));
        let params = priors.sample_vector(&mut rng);
        let expected = Quadratic.simulate(&params, &scalar_acquisition());
        assert_eq!(samples.baseline[(i, 0)], expected[0], "sample {i}");
        assert!((samples.sensitivities[0][(i, 0)] - (2.0 * params[0] + 0.01)).abs() < 1e-9);
    }
}

#[test]
fn training_samples_match_reference_values() {
    // radius = 1 + U where U is the first draw of sample i's generator
    let reference = [
        3.503_595_927_442_991,
        1.678_772_252_514_365_8,
        3.936_880_441_649_516,
        1.004_984_203_566_188_2,
    ];
    let trainer = quadratic_trainer(TrainConfig::new().n_samples(4).k_neighbours(2).perturbation(0.01));
    let samples = trainer.generate_training_samples(SEED).unwrap();
    for (i, expected) in reference.iter().enumerate() {
        assert!(
            (samples.baseline[(i, 0)] - expected).abs() < 1e-12,
            "sample {i}: {} vs {expected}",
            samples.baseline[(i, 0)]
        );
    }
}

/// Standard deviation across seeds of the learned sensitivity at S₀ = 4.
fn sensitivity_spread_across_seeds(n_samples: usize) -> (f64, f64) {
    let predictions: Vec<f64> = (1..=5u64)
        .map(|seed| {
            let config = TrainConfig::new()
                .n_samples(n_samples)
                .k_neighbours(20)
                .perturbation(0.01)
                .seed(seed);
            let model = quadratic_trainer(config).train().unwrap();
            model.candidates[0]
                .predict_change(&Vector::from_vec(vec![4.0]))
                .unwrap()
                .mean[0]
        })
        .collect();
    let n = predictions.len() as f64;
    let mean = predictions.iter().sum::<f64>() / n;
    let var = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[test]
fn sensitivity_variance_shrinks_with_training_size() {
    let (_, small) = sensitivity_spread_across_seeds(200);
    let (mean, large) = sensitivity_spread_across_seeds(10_000);

    assert!(large < small, "spread at N = 10000 ({large}) not below N = 200 ({small})");
    assert!(large < 0.01, "spread at N = 10000 is {large}");
    // 2·radius + ε at radius 2
    assert!((mean - 4.01).abs() < 0.05, "mean sensitivity {mean}");
}

#[test]
fn different_seeds_give_different_samples() {
    let trainer = quadratic_trainer(TrainConfig::new().n_samples(200).perturbation(0.01));
    let a = trainer.generate_training_samples(1).unwrap();
    let b = trainer.generate_training_samples(2).unwrap();
    assert_ne!(a.baseline, b.baseline);
    assert_eq!(a.baseline.nrows(), b.baseline.nrows());
}

#[test]
fn training_records_its_settings() {
    let model = scenario_model();
    assert_eq!(model.forward_model, "quadratic");
    assert_eq!(model.model_name, "quadratic");
    assert_eq!(model.training.seed, SEED);
    assert_eq!(model.training.n_samples, 10_000);
    assert_eq!(model.training.n_discarded, 0);
    assert_eq!(model.training.perturbation, vec![0.01]);
    assert_eq!(model.summary_dim(), 1);
}
