//! End-to-end accuracy on simulated data with known ground truth.

use bench_change::{
    generate_test_samples, performance_measures, run_inference, Acquisition, Error, EvidenceMethod,
    InferenceConfig, SummaryReduction, TrainConfig, Trainer,
};

use crate::common::SEED;

fn ball_stick_trainer() -> Trainer {
    Trainer::builtin("ball_stick", Acquisition::multi_shell(&[0.0, 1.0, 2.0], 16))
        .expect("ball_stick is built in")
        .reduction(SummaryReduction::ShellInvariants)
        .config(TrainConfig::quick().seed(SEED))
}

#[test]
fn recovers_simulated_changes() {
    let trainer = ball_stick_trainer();
    let model = trainer.train().unwrap();
    let samples = generate_test_samples(&trainer, 200, 0.1, 0.002, false, SEED + 1).unwrap();
    assert_eq!(samples.batch.n_voxels(), 200);
    assert_eq!(samples.batch.summary_dim(), model.summary_dim());

    for method in [EvidenceMethod::Analytic, EvidenceMethod::Quadrature] {
        let config = InferenceConfig::new().evidence_method(method);
        let maps = run_inference(&model, &samples.batch, &config).unwrap();
        assert_eq!(maps.n_excluded, 0);

        let measures = performance_measures(&maps, &samples.true_change).unwrap();
        assert_eq!(measures.n_evaluated, 200);
        let total: usize = measures.confusion.iter().flatten().sum();
        assert_eq!(total, measures.n_evaluated);
        assert!(
            measures.accuracy > 0.6,
            "{method:?}: accuracy {} with confusion {:?}",
            measures.accuracy,
            measures.confusion
        );
        assert!(measures.mean_true_posterior > 0.5);
    }
}

#[test]
fn null_hypothesis_truths_use_shifted_indices() {
    let trainer = ball_stick_trainer();
    let samples = generate_test_samples(&trainer, 60, 0.1, 0.002, true, SEED).unwrap();
    assert!(samples.true_change.iter().all(|&t| t < 3));
    assert!(samples.true_change.contains(&0));
}

#[test]
fn noise_level_must_be_positive() {
    let trainer = ball_stick_trainer();
    let err = generate_test_samples(&trainer, 10, 0.1, 0.0, false, SEED).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn truths_must_match_the_hypotheses() {
    let trainer = ball_stick_trainer().config(TrainConfig::quick().n_samples(300).k_neighbours(20).seed(SEED));
    let model = trainer.train().unwrap();
    let samples = generate_test_samples(&trainer, 5, 0.1, 0.002, false, SEED).unwrap();
    let maps = run_inference(&model, &samples.batch, &InferenceConfig::quick()).unwrap();

    assert!(performance_measures(&maps, &samples.true_change[..4]).is_err());
    let out_of_range = vec![7; 5];
    assert!(matches!(
        performance_measures(&maps, &out_of_range),
        Err(Error::InvalidConfig { .. })
    ));
}
