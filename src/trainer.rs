//! Simulation-driven training of change models.
//!
//! 1. Draw parameter vectors from the priors (independently per parameter)
//! 2. Simulate and reduce each to a baseline summary S₀
//! 3. Move the parameters a small step along every change vector, simulate
//!    again and form the finite-difference sensitivity (S₁ − S₀)/ε
//! 4. Estimate local moments of the sensitivities over the k nearest
//!    neighbours in S₀ space
//! 5. Fit polynomial ridge regressions S₀ → mean and S₀ → log-Cholesky spread
//!
//! Every sample draws from its own generator seeded by `(seed, index)`, so a
//! fixed seed gives bit-identical models regardless of thread scheduling.

use std::sync::Arc;

use bench_change_core::models::{builtin, BUILTIN_MODELS};
use bench_change_core::statistics::{counter_rng_seed, local_moments, nearest_neighbours};
use bench_change_core::{
    parse_change_vectors, Acquisition, CandidateModel, CandidateSpec, ChangeModel, ChangeVector,
    ConfigError, DimensionMismatch, ForwardModel, Matrix, PolynomialRidge, PreparedReduction,
    PriorRegistry, SummaryReduction, TrainingSummary, Vector,
};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::TrainConfig;
use crate::error::{Error, Result};
use crate::progress::Progress;

/// Finite differences larger than this many steps trigger a warning.
const LARGE_DERIVATIVE_FACTOR: f64 = 1e3;

/// Simulated baselines and sensitivities for every distinct change vector.
#[derive(Debug, Clone)]
pub struct TrainingSamples {
    /// `n × d` baseline summaries, one kept sample per row.
    pub baseline: Matrix,
    /// Per change vector, `n × d` finite-difference sensitivities.
    pub sensitivities: Vec<Matrix>,
    /// Distinct change vectors, in the order of `sensitivities`.
    pub vectors: Vec<ChangeVector>,
    /// Samples dropped for non-finite simulations.
    pub n_discarded: usize,
    /// Samples whose finite difference looked too large for the step.
    pub n_large_derivatives: usize,
}

struct Sample {
    baseline: Vector,
    sensitivities: Vec<Vector>,
    large_derivative: bool,
}

/// Trains a [`ChangeModel`] for one forward model and acquisition protocol.
///
/// # Example
///
/// ```ignore
/// use bench_change::{Trainer, TrainConfig};
/// use bench_change_core::{Acquisition, SummaryReduction};
///
/// let model = Trainer::builtin("ball_stick", Acquisition::multi_shell(&[0.0, 1.0, 2.0], 32))?
///     .reduction(SummaryReduction::ShellInvariants)
///     .config(TrainConfig::balanced().seed(42))
///     .train()?;
/// ```
pub struct Trainer {
    pub(crate) forward_model: Arc<dyn ForwardModel>,
    pub(crate) acquisition: Acquisition,
    pub(crate) reduction: SummaryReduction,
    pub(crate) priors: PriorRegistry,
    pub(crate) candidates: Vec<CandidateSpec>,
    config: TrainConfig,
}

impl Trainer {
    /// Trainer with the model's default priors and one two-sided hypothesis
    /// per parameter.
    pub fn new(forward_model: Arc<dyn ForwardModel>, acquisition: Acquisition) -> Self {
        let priors = forward_model.default_priors();
        let candidates = CandidateSpec::one_per_parameter(&forward_model.parameter_names());
        Self {
            forward_model,
            acquisition,
            reduction: SummaryReduction::ShellInvariants,
            priors,
            candidates,
            config: TrainConfig::default(),
        }
    }

    /// Trainer for a built-in forward model.
    pub fn builtin(name: &str, acquisition: Acquisition) -> Result<Self> {
        let model = builtin(name).ok_or_else(|| Error::UnknownForwardModel {
            name: name.to_string(),
            available: BUILTIN_MODELS.iter().map(|s| s.to_string()).collect(),
        })?;
        Ok(Self::new(Arc::from(model), acquisition))
    }

    /// Replace the priors.
    pub fn priors(mut self, priors: PriorRegistry) -> Self {
        self.priors = priors;
        self
    }

    /// Replace the change hypotheses.
    pub fn candidates(mut self, candidates: Vec<CandidateSpec>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Replace the change hypotheses with parsed change-vector lines.
    pub fn change_vectors<S: AsRef<str>>(self, lines: &[S]) -> Result<Self> {
        let candidates = parse_change_vectors(lines)?;
        Ok(self.candidates(candidates))
    }

    /// Set the summary reduction.
    pub fn reduction(mut self, reduction: SummaryReduction) -> Self {
        self.reduction = reduction;
        self
    }

    /// Set the training configuration.
    pub fn config(mut self, config: TrainConfig) -> Self {
        self.config = config;
        self
    }

    /// The forward model being trained.
    pub fn forward_model(&self) -> &dyn ForwardModel {
        self.forward_model.as_ref()
    }

    /// The configured hypotheses.
    pub fn candidate_specs(&self) -> &[CandidateSpec] {
        &self.candidates
    }

    /// Check configuration, priors and hypotheses before any simulation.
    pub fn validate(&self) -> Result<()> {
        self.config.validate().map_err(Error::invalid_config)?;

        let parameters = self.forward_model.parameter_names();
        self.priors.validate_against(&parameters)?;

        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates.into());
        }
        for candidate in &self.candidates {
            candidate.vector.to_dense(&parameters)?;
            if !(candidate.prior_weight > 0.0 && candidate.prior_weight.is_finite()) {
                return Err(Error::invalid_config(format!(
                    "prior weight of '{}' must be positive",
                    candidate.name()
                )));
            }
        }
        for (name, _) in &self.config.perturbation_overrides {
            if !parameters.contains(name) {
                return Err(ConfigError::UnknownParameter {
                    name: name.clone(),
                    available: parameters.clone(),
                }
                .into());
            }
        }
        if self.acquisition.n_measurements() == 0 {
            return Err(Error::invalid_config("acquisition has no measurements"));
        }
        Ok(())
    }

    /// Distinct change vectors among the candidates, and each candidate's
    /// index into that list.
    fn distinct_vectors(&self) -> (Vec<ChangeVector>, Vec<usize>) {
        let mut vectors: Vec<ChangeVector> = Vec::new();
        let mut index = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            match vectors.iter().position(|v| *v == candidate.vector) {
                Some(i) => index.push(i),
                None => {
                    index.push(vectors.len());
                    vectors.push(candidate.vector.clone());
                }
            }
        }
        (vectors, index)
    }

    /// Finite-difference step along a change vector: the smallest configured
    /// step among the parameters it touches.
    fn step_for(&self, vector: &ChangeVector) -> f64 {
        vector
            .weights()
            .iter()
            .map(|(name, _)| self.config.perturbation_of(name))
            .fold(f64::INFINITY, f64::min)
    }

    /// Simulate baselines and sensitivities with the given seed.
    pub fn generate_training_samples(&self, seed: u64) -> Result<TrainingSamples> {
        self.validate()?;

        let parameters = self.forward_model.parameter_names();
        let priors = self.priors.ordered_as(&parameters)?;
        let prepared = self.reduction.prepare(&self.acquisition);
        let (vectors, _) = self.distinct_vectors();
        let directions = vectors
            .iter()
            .map(|v| Ok((v.to_dense(&parameters)?, self.step_for(v))))
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;

        let n = self.config.n_samples;
        let progress = Progress::new(n, "simulating training samples");
        let simulate = |i: usize| -> std::result::Result<Option<Sample>, DimensionMismatch> {
            let sample = self.simulate_sample(seed, i, &priors, &prepared, &directions);
            progress.inc();
            sample
        };

        #[cfg(feature = "parallel")]
        let samples: Vec<Option<Sample>> = (0..n)
            .into_par_iter()
            .map(simulate)
            .collect::<std::result::Result<_, _>>()?;

        #[cfg(not(feature = "parallel"))]
        let samples: Vec<Option<Sample>> = (0..n).map(simulate).collect::<std::result::Result<_, _>>()?;

        progress.finish();

        let kept: Vec<Sample> = samples.into_iter().flatten().collect();
        let n_discarded = n - kept.len();
        let n_large_derivatives = kept.iter().filter(|s| s.large_derivative).count();
        let dim = prepared.dim();

        let mut baseline = Matrix::zeros(kept.len(), dim);
        let mut sensitivities = vec![Matrix::zeros(kept.len(), dim); vectors.len()];
        for (row, sample) in kept.iter().enumerate() {
            baseline.set_row(row, &sample.baseline.transpose());
            for (sens, s) in sensitivities.iter_mut().zip(&sample.sensitivities) {
                sens.set_row(row, &s.transpose());
            }
        }

        Ok(TrainingSamples {
            baseline,
            sensitivities,
            vectors,
            n_discarded,
            n_large_derivatives,
        })
    }

    fn simulate_sample(
        &self,
        seed: u64,
        index: usize,
        priors: &PriorRegistry,
        prepared: &PreparedReduction,
        directions: &[(Vec<f64>, f64)],
    ) -> std::result::Result<Option<Sample>, DimensionMismatch> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, index as u64));
        let theta = priors.sample_vector(&mut rng);

        let baseline = prepared.reduce(&self.forward_model.simulate(&theta, &self.acquisition))?;
        if baseline.iter().any(|v| !v.is_finite()) {
            return Ok(None);
        }

        let mut sensitivities = Vec::with_capacity(directions.len());
        let mut large_derivative = false;
        for (weights, step) in directions {
            let moved: Vec<f64> = theta
                .iter()
                .zip(weights)
                .map(|(t, w)| (t + w * step).abs())
                .collect();
            let perturbed = prepared.reduce(&self.forward_model.simulate(&moved, &self.acquisition))?;
            let diff = &perturbed - &baseline;
            if diff.iter().any(|v| !v.is_finite()) {
                return Ok(None);
            }
            large_derivative |= diff.iter().any(|v| v.abs() > LARGE_DERIVATIVE_FACTOR * step);
            sensitivities.push(diff / *step);
        }

        Ok(Some(Sample {
            baseline,
            sensitivities,
            large_derivative,
        }))
    }

    /// Train the change model.
    pub fn train(&self) -> Result<ChangeModel> {
        self.validate()?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let parameters = self.forward_model.parameter_names();

        info!(
            forward_model = self.forward_model.name(),
            n_samples = self.config.n_samples,
            n_candidates = self.candidates.len(),
            seed,
            "Training change model"
        );

        let samples = self.generate_training_samples(seed)?;
        if samples.n_discarded > 0 {
            warn!(
                n_discarded = samples.n_discarded,
                "Discarded training samples with non-finite simulations"
            );
        }
        if samples.n_large_derivatives > 0 {
            warn!(
                n_samples = samples.n_large_derivatives,
                "Derivatives are very large for the perturbation; the change may not be locally linear"
            );
        }
        if samples.baseline.nrows() < 2 {
            return Err(Error::Training {
                message: format!(
                    "only {} of {} samples produced finite summaries",
                    samples.baseline.nrows(),
                    self.config.n_samples
                ),
            });
        }

        let neighbours = nearest_neighbours(&samples.baseline, self.config.k_neighbours);
        let (_, vector_index) = self.distinct_vectors();
        let priors = self.priors.ordered_as(&parameters)?;

        // Regressions depend only on the change vector; directions share them
        let mut fits = Vec::with_capacity(samples.vectors.len());
        for (vector, sensitivities) in samples.vectors.iter().zip(&samples.sensitivities) {
            let fit_error = |source| Error::Fit {
                candidate: vector.to_string(),
                source,
            };
            let moments = local_moments(sensitivities, &neighbours, self.config.knn_shrinkage)
                .map_err(fit_error)?;
            let sensitivity = PolynomialRidge::fit(
                &samples.baseline,
                &moments.mean,
                self.config.poly_degree,
                self.config.ridge_alpha,
            )
            .map_err(fit_error)?;
            let spread = PolynomialRidge::fit(
                &samples.baseline,
                &moments.log_cholesky,
                self.config.poly_degree,
                self.config.ridge_alpha,
            )
            .map_err(fit_error)?;
            fits.push((sensitivity, spread));
        }

        let mut candidates = Vec::with_capacity(self.candidates.len());
        for (spec, &v) in self.candidates.iter().zip(&vector_index) {
            let name = spec.name();
            let (sensitivity, spread) = fits[v].clone();
            let amount_prior_sd = amount_prior_sd(&spec.vector, &priors);
            debug!(
                candidate = %name,
                amount_prior_sd,
                n_features = sensitivity.exponents.len(),
                "Fitted change model"
            );

            candidates.push(CandidateModel {
                name,
                vector: spec.vector.clone(),
                direction: spec.direction,
                prior_weight: spec.prior_weight,
                amount_prior_sd,
                sensitivity,
                spread,
            });
        }

        let model = ChangeModel {
            model_name: self
                .config
                .model_name
                .clone()
                .unwrap_or_else(|| self.forward_model.name().to_string()),
            forward_model: self.forward_model.name().to_string(),
            parameter_names: parameters.clone(),
            fingerprint: self.acquisition.fingerprint(self.reduction),
            priors,
            candidates,
            training: TrainingSummary {
                n_samples: self.config.n_samples,
                n_discarded: samples.n_discarded,
                seed,
                perturbation: parameters.iter().map(|p| self.config.perturbation_of(p)).collect(),
                k_neighbours: self.config.k_neighbours,
                poly_degree: self.config.poly_degree,
                ridge_alpha: self.config.ridge_alpha,
            },
        };

        info!(
            model_name = %model.model_name,
            summary_dim = model.summary_dim(),
            n_kept = samples.baseline.nrows(),
            "Change model trained"
        );
        Ok(model)
    }
}

/// Spread of the parameter priors along a unit change vector.
///
/// The prior on a parameter's value is reused as the prior on its change
/// amount; independent priors combine as √(Σ wᵢ² Var(pᵢ)).
pub fn amount_prior_sd(vector: &ChangeVector, priors: &PriorRegistry) -> f64 {
    vector
        .weights()
        .iter()
        .filter_map(|(name, w)| priors.get(name).ok().map(|p| (w * p.std_dev()).powi(2)))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_change_core::models::Quadratic;
    use bench_change_core::Prior;

    fn quadratic_trainer() -> Trainer {
        Trainer::new(Arc::new(Quadratic), Acquisition::scalar(1.0))
            .reduction(SummaryReduction::Identity)
            .config(TrainConfig::new().n_samples(400).k_neighbours(20).perturbation(0.01).seed(7))
    }

    #[test]
    fn test_unknown_builtin_model() {
        let err = Trainer::builtin("nope", Acquisition::scalar(1.0)).err().unwrap();
        assert!(matches!(err, Error::UnknownForwardModel { .. }));
    }

    #[test]
    fn test_unknown_parameter_in_change_vector() {
        let err = quadratic_trainer().change_vectors(&["diameter"]).unwrap().validate().unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnknownParameter { .. })));
    }

    #[test]
    fn test_prior_mismatch_fails_before_simulation() {
        let trainer = quadratic_trainer().priors(PriorRegistry::new().with("r", Prior::uniform(1.0, 2.0)));
        let err = trainer.generate_training_samples(1).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::PriorMismatch { .. })));
    }

    #[test]
    fn test_unknown_perturbation_override() {
        let trainer = quadratic_trainer().config(TrainConfig::new().perturbation_for("d", 0.1));
        assert!(matches!(
            trainer.validate(),
            Err(Error::Config(ConfigError::UnknownParameter { .. }))
        ));
    }

    #[test]
    fn test_finite_difference_sensitivities() {
        let samples = quadratic_trainer().generate_training_samples(3).unwrap();
        assert_eq!(samples.baseline.nrows(), 400);
        assert_eq!(samples.n_discarded, 0);
        for i in 0..samples.baseline.nrows() {
            let r = samples.baseline[(i, 0)].sqrt();
            // ((r + ε)² − r²)/ε = 2r + ε
            assert!((samples.sensitivities[0][(i, 0)] - (2.0 * r + 0.01)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_directions_share_regressions() {
        let model = quadratic_trainer()
            .change_vectors(&["radius, positive negative"])
            .unwrap()
            .train()
            .unwrap();
        assert_eq!(model.candidates.len(), 2);
        assert_eq!(model.candidates[0].sensitivity, model.candidates[1].sensitivity);
        assert_eq!(model.candidate_names(), vec!["radius, positive", "radius, negative"]);
    }

    #[test]
    fn test_amount_prior_sd_from_parameter_prior() {
        let priors = PriorRegistry::new()
            .with("a", Prior::uniform(0.0, 1.0))
            .with("b", Prior::normal(0.0, 2.0));
        let single = amount_prior_sd(&ChangeVector::single("a"), &priors);
        assert!((single - 1.0 / 12f64.sqrt()).abs() < 1e-12);

        let joint = amount_prior_sd(&ChangeVector::parse("a + b").unwrap(), &priors);
        let expected = (0.5 / 12.0 + 0.5 * 4.0f64).sqrt();
        assert!((joint - expected).abs() < 1e-12);
    }
}
