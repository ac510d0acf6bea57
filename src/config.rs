//! Configuration for training change models and running inference.

use bench_change_core::constants::{DEFAULT_KNN_SHRINKAGE, DEFAULT_QUADRATURE_POINTS};
use bench_change_core::{AmountPrior, EvidenceMethod, InferenceSettings};
use serde::{Deserialize, Serialize};

/// Configuration options for [`Trainer`](crate::Trainer).
///
/// The derivative of the summary vector is estimated by a forward finite
/// difference: every sample is re-simulated with its parameters moved by
/// `perturbation` along each change vector. This assumes the summary is
/// locally linear over that step. Too large a step breaks the assumption and
/// the trainer only warns about it; too small a step amplifies rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of parameter vectors drawn from the priors.
    ///
    /// Small values give unstable regressions. Default: 10,000.
    pub n_samples: usize,

    /// Finite-difference step applied along each change vector. Default: 1e-6.
    pub perturbation: f64,

    /// Per-parameter steps that replace `perturbation`.
    ///
    /// A change vector over several parameters uses the smallest step among
    /// its parameters. Default: empty.
    pub perturbation_overrides: Vec<(String, f64)>,

    /// Neighbourhood size for local sensitivity moments. Default: 100.
    pub k_neighbours: usize,

    /// Total degree of the polynomial regressions. Default: 2.
    pub poly_degree: u32,

    /// Ridge penalty of the polynomial regressions. Default: 1.0.
    pub ridge_alpha: f64,

    /// Diagonal shrinkage of local covariances. Default: 1e-6.
    pub knn_shrinkage: f64,

    /// Seed for parameter sampling.
    ///
    /// Default: None (seeded from the OS).
    pub seed: Option<u64>,

    /// Name stored in the artifact.
    ///
    /// Default: None (the forward model's name).
    pub model_name: Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_samples: 10_000,
            perturbation: 1e-6,
            perturbation_overrides: Vec::new(),
            k_neighbours: 100,
            poly_degree: 2,
            ridge_alpha: 1.0,
            knn_shrinkage: DEFAULT_KNN_SHRINKAGE,
            seed: None,
            model_name: None,
        }
    }
}

impl TrainConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a quick configuration for development and tests.
    ///
    /// - 2,000 samples
    /// - 50 neighbours
    pub fn quick() -> Self {
        Self {
            n_samples: 2_000,
            k_neighbours: 50,
            ..Default::default()
        }
    }

    /// Create a balanced configuration (the defaults).
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Create a thorough configuration for production models.
    ///
    /// - 100,000 samples
    /// - 200 neighbours
    /// - cubic regressions
    pub fn thorough() -> Self {
        Self {
            n_samples: 100_000,
            k_neighbours: 200,
            poly_degree: 3,
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the number of training samples.
    pub fn n_samples(mut self, n: usize) -> Self {
        assert!(n > 0, "n_samples must be positive");
        self.n_samples = n;
        self
    }

    /// Set the finite-difference step.
    pub fn perturbation(mut self, step: f64) -> Self {
        assert!(step > 0.0 && step.is_finite(), "perturbation must be positive");
        self.perturbation = step;
        self
    }

    /// Override the finite-difference step for one parameter.
    pub fn perturbation_for(mut self, parameter: impl Into<String>, step: f64) -> Self {
        assert!(step > 0.0 && step.is_finite(), "perturbation must be positive");
        let parameter = parameter.into();
        self.perturbation_overrides.retain(|(p, _)| *p != parameter);
        self.perturbation_overrides.push((parameter, step));
        self
    }

    /// Set the neighbourhood size.
    pub fn k_neighbours(mut self, k: usize) -> Self {
        assert!(k > 0, "k_neighbours must be positive");
        self.k_neighbours = k;
        self
    }

    /// Set the polynomial degree.
    pub fn poly_degree(mut self, degree: u32) -> Self {
        self.poly_degree = degree;
        self
    }

    /// Set the ridge penalty.
    pub fn ridge_alpha(mut self, alpha: f64) -> Self {
        assert!(alpha >= 0.0, "ridge_alpha must be non-negative");
        self.ridge_alpha = alpha;
        self
    }

    /// Set the covariance shrinkage.
    pub fn knn_shrinkage(mut self, shrinkage: f64) -> Self {
        assert!(shrinkage > 0.0, "knn_shrinkage must be positive");
        self.knn_shrinkage = shrinkage;
        self
    }

    /// Set a deterministic seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the stored model name.
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Finite-difference step for one parameter.
    pub fn perturbation_of(&self, parameter: &str) -> f64 {
        self.perturbation_overrides
            .iter()
            .find(|(p, _)| p == parameter)
            .map_or(self.perturbation, |(_, step)| *step)
    }

    /// Check if the configuration is valid.
    ///
    /// Returns an error message if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_samples == 0 {
            return Err("n_samples must be positive".to_string());
        }
        if !(self.perturbation > 0.0 && self.perturbation.is_finite()) {
            return Err("perturbation must be positive and finite".to_string());
        }
        if let Some((p, _)) = self
            .perturbation_overrides
            .iter()
            .find(|(_, s)| !(*s > 0.0 && s.is_finite()))
        {
            return Err(format!("perturbation for '{}' must be positive and finite", p));
        }
        if self.k_neighbours == 0 {
            return Err("k_neighbours must be positive".to_string());
        }
        if self.ridge_alpha.is_nan() || self.ridge_alpha < 0.0 {
            return Err("ridge_alpha must be non-negative".to_string());
        }
        if self.knn_shrinkage.is_nan() || self.knn_shrinkage <= 0.0 {
            return Err("knn_shrinkage must be positive".to_string());
        }
        Ok(())
    }
}

/// Configuration options for batch inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// How evidences are integrated over the change amount.
    ///
    /// Default: [`EvidenceMethod::Quadrature`].
    pub evidence_method: EvidenceMethod,

    /// Width of the change-amount prior.
    ///
    /// Default: [`AmountPrior::ParameterPrior`].
    pub amount_prior: AmountPrior,

    /// Add a "no change" hypothesis at index 0 of every output.
    ///
    /// Default: false.
    pub include_null_hypothesis: bool,

    /// Simpson sub-intervals for quadrature. Default: 512.
    pub quadrature_points: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            evidence_method: EvidenceMethod::Quadrature,
            amount_prior: AmountPrior::ParameterPrior,
            include_null_hypothesis: false,
            quadrature_points: DEFAULT_QUADRATURE_POINTS,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed-form evidences; fastest, ignores the learned response spread.
    pub fn quick() -> Self {
        Self {
            evidence_method: EvidenceMethod::Analytic,
            ..Default::default()
        }
    }

    /// Create a balanced configuration (the defaults).
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Quadrature with a finer grid.
    pub fn thorough() -> Self {
        Self {
            quadrature_points: 2_048,
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the evidence method.
    pub fn evidence_method(mut self, method: EvidenceMethod) -> Self {
        self.evidence_method = method;
        self
    }

    /// Use a fixed change-amount prior width for every candidate.
    pub fn amount_prior_sigma(mut self, sigma: f64) -> Self {
        assert!(sigma > 0.0 && sigma.is_finite(), "amount prior sigma must be positive");
        self.amount_prior = AmountPrior::Fixed { sigma };
        self
    }

    /// Include the "no change" hypothesis.
    pub fn include_null_hypothesis(mut self, include: bool) -> Self {
        self.include_null_hypothesis = include;
        self
    }

    /// Set the number of quadrature intervals.
    pub fn quadrature_points(mut self, points: usize) -> Self {
        assert!(points >= 2, "quadrature_points must be at least 2");
        self.quadrature_points = points;
        self
    }

    /// Per-voxel settings for the inference engine.
    pub fn settings(&self) -> InferenceSettings {
        InferenceSettings {
            evidence_method: self.evidence_method,
            amount_prior: self.amount_prior,
            include_null_hypothesis: self.include_null_hypothesis,
            quadrature_points: self.quadrature_points,
        }
    }

    /// Check if the configuration is valid.
    ///
    /// Returns an error message if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let AmountPrior::Fixed { sigma } = self.amount_prior {
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err("amount prior sigma must be positive and finite".to_string());
            }
        }
        if self.quadrature_points < 2 {
            return Err("quadrature_points must be at least 2".to_string());
        }
        Ok(())
    }
}
