//! Bayesian comparison of change hypotheses for one voxel.
//!
//! ## Model
//!
//! Under hypothesis H_k the observed change is
//!
//! Δ | a ~ N(a·μ_k(S₀), Σ + a²·Σ_p,k(S₀))
//!
//! where:
//! - a is the unknown amount of change along the k-th change vector
//! - μ_k(S₀) is the learned mean response per unit change
//! - Σ_p,k(S₀) is the learned spread of that response
//! - Σ is the noise covariance of Δ
//!
//! ## Prior on the amount
//!
//! a ~ N(0, τ_k²), restricted to a half line (and doubled) for one-sided
//! hypotheses. By default τ_k is the spread of the parameter prior along the
//! change vector: the prior on a parameter's value is reused as the prior on
//! how much it changes. This is a modelling assumption, not a derived fact.
//!
//! ## Evidence
//!
//! p(Δ | H_k) = ∫ p(Δ | a) p(a) da, computed in log space by [`evidence`].
//! Posterior probabilities follow from the evidences and the hypotheses'
//! prior weights in [`posterior`].

pub mod evidence;
pub mod posterior;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_QUADRATURE_POINTS;

pub use evidence::{analytic_evidence, null_log_evidence, quadrature_evidence, CandidateEvidence, NoiseModel};
pub use posterior::infer_voxel;

/// How the integral over the change amount is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceMethod {
    /// Peak search plus composite Simpson quadrature. Includes the learned
    /// response spread Σ_p.
    #[default]
    Quadrature,
    /// Closed-form Gaussian-conjugate evidence. Ignores Σ_p.
    Analytic,
}

/// Source of the change-amount prior width τ.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPrior {
    /// Spread of the parameter priors along the change vector (stored per candidate).
    #[default]
    ParameterPrior,
    /// The same fixed standard deviation for every candidate.
    Fixed {
        /// Standard deviation of the amount prior.
        sigma: f64,
    },
}

/// Per-voxel inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Evidence integration method.
    pub evidence_method: EvidenceMethod,
    /// Width of the change-amount prior.
    pub amount_prior: AmountPrior,
    /// Prepend a "no change" hypothesis at index 0.
    pub include_null_hypothesis: bool,
    /// Simpson sub-intervals for [`EvidenceMethod::Quadrature`].
    pub quadrature_points: usize,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            evidence_method: EvidenceMethod::default(),
            amount_prior: AmountPrior::default(),
            include_null_hypothesis: false,
            quadrature_points: DEFAULT_QUADRATURE_POINTS,
        }
    }
}
