//! Trained change models.
//!
//! A [`ChangeModel`] bundles everything inference needs: one
//! [`CandidateModel`] per change hypothesis, the forward-model identity, the
//! priors it was trained with and the protocol fingerprint it is valid for.
//! It is immutable once trained and is shared read-only across voxels.

use serde::{Deserialize, Serialize};

use crate::acquisition::ProtocolFingerprint;
use crate::change_vector::{ChangeVector, Direction};
use crate::error::DimensionMismatch;
use crate::priors::PriorRegistry;
use crate::regression::PolynomialRidge;
use crate::statistics::{tril_len, unpack_log_cholesky};
use crate::types::{Matrix, Vector};

/// Name of the "no change" hypothesis when it is included.
pub const NULL_HYPOTHESIS: &str = "[none]";

/// Predicted response of the summary vector to a unit change along one vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePrediction {
    /// Expected summary change per unit change amount, μ(S₀).
    pub mean: Vector,
    /// Spread of that response among similar voxels, Σ_p(S₀).
    pub covariance: Matrix,
}

/// Learned response model for one change hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateModel {
    /// Display name, `"<vector>, <direction>"`.
    pub name: String,
    /// Direction in parameter space.
    pub vector: ChangeVector,
    /// Allowed sign of the change amount.
    pub direction: Direction,
    /// Unnormalised prior probability of the hypothesis.
    pub prior_weight: f64,
    /// Standard deviation of the change-amount prior.
    ///
    /// Taken from the spread of the parameter priors along `vector`: the prior
    /// on a parameter's value doubles as the prior on how much it changes.
    pub amount_prior_sd: f64,
    /// Regression from baseline summary to mean sensitivity.
    pub sensitivity: PolynomialRidge,
    /// Regression from baseline summary to packed log-Cholesky spread.
    pub spread: PolynomialRidge,
}

impl CandidateModel {
    /// Summary dimensionality this candidate was trained on.
    pub fn summary_dim(&self) -> usize {
        self.sensitivity.n_outputs()
    }

    /// Predict the summary response at a baseline summary vector.
    pub fn predict_change(&self, baseline: &Vector) -> Result<ChangePrediction, DimensionMismatch> {
        let dim = self.summary_dim();
        let mean = self.sensitivity.predict(baseline)?;
        let packed = self.spread.predict(baseline)?;
        DimensionMismatch::check("spread regression outputs", tril_len(dim), packed.len())?;
        Ok(ChangePrediction {
            mean,
            covariance: unpack_log_cholesky(packed.as_slice(), dim),
        })
    }
}

/// Bookkeeping from the training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Parameter samples requested.
    pub n_samples: usize,
    /// Samples dropped because a simulation was non-finite.
    pub n_discarded: usize,
    /// Seed the samples were drawn with.
    pub seed: u64,
    /// Finite-difference step per parameter, in model parameter order.
    pub perturbation: Vec<f64>,
    /// Neighbourhood size for the local moments.
    pub k_neighbours: usize,
    /// Polynomial degree of both regressions.
    pub poly_degree: u32,
    /// Ridge penalty of both regressions.
    pub ridge_alpha: f64,
}

/// All trained change hypotheses for one forward model and protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeModel {
    /// User-facing model name.
    pub model_name: String,
    /// Identifier of the forward model that generated the training data.
    pub forward_model: String,
    /// Forward-model parameters, in order.
    pub parameter_names: Vec<String>,
    /// Protocol this model is valid for.
    pub fingerprint: ProtocolFingerprint,
    /// Priors the training samples were drawn from.
    pub priors: PriorRegistry,
    /// One entry per change hypothesis.
    pub candidates: Vec<CandidateModel>,
    /// Training bookkeeping.
    pub training: TrainingSummary,
}

impl ChangeModel {
    /// Summary-vector dimensionality observations must have.
    pub fn summary_dim(&self) -> usize {
        self.fingerprint.summary_dim
    }

    /// Candidate names in output-map order.
    pub fn candidate_names(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.name.clone()).collect()
    }

    /// Hypothesis names as they appear in inference results.
    pub fn hypothesis_names(&self, include_null: bool) -> Vec<String> {
        let mut names = Vec::with_capacity(self.candidates.len() + 1);
        if include_null {
            names.push(NULL_HYPOTHESIS.to_string());
        }
        names.extend(self.candidates.iter().map(|c| c.name.clone()));
        names
    }

    /// Look up a candidate by name.
    pub fn candidate(&self, name: &str) -> Option<&CandidateModel> {
        self.candidates.iter().find(|c| c.name == name)
    }
}
