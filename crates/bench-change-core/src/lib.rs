//! Core numerics for simulation-trained change models.
//!
//! This crate contains the algorithms behind Bayesian estimation of change:
//! given a forward model and an acquisition protocol, it learns how a
//! rotation-invariant summary vector responds to a small change in each
//! model parameter, and it uses those learned responses to compare
//! single-parameter-change hypotheses for an observed group difference.
//!
//! # Features
//!
//! - `parallel`: Enable parallel nearest-neighbour moment estimation using rayon
//!
//! # Usage
//!
//! This crate is typically used through the `bench-change` crate, which adds
//! training orchestration, artifact persistence and batch inference. The
//! per-voxel building blocks can also be used directly:
//!
//! ```ignore
//! use bench_change_core::{
//!     analysis::{infer_voxel, InferenceSettings},
//!     types::Observation,
//! };
//!
//! let obs = Observation::new(baseline, delta, covariance)?;
//! let inference = infer_voxel(&change_model, &obs, &InferenceSettings::default())?;
//! println!("most likely change: {}", change_model.candidates[inference.best].name);
//! ```

pub mod acquisition;
pub mod analysis;
pub mod change_model;
pub mod change_vector;
pub mod constants;
pub mod error;
pub mod math;
pub mod models;
pub mod priors;
pub mod regression;
pub mod result;
pub mod statistics;
pub mod summary;
pub mod types;

// Re-export commonly used items at crate root
pub use acquisition::{Acquisition, ProtocolFingerprint, Shell};
pub use analysis::{infer_voxel, AmountPrior, EvidenceMethod, InferenceSettings};
pub use change_model::{CandidateModel, ChangeModel, ChangePrediction, TrainingSummary, NULL_HYPOTHESIS};
pub use change_vector::{parse_change_vectors, CandidateSpec, ChangeVector, Direction};
pub use error::{ConfigError, DimensionMismatch, NumericalError, VoxelError};
pub use models::ForwardModel;
pub use priors::{Prior, PriorRegistry};
pub use regression::PolynomialRidge;
pub use result::VoxelInference;
pub use summary::{PreparedReduction, SummaryReduction};
pub use types::{Matrix, Observation, Vector};
