//! # bench-change
//!
//! Bayesian estimation of change between two populations without inverting
//! the biophysical model for either of them.
//!
//! Training simulates how a rotation-invariant summary of the measurements
//! responds to a small change in each model parameter, across the prior
//! support, and learns that response as a function of the baseline summary.
//! Inference then asks, per voxel: given the baseline summary, the observed
//! group difference and its noise covariance, which single-parameter change
//! explains the difference best, and by how much did that parameter change?
//!
//! ## Quick Start
//!
//! ```ignore
//! use bench_change::{run_inference, save_model, InferenceConfig, ObservationBatch, TrainConfig, Trainer};
//! use bench_change_core::{Acquisition, SummaryReduction};
//!
//! // Offline, once per forward model and protocol
//! let acquisition = Acquisition::multi_shell(&[0.0, 1.0, 2.0], 32);
//! let model = Trainer::builtin("stick_zeppelin_ball", acquisition)?
//!     .reduction(SummaryReduction::ShellInvariants)
//!     .config(TrainConfig::balanced().seed(42))
//!     .train()?;
//! save_model(&model, "standard_model.json")?;
//!
//! // Per study, with observations from the group-level linear model
//! let batch = ObservationBatch::new(fingerprint, baseline, delta, covariance, mask)?;
//! let maps = run_inference(&model, &batch, &InferenceConfig::default())?;
//! println!("{} voxels excluded", maps.n_excluded);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): train and infer across threads with rayon
//! - `progress-bars`: show indicatif progress for training and inference

#![warn(missing_docs)]
#![warn(clippy::all)]

mod artifact;
mod batch;
mod config;
mod error;
mod progress;
mod simulation;
mod trainer;

pub use artifact::{ensure_compatible, from_json, load_model, save_model, to_json, ARTIFACT_FORMAT_VERSION};
pub use batch::{run_inference, InferenceMaps, ObservationBatch, VoxelStatus};
pub use config::{InferenceConfig, TrainConfig};
pub use error::{Error, Result};
pub use simulation::{generate_test_samples, performance_measures, PerformanceMeasures, TestSamples};
pub use trainer::{amount_prior_sd, Trainer, TrainingSamples};

// Re-export the core types users need alongside the high-level API
pub use bench_change_core::{
    Acquisition, AmountPrior, CandidateSpec, ChangeModel, ChangeVector, Direction, EvidenceMethod,
    ForwardModel, Observation, Prior, PriorRegistry, ProtocolFingerprint, SummaryReduction,
    VoxelInference,
};
