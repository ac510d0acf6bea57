//! Errors that abort a training or inference run.
//!
//! Voxel- and sample-scoped numerical failures are not errors at this level:
//! they are recorded per unit and surfaced as counts.

use std::path::PathBuf;

use bench_change_core::{ConfigError, DimensionMismatch, NumericalError};

/// Fatal errors from training, persistence and batch inference.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model, prior or hypothesis configuration is inconsistent.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No built-in forward model has this name.
    #[error("unknown forward model '{name}' (available: {})", available.join(", "))]
    UnknownForwardModel {
        /// The requested name.
        name: String,
        /// Names of the built-in models.
        available: Vec<String>,
    },

    /// A configuration struct failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What failed validation.
        message: String,
    },

    /// Input arrays do not have the shapes the model or each other require.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(#[from] DimensionMismatch),

    /// Observations were produced under a different protocol than the model.
    #[error("protocol mismatch between change model and observations: {detail}")]
    ProtocolMismatch {
        /// First difference between the two fingerprints.
        detail: String,
    },

    /// The artifact was written by an incompatible format version.
    #[error("incompatible artifact format version {found} (expected {expected})")]
    IncompatibleArtifact {
        /// Version stored in the artifact.
        found: u32,
        /// Version this crate reads and writes.
        expected: u32,
    },

    /// No artifact exists at the given path.
    #[error("change model artifact not found: {}", path.display())]
    ArtifactNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The artifact parsed but its contents are inconsistent.
    #[error("corrupt change model artifact: {message}")]
    CorruptArtifact {
        /// The inconsistency found.
        message: String,
    },

    /// Training failed as a whole (e.g. every sample was discarded).
    #[error("training failed: {message}")]
    Training {
        /// Why training could not complete.
        message: String,
    },

    /// A regression could not be fitted for a candidate.
    #[error("fitting change model for '{candidate}' failed: {source}")]
    Fit {
        /// Change vector whose regressions failed.
        candidate: String,
        /// The numerical failure.
        #[source]
        source: NumericalError,
    },

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact (de)serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
