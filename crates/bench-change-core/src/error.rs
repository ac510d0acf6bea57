//! Error types for change-model training and inference.
//!
//! Errors fall into three groups with different propagation rules:
//! configuration errors abort before any simulation starts, numerical errors
//! are scoped to a single training sample or voxel, and dimension mismatches
//! are fatal and name the offending sizes.

use std::fmt;

/// Invalid model, prior or hypothesis configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A change vector or prior refers to a parameter the forward model does not have.
    UnknownParameter {
        /// The unrecognised parameter name.
        name: String,
        /// Parameters the forward model defines.
        available: Vec<String>,
    },

    /// The prior registry does not cover exactly the forward model's parameters.
    PriorMismatch {
        /// Model parameters without a prior.
        missing: Vec<String>,
        /// Priors for names the model does not define.
        extra: Vec<String>,
    },

    /// A prior has invalid hyper-parameters.
    InvalidPrior {
        /// Parameter the prior belongs to.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A change vector could not be parsed or has zero length.
    InvalidChangeVector {
        /// The offending text or rendered vector.
        text: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No candidate hypotheses were configured.
    NoCandidates,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParameter { name, available } => write!(
                f,
                "parameter '{}' is not a free parameter of the forward model (available: {})",
                name,
                available.join(", ")
            ),
            Self::PriorMismatch { missing, extra } => write!(
                f,
                "priors do not match forward model parameters (missing: [{}], unexpected: [{}])",
                missing.join(", "),
                extra.join(", ")
            ),
            Self::InvalidPrior { name, reason } => {
                write!(f, "invalid prior for '{}': {}", name, reason)
            }
            Self::InvalidChangeVector { text, reason } => {
                write!(f, "invalid change vector '{}': {}", text, reason)
            }
            Self::NoCandidates => write!(f, "no change hypotheses configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Numerical failure scoped to one training sample or one voxel.
///
/// These never abort a batch; the unit is excluded and counted instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericalError {
    /// Noise covariance failed Cholesky decomposition.
    NotPositiveDefinite,

    /// An input vector or matrix contains NaN or infinity.
    NonFiniteInput,

    /// The evidence for a hypothesis evaluated to NaN or +infinity,
    /// or every hypothesis has zero evidence.
    NonFiniteEvidence,

    /// A regression fit produced a singular system or non-finite coefficients.
    RegressionFit,

    /// The forward model produced a non-finite measurement.
    NonFiniteSimulation,
}

impl fmt::Display for NumericalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositiveDefinite => write!(f, "noise covariance is not positive definite"),
            Self::NonFiniteInput => write!(f, "input contains non-finite values (NaN/Inf)"),
            Self::NonFiniteEvidence => write!(f, "evidence is non-finite for every hypothesis"),
            Self::RegressionFit => write!(f, "regression fit is singular or diverged"),
            Self::NonFiniteSimulation => {
                write!(f, "forward model produced non-finite measurements")
            }
        }
    }
}

impl std::error::Error for NumericalError {}

/// Two arrays that must agree in size do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionMismatch {
    /// Which quantity was being checked.
    pub what: &'static str,
    /// Size required by the model or protocol.
    pub expected: usize,
    /// Size actually supplied.
    pub actual: usize,
}

impl DimensionMismatch {
    /// Return `Ok(())` when `actual == expected`.
    pub fn check(what: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self {
                what,
                expected,
                actual,
            })
        }
    }
}

impl fmt::Display for DimensionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected dimension {}, got {}",
            self.what, self.expected, self.actual
        )
    }
}

impl std::error::Error for DimensionMismatch {}

/// Failure to evaluate one voxel.
///
/// `Shape` is a caller error and should abort a batch; `Numerical` excludes
/// only the offending voxel.
#[derive(Debug, Clone, PartialEq)]
pub enum VoxelError {
    /// The observation does not match the change model's summary dimension.
    Shape(DimensionMismatch),
    /// The observation could not be evaluated numerically.
    Numerical(NumericalError),
}

impl From<DimensionMismatch> for VoxelError {
    fn from(e: DimensionMismatch) -> Self {
        Self::Shape(e)
    }
}

impl From<NumericalError> for VoxelError {
    fn from(e: NumericalError) -> Self {
        Self::Numerical(e)
    }
}

impl fmt::Display for VoxelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(e) => write!(f, "{}", e),
            Self::Numerical(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for VoxelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shape(e) => Some(e),
            Self::Numerical(e) => Some(e),
        }
    }
}
