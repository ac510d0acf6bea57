//! Persistence of trained change models.
//!
//! An artifact is a single JSON document holding a format version and the
//! complete [`ChangeModel`]: forward-model identity, protocol fingerprint,
//! priors and every candidate's regressions. Artifacts are loaded once per
//! batch and shared read-only.

use std::fs;
use std::path::Path;

use bench_change_core::statistics::tril_len;
use bench_change_core::{ChangeModel, ProtocolFingerprint};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Version written by this crate. Artifacts with any other version are rejected.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format_version: u32,
    change_model: &'a ChangeModel,
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
}

#[derive(Deserialize)]
struct Artifact {
    change_model: ChangeModel,
}

/// Serialise a change model to an artifact string.
pub fn to_json(model: &ChangeModel) -> Result<String> {
    let artifact = ArtifactRef {
        format_version: ARTIFACT_FORMAT_VERSION,
        change_model: model,
    };
    Ok(serde_json::to_string_pretty(&artifact)?)
}

/// Parse an artifact string, checking its version and internal consistency.
pub fn from_json(json: &str) -> Result<ChangeModel> {
    let header: ArtifactHeader = serde_json::from_str(json)?;
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(Error::IncompatibleArtifact {
            found: header.format_version,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    let artifact: Artifact = serde_json::from_str(json)?;
    check_consistency(&artifact.change_model)?;
    Ok(artifact.change_model)
}

/// Write a change model artifact to `path`.
pub fn save_model(model: &ChangeModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_json(model)?)?;
    info!(path = %path.display(), model_name = %model.model_name, "Saved change model");
    Ok(())
}

/// Read a change model artifact from `path`.
pub fn load_model(path: impl AsRef<Path>) -> Result<ChangeModel> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::ArtifactNotFound {
            path: path.to_path_buf(),
        });
    }
    let model = from_json(&fs::read_to_string(path)?)?;
    info!(
        path = %path.display(),
        model_name = %model.model_name,
        n_candidates = model.candidates.len(),
        "Loaded change model"
    );
    Ok(model)
}

/// Fail with [`Error::ProtocolMismatch`] unless `observed` matches the
/// protocol the model was trained on.
pub fn ensure_compatible(model: &ChangeModel, observed: &ProtocolFingerprint) -> Result<()> {
    match model.fingerprint.difference(observed) {
        None => Ok(()),
        Some(detail) => Err(Error::ProtocolMismatch { detail }),
    }
}

fn check_consistency(model: &ChangeModel) -> Result<()> {
    let dim = model.summary_dim();
    let corrupt = |message: String| -> Result<()> { Err(Error::CorruptArtifact { message }) };

    for candidate in &model.candidates {
        for (what, fit, outputs) in [
            ("sensitivity", &candidate.sensitivity, dim),
            ("spread", &candidate.spread, tril_len(dim)),
        ] {
            let coef = &fit.coefficients;
            if coef.data.len() != coef.rows * coef.cols {
                return corrupt(format!("{} coefficients of '{}' have the wrong length", what, candidate.name));
            }
            if coef.rows != fit.exponents.len() || coef.cols != outputs {
                return corrupt(format!(
                    "{} regression of '{}' is {}x{}, expected {}x{}",
                    what,
                    candidate.name,
                    coef.rows,
                    coef.cols,
                    fit.exponents.len(),
                    outputs
                ));
            }
            if fit.n_inputs() != dim || fit.input_scale.len() != dim {
                return corrupt(format!(
                    "{} regression of '{}' takes {} inputs, summary has {}",
                    what,
                    candidate.name,
                    fit.n_inputs(),
                    dim
                ));
            }
        }
    }
    Ok(())
}
