//! Posterior probabilities over change hypotheses.

use crate::change_model::ChangeModel;
use crate::error::{DimensionMismatch, NumericalError, VoxelError};
use crate::math::log_sum_exp;
use crate::result::VoxelInference;
use crate::types::Observation;

use super::evidence::{analytic_evidence, null_log_evidence, quadrature_evidence, CandidateEvidence, NoiseModel};
use super::{AmountPrior, EvidenceMethod, InferenceSettings};

/// Compare every change hypothesis of `model` against one observation.
///
/// Evidences stay in log space until the final normalisation. A voxel whose
/// noise covariance is not positive definite, whose inputs are non-finite or
/// whose evidences are all zero or NaN fails with [`VoxelError::Numerical`];
/// an observation of the wrong dimension fails with [`VoxelError::Shape`].
pub fn infer_voxel(
    model: &ChangeModel,
    observation: &Observation,
    settings: &InferenceSettings,
) -> Result<VoxelInference, VoxelError> {
    DimensionMismatch::check("observation summary", model.summary_dim(), observation.dim())?;
    observation.check_finite()?;

    let noise = NoiseModel::new(&observation.delta, &observation.covariance)?;

    let mut evidences = Vec::with_capacity(model.candidates.len() + 1);
    let mut weights = Vec::with_capacity(model.candidates.len() + 1);
    if settings.include_null_hypothesis {
        evidences.push(CandidateEvidence {
            log_evidence: null_log_evidence(&noise),
            amount: 0.0,
        });
        weights.push(1.0);
    }

    for candidate in &model.candidates {
        let tau = match settings.amount_prior {
            AmountPrior::ParameterPrior => candidate.amount_prior_sd,
            AmountPrior::Fixed { sigma } => sigma,
        };
        let prediction = candidate.predict_change(&observation.baseline)?;
        if prediction.mean.iter().any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFiniteInput.into());
        }

        let evidence = match settings.evidence_method {
            EvidenceMethod::Analytic => {
                analytic_evidence(&noise, &prediction.mean, tau, candidate.direction)
            }
            EvidenceMethod::Quadrature => quadrature_evidence(
                &noise,
                &prediction,
                tau,
                candidate.direction,
                settings.quadrature_points,
            ),
        };
        evidences.push(evidence);
        weights.push(candidate.prior_weight);
    }

    let log_evidence: Vec<f64> = evidences.iter().map(|e| e.log_evidence).collect();
    if log_evidence.iter().any(|v| v.is_nan() || *v == f64::INFINITY) {
        return Err(NumericalError::NonFiniteEvidence.into());
    }

    let total_weight: f64 = weights.iter().sum();
    let log_joint: Vec<f64> = log_evidence
        .iter()
        .zip(&weights)
        .map(|(ev, w)| ev + (w / total_weight).ln())
        .collect();
    let log_norm = log_sum_exp(&log_joint);
    if !log_norm.is_finite() {
        return Err(NumericalError::NonFiniteEvidence.into());
    }

    let posterior: Vec<f64> = log_joint.iter().map(|lj| (lj - log_norm).exp()).collect();
    let best = posterior
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
        .0;

    Ok(VoxelInference {
        log_evidence,
        posterior,
        amounts: evidences.iter().map(|e| e.amount).collect(),
        best,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_model::fixtures::{linear_candidate, model_with};
    use crate::change_vector::Direction;
    use crate::types::{Matrix, Vector};

    fn two_candidate_model() -> ChangeModel {
        model_with(vec![
            linear_candidate("a", &[1.0, 0.2], 0.5),
            linear_candidate("b", &[0.1, 1.0], 0.5),
        ])
    }

    fn observation(delta: &[f64], variance: f64) -> Observation {
        let dim = delta.len();
        Observation::new(
            Vector::from_element(dim, 0.5),
            Vector::from_column_slice(delta),
            Matrix::identity(dim, dim) * variance,
        )
        .unwrap()
    }

    #[test]
    fn test_identifies_changed_parameter() {
        let model = two_candidate_model();
        let inf = infer_voxel(&model, &observation(&[0.3, 0.06], 1e-3), &InferenceSettings::default()).unwrap();
        assert_eq!(inf.best, 0);
        assert!(inf.posterior[0] > 0.99);
        assert!((inf.amounts[0] - 0.3).abs() < 0.01);
        assert!((inf.posterior.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_delta_gives_zero_amounts() {
        let model = two_candidate_model();
        for method in [EvidenceMethod::Analytic, EvidenceMethod::Quadrature] {
            let settings = InferenceSettings {
                evidence_method: method,
                ..InferenceSettings::default()
            };
            let inf = infer_voxel(&model, &observation(&[0.0, 0.0], 0.01), &settings).unwrap();
            assert!(inf.amounts.iter().all(|a| a.abs() < 1e-6), "{:?}", inf.amounts);
            // Equal response magnitudes: nothing favours either candidate
            assert!((inf.posterior[0] - 0.5).abs() < 0.01, "{:?}", inf.posterior);
        }
    }

    #[test]
    fn test_null_hypothesis_wins_without_change() {
        let model = two_candidate_model();
        let settings = InferenceSettings {
            include_null_hypothesis: true,
            ..InferenceSettings::default()
        };
        let inf = infer_voxel(&model, &observation(&[0.0, 0.0], 1e-3), &settings).unwrap();
        assert_eq!(inf.len(), 3);
        assert_eq!(inf.best, 0);
        assert_eq!(inf.amounts[0], 0.0);
    }

    #[test]
    fn test_prior_weights_shift_posterior() {
        let mut model = two_candidate_model();
        let obs = observation(&[0.0, 0.0], 0.01);
        let even = infer_voxel(&model, &obs, &InferenceSettings::default()).unwrap();
        model.candidates[1].prior_weight = 3.0;
        let skewed = infer_voxel(&model, &obs, &InferenceSettings::default()).unwrap();
        assert!(skewed.posterior[1] > even.posterior[1]);
        let ratio = (skewed.posterior[1] / skewed.posterior[0]) / (even.posterior[1] / even.posterior[0]);
        assert!((ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_sided_candidates_split_by_sign() {
        let mut up = linear_candidate("a", &[1.0], 0.5);
        up.direction = Direction::Positive;
        up.name = "a, positive".to_string();
        let mut down = linear_candidate("a", &[1.0], 0.5);
        down.direction = Direction::Negative;
        down.name = "a, negative".to_string();
        let model = model_with(vec![up, down]);

        let inf = infer_voxel(&model, &observation(&[-0.2], 1e-3), &InferenceSettings::default()).unwrap();
        assert_eq!(inf.best, 1);
        assert!(inf.amounts[1] < 0.0);
        assert!(inf.amounts[0].abs() < 1e-6);
    }

    #[test]
    fn test_invalid_covariance_is_numerical_error() {
        let model = two_candidate_model();
        let obs = Observation::new(
            Vector::from_element(2, 0.5),
            Vector::from_element(2, 0.1),
            Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]),
        )
        .unwrap();
        assert_eq!(
            infer_voxel(&model, &obs, &InferenceSettings::default()),
            Err(VoxelError::Numerical(NumericalError::NotPositiveDefinite))
        );

        let mut nan = observation(&[0.1, 0.1], 0.01);
        nan.covariance[(0, 1)] = f64::NAN;
        assert_eq!(
            infer_voxel(&model, &nan, &InferenceSettings::default()),
            Err(VoxelError::Numerical(NumericalError::NonFiniteInput))
        );
    }

    #[test]
    fn test_wrong_dimension_is_shape_error() {
        let model = two_candidate_model();
        let err = infer_voxel(&model, &observation(&[0.1, 0.1, 0.1], 0.01), &InferenceSettings::default()).unwrap_err();
        assert!(matches!(err, VoxelError::Shape(_)));
    }
}
