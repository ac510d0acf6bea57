//! Marginal likelihood of an observed change under one hypothesis.
//!
//! All evidences are natural logarithms. Both integration methods share the
//! conjugate quantities
//!
//! - q = μᵀΣ⁻¹μ, r = μᵀΣ⁻¹Δ, d = ΔᵀΣ⁻¹Δ
//! - P = q + 1/τ², m = r/P, s = 1/√P
//!
//! which give the exact answer when the response spread Σ_p is ignored and
//! locate the integrand's peak when it is not.

use core::f64::consts::LN_2;

use nalgebra::{Cholesky, Dyn};

use crate::change_model::ChangePrediction;
use crate::change_vector::Direction;
use crate::constants::{LOG_2PI, PEAK_SEARCH_HALF_WIDTH, PRIOR_HALF_WIDTH, QUADRATURE_HALF_WIDTH};
use crate::error::NumericalError;
use crate::math::{golden_section_max, log_normal_cdf, normal_log_pdf, simpson};
use crate::types::{Matrix, Vector};

/// Evidence and change amount for one hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateEvidence {
    /// ln p(Δ | H).
    pub log_evidence: f64,
    /// Most probable change amount under H.
    pub amount: f64,
}

/// Factorised noise covariance together with the observed change.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    covariance: Matrix,
    chol: Cholesky<f64, Dyn>,
    log_det: f64,
    delta: Vector,
    delta_quad: f64,
}

impl NoiseModel {
    /// Factorise Σ (symmetrised) and precompute ΔᵀΣ⁻¹Δ.
    ///
    /// Fails when Σ is not positive definite or either input is non-finite.
    pub fn new(delta: &Vector, covariance: &Matrix) -> Result<Self, NumericalError> {
        if delta.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFiniteInput);
        }
        let covariance = (covariance + covariance.transpose()) * 0.5;
        let chol = Cholesky::new(covariance.clone()).ok_or(NumericalError::NotPositiveDefinite)?;
        // A zero pivot factorises but is only semi-definite
        if chol.l_dirty().diagonal().iter().any(|&d| d <= 0.0 || !d.is_finite()) {
            return Err(NumericalError::NotPositiveDefinite);
        }
        let log_det = log_det(&chol);
        let delta_quad = delta.dot(&chol.solve(delta));
        Ok(Self {
            covariance,
            chol,
            log_det,
            delta: delta.clone(),
            delta_quad,
        })
    }

    /// Summary dimensionality.
    pub fn dim(&self) -> usize {
        self.delta.len()
    }

    /// ln N(Δ; a·μ, Σ + a²Σ_p), or `-inf` if that covariance is not positive definite.
    fn log_likelihood(&self, amount: f64, prediction: &ChangePrediction, spread_scale: f64) -> f64 {
        let resid = &self.delta - &prediction.mean * amount;
        let n = self.dim() as f64;

        if amount * amount * spread_scale <= f64::EPSILON * self.noise_scale() {
            let quad = resid.dot(&self.chol.solve(&resid));
            return -0.5 * (n * LOG_2PI + self.log_det + quad);
        }

        let cov = &self.covariance + &prediction.covariance * (amount * amount);
        match Cholesky::new(cov) {
            Some(chol) => {
                let quad = resid.dot(&chol.solve(&resid));
                -0.5 * (n * LOG_2PI + log_det(&chol) + quad)
            }
            None => f64::NEG_INFINITY,
        }
    }

    fn noise_scale(&self) -> f64 {
        self.covariance.diagonal().min()
    }
}

fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|v| v.ln()).sum::<f64>()
}

/// Conjugate posterior of the amount ignoring Σ_p.
struct Conjugate {
    /// Posterior mean m.
    mean: f64,
    /// Posterior standard deviation s.
    sd: f64,
    /// Two-sided log evidence.
    log_evidence: f64,
}

fn conjugate(noise: &NoiseModel, mean: &Vector, tau: f64) -> Conjugate {
    let sinv_mu = noise.chol.solve(mean);
    let q = mean.dot(&sinv_mu);
    let r = noise.delta.dot(&sinv_mu);
    let tau2 = tau * tau;

    let precision = q + 1.0 / tau2;
    let shrink = tau2 * q;
    let log_evidence = -0.5
        * (noise.dim() as f64 * LOG_2PI + noise.log_det + shrink.ln_1p() + noise.delta_quad
            - tau2 * r * r / (1.0 + shrink));

    Conjugate {
        mean: r / precision,
        sd: precision.sqrt().recip(),
        log_evidence,
    }
}

/// Log evidence of the "no change" hypothesis, Δ ~ N(0, Σ).
pub fn null_log_evidence(noise: &NoiseModel) -> f64 {
    -0.5 * (noise.dim() as f64 * LOG_2PI + noise.log_det + noise.delta_quad)
}

/// Closed-form evidence treating the predicted response as exact.
///
/// Two-sided: Δ ~ N(0, Σ + τ²μμᵀ). One-sided hypotheses use a half-normal
/// amount prior, which multiplies the evidence by 2·Φ(±m/s).
pub fn analytic_evidence(noise: &NoiseModel, mean: &Vector, tau: f64, direction: Direction) -> CandidateEvidence {
    let c = conjugate(noise, mean, tau);
    let log_evidence = match direction {
        Direction::TwoSided => c.log_evidence,
        Direction::Positive => c.log_evidence + LN_2 + log_normal_cdf(c.mean / c.sd),
        Direction::Negative => c.log_evidence + LN_2 + log_normal_cdf(-c.mean / c.sd),
    };
    CandidateEvidence {
        log_evidence,
        amount: direction.clamp(c.mean),
    }
}

/// Evidence by numerical integration over the change amount, including Σ_p.
///
/// # Arguments
///
/// * `noise` - Factorised noise covariance and observed change
/// * `prediction` - Learned mean response and response spread
/// * `tau` - Standard deviation of the amount prior
/// * `direction` - Allowed sign of the amount
/// * `intervals` - Simpson sub-intervals
pub fn quadrature_evidence(
    noise: &NoiseModel,
    prediction: &ChangePrediction,
    tau: f64,
    direction: Direction,
    intervals: usize,
) -> CandidateEvidence {
    let c = conjugate(noise, &prediction.mean, tau);
    let spread_scale = prediction.covariance.diagonal().max();
    let log_prior_shift = match direction {
        Direction::TwoSided => 0.0,
        _ => LN_2,
    };

    let log_integrand = |a: f64| -> f64 {
        if !direction.allows(a) {
            return f64::NEG_INFINITY;
        }
        noise.log_likelihood(a, prediction, spread_scale) + normal_log_pdf(a, tau) + log_prior_shift
    };

    // The spread pulls the peak towards zero, so the bracket always reaches it
    let (lo, hi) = clip(
        direction,
        (c.mean - PEAK_SEARCH_HALF_WIDTH * c.sd).min(0.0),
        (c.mean + PEAK_SEARCH_HALF_WIDTH * c.sd).max(0.0),
        PEAK_SEARCH_HALF_WIDTH * c.sd,
    );
    let peak = golden_section_max(log_integrand, lo, hi, 1e-9 * c.sd);
    let log_peak = log_integrand(peak);
    if !log_peak.is_finite() {
        return CandidateEvidence {
            log_evidence: log_peak,
            amount: peak,
        };
    }

    // Local width from the curvature of the log integrand at its peak
    let h = 1e-3 * c.sd;
    let curvature = (log_integrand(peak + h) - 2.0 * log_peak + log_integrand(peak - h)) / (h * h);
    let local_sd = if curvature.is_finite() && curvature < 0.0 {
        (-curvature).sqrt().recip()
    } else {
        c.sd
    };

    // With a large spread the integrand decays like 1/|a| until the amount
    // prior cuts it off, so the window must cover the prior as well as the peak
    let half_width = QUADRATURE_HALF_WIDTH * local_sd.max(c.sd);
    let reach = PRIOR_HALF_WIDTH * tau;
    let (lo, hi) = clip(
        direction,
        (peak - half_width).min(-reach),
        (peak + half_width).max(reach),
        half_width,
    );

    // a = peak + w·sinh(u): fine steps at the peak, geometric steps in the tails
    let w = local_sd;
    let integral = simpson(
        |u| {
            let a = peak + w * u.sinh();
            (log_integrand(a) - log_peak).exp() * w * u.cosh()
        },
        ((lo - peak) / w).asinh(),
        ((hi - peak) / w).asinh(),
        intervals,
    );

    CandidateEvidence {
        log_evidence: log_peak + integral.ln(),
        amount: peak,
    }
}

/// Restrict `[lo, hi]` to the direction's half line, keeping it at least
/// `min_width` wide.
fn clip(direction: Direction, lo: f64, hi: f64, min_width: f64) -> (f64, f64) {
    match direction {
        Direction::TwoSided => (lo, hi),
        Direction::Positive => {
            let lo = lo.max(0.0);
            (lo, hi.max(lo + min_width))
        }
        Direction::Negative => {
            let hi = hi.min(0.0);
            (lo.min(hi - min_width), hi)
        }
    }
}
