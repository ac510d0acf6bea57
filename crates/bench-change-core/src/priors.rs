//! Prior distributions over forward-model parameters.
//!
//! Priors are a small closed family rather than an opaque statistics-library
//! object, so they can be persisted with a trained model and validated
//! before any simulation starts.
//!
//! Parameters are sampled independently. This is a modelling simplification:
//! the true biophysical parameters of a tissue are not independent.

use core::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution, Gamma, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::constants::LOG_2PI;
use crate::error::ConfigError;
use crate::math::{normal_cdf, sq};

/// Maximum rejection-sampling attempts for the truncated normal.
const MAX_REJECTION_ATTEMPTS: usize = 10_000;

/// Univariate prior distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Prior {
    /// Uniform on `[low, high]`.
    Uniform {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Normal with mean and standard deviation.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        std: f64,
    },
    /// Normal restricted to `[low, high]`.
    TruncatedNormal {
        /// Mean of the untruncated normal.
        mean: f64,
        /// Standard deviation of the untruncated normal.
        std: f64,
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Gamma with shape k and scale θ.
    Gamma {
        /// Shape k.
        shape: f64,
        /// Scale θ.
        scale: f64,
    },
    /// exp(N(mu, sigma²)).
    LogNormal {
        /// Mean of the log.
        mu: f64,
        /// Standard deviation of the log.
        sigma: f64,
    },
}

impl Prior {
    /// Uniform on `[low, high]`.
    pub fn uniform(low: f64, high: f64) -> Self {
        Self::Uniform { low, high }
    }

    /// Normal with mean and standard deviation.
    pub fn normal(mean: f64, std: f64) -> Self {
        Self::Normal { mean, std }
    }

    /// Check hyper-parameters. Returns a description of the problem if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let finite = |xs: &[f64]| xs.iter().all(|x| x.is_finite());
        match *self {
            Self::Uniform { low, high } => {
                if !finite(&[low, high]) || low >= high {
                    return Err(format!("uniform bounds must satisfy low < high, got [{low}, {high}]"));
                }
            }
            Self::Normal { mean, std } => {
                if !finite(&[mean, std]) || std <= 0.0 {
                    return Err(format!("normal std must be positive, got {std}"));
                }
            }
            Self::TruncatedNormal { mean, std, low, high } => {
                if !finite(&[mean, std, low, high]) || std <= 0.0 || low >= high {
                    return Err("truncated normal needs std > 0 and low < high".to_string());
                }
                if normal_cdf((high - mean) / std) - normal_cdf((low - mean) / std) <= 0.0 {
                    return Err("truncation interval has no probability mass".to_string());
                }
            }
            Self::Gamma { shape, scale } => {
                if !finite(&[shape, scale]) || shape <= 0.0 || scale <= 0.0 {
                    return Err(format!("gamma shape and scale must be positive, got ({shape}, {scale})"));
                }
            }
            Self::LogNormal { mu, sigma } => {
                if !finite(&[mu, sigma]) || sigma <= 0.0 {
                    return Err(format!("lognormal sigma must be positive, got {sigma}"));
                }
            }
        }
        Ok(())
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Uniform { low, high } => low + (high - low) * rng.random::<f64>(),
            Self::Normal { mean, std } => mean + std * standard_normal(rng),
            Self::TruncatedNormal { mean, std, low, high } => {
                for _ in 0..MAX_REJECTION_ATTEMPTS {
                    let x = mean + std * standard_normal(rng);
                    if (low..=high).contains(&x) {
                        return x;
                    }
                }
                // Mass far in a tail: fall back to the nearest bound
                mean.clamp(low, high)
            }
            Self::Gamma { shape, scale } => match Gamma::new(shape, scale) {
                Ok(dist) => dist.sample(rng),
                Err(_) => f64::NAN,
            },
            Self::LogNormal { mu, sigma } => (mu + sigma * standard_normal(rng)).exp(),
        }
    }

    /// Draw `n` values.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    /// Log density at `x`; `-inf` outside the support.
    pub fn log_density(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return f64::NEG_INFINITY;
        }
        match *self {
            Self::Uniform { low, high } => {
                if (low..=high).contains(&x) {
                    -(high - low).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Self::Normal { mean, std } => -0.5 * (LOG_2PI + sq((x - mean) / std)) - std.ln(),
            Self::TruncatedNormal { mean, std, low, high } => {
                if !(low..=high).contains(&x) {
                    return f64::NEG_INFINITY;
                }
                let mass = normal_cdf((high - mean) / std) - normal_cdf((low - mean) / std);
                -0.5 * (LOG_2PI + sq((x - mean) / std)) - std.ln() - mass.ln()
            }
            Self::Gamma { shape, scale } => {
                if x <= 0.0 {
                    return f64::NEG_INFINITY;
                }
                (shape - 1.0) * x.ln() - x / scale - libm::lgamma(shape) - shape * scale.ln()
            }
            Self::LogNormal { mu, sigma } => {
                if x <= 0.0 {
                    return f64::NEG_INFINITY;
                }
                let z = (x.ln() - mu) / sigma;
                -0.5 * (LOG_2PI + z * z) - sigma.ln() - x.ln()
            }
        }
    }

    /// Whether `x` lies in the support.
    pub fn contains(&self, x: f64) -> bool {
        self.log_density(x) > f64::NEG_INFINITY
    }

    /// Distribution mean.
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Uniform { low, high } => 0.5 * (low + high),
            Self::Normal { mean, .. } => mean,
            Self::TruncatedNormal { mean, std, low, high } => {
                let (alpha, beta, mass) = truncation_terms(mean, std, low, high);
                mean + std * (std_normal_pdf(alpha) - std_normal_pdf(beta)) / mass
            }
            Self::Gamma { shape, scale } => shape * scale,
            Self::LogNormal { mu, sigma } => (mu + 0.5 * sigma * sigma).exp(),
        }
    }

    /// Distribution standard deviation.
    pub fn std_dev(&self) -> f64 {
        match *self {
            Self::Uniform { low, high } => (high - low) / 12f64.sqrt(),
            Self::Normal { std, .. } => std,
            Self::TruncatedNormal { mean, std, low, high } => {
                let (alpha, beta, mass) = truncation_terms(mean, std, low, high);
                let (pa, pb) = (std_normal_pdf(alpha), std_normal_pdf(beta));
                // Infinite bounds contribute zero to the α·φ(α) terms
                let ta = if alpha.is_finite() { alpha * pa } else { 0.0 };
                let tb = if beta.is_finite() { beta * pb } else { 0.0 };
                let shift = (pa - pb) / mass;
                let var = sq(std) * (1.0 + (ta - tb) / mass - shift * shift);
                var.max(0.0).sqrt()
            }
            Self::Gamma { shape, scale } => shape.sqrt() * scale,
            Self::LogNormal { mu, sigma } => {
                let s2 = sigma * sigma;
                ((s2.exp() - 1.0) * (2.0 * mu + s2).exp()).sqrt()
            }
        }
    }
}

fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

fn std_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

fn truncation_terms(mean: f64, std: f64, low: f64, high: f64) -> (f64, f64, f64) {
    let alpha = (low - mean) / std;
    let beta = (high - mean) / std;
    (alpha, beta, normal_cdf(beta) - normal_cdf(alpha))
}

/// Ordered mapping from parameter name to prior.
///
/// The order defines the layout of parameter vectors passed to forward models.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriorRegistry {
    entries: Vec<(String, Prior)>,
}

impl PriorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a prior.
    pub fn with(mut self, name: impl Into<String>, prior: Prior) -> Self {
        self.insert(name, prior);
        self
    }

    /// Add or replace a prior in place.
    pub fn insert(&mut self, name: impl Into<String>, prior: Prior) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = prior,
            None => self.entries.push((name, prior)),
        }
    }

    /// Look up the prior for a parameter.
    pub fn get(&self, name: &str) -> Result<&Prior, ConfigError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
            .ok_or_else(|| ConfigError::UnknownParameter {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Parameter names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Iterate over `(name, prior)` in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prior)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every prior and check the registry covers exactly `parameters`.
    pub fn validate_against(&self, parameters: &[String]) -> Result<(), ConfigError> {
        for (name, prior) in &self.entries {
            prior.validate().map_err(|reason| ConfigError::InvalidPrior {
                name: name.clone(),
                reason,
            })?;
        }

        let names = self.names();
        let missing: Vec<String> = parameters
            .iter()
            .filter(|p| !names.contains(p))
            .cloned()
            .collect();
        let extra: Vec<String> = names
            .iter()
            .filter(|n| !parameters.contains(n))
            .cloned()
            .collect();
        if missing.is_empty() && extra.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::PriorMismatch { missing, extra })
        }
    }

    /// Reorder to match `parameters`. Call after [`validate_against`](Self::validate_against).
    pub fn ordered_as(&self, parameters: &[String]) -> Result<Self, ConfigError> {
        let entries = parameters
            .iter()
            .map(|p| self.get(p).map(|prior| (p.clone(), *prior)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Draw one parameter vector in registry order.
    pub fn sample_vector<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.entries.iter().map(|(_, p)| p.sample(rng)).collect()
    }

    /// Whether every component of `params` lies in its prior's support.
    pub fn supports(&self, params: &[f64]) -> bool {
        params.len() == self.entries.len()
            && self.entries.iter().zip(params).all(|((_, p), &x)| p.contains(x))
    }
}
