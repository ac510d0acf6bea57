//! Change hypotheses: unit-norm directions in parameter space plus the sign
//! of change they allow.
//!
//! The text form follows the convention used on the command line of the
//! original tooling:
//!
//! ```text
//! d_a                         # d_a changes, either sign
//! f_in, positive              # f_in increases
//! d_a - 0.5*f_in, negative    # joint change, decreasing along the vector
//! f_in, positive negative     # two hypotheses, one per sign
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sign constraint on the amount of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Any sign.
    TwoSided,
    /// Amount > 0.
    Positive,
    /// Amount < 0.
    Negative,
}

impl Direction {
    /// Parse `twosided`, `positive` or `negative` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twosided" | "two_sided" | "two-sided" => Some(Self::TwoSided),
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoSided => "twosided",
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    /// Whether `amount` is allowed.
    pub fn allows(&self, amount: f64) -> bool {
        match self {
            Self::TwoSided => true,
            Self::Positive => amount >= 0.0,
            Self::Negative => amount <= 0.0,
        }
    }

    /// Clamp `amount` to the allowed half line.
    pub fn clamp(&self, amount: f64) -> f64 {
        match self {
            Self::TwoSided => amount,
            Self::Positive => amount.max(0.0),
            Self::Negative => amount.min(0.0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit-L2-norm weighting over parameter names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeVector {
    weights: Vec<(String, f64)>,
}

impl ChangeVector {
    /// Change in a single parameter.
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            weights: vec![(name.into(), 1.0)],
        }
    }

    /// Create from raw weights, summing repeated names, dropping zeros and
    /// normalising to unit length.
    pub fn new(raw: Vec<(String, f64)>) -> Result<Self, ConfigError> {
        let mut weights: Vec<(String, f64)> = Vec::with_capacity(raw.len());
        for (name, w) in raw {
            match weights.iter_mut().find(|(n, _)| *n == name) {
                Some((_, total)) => *total += w,
                None => weights.push((name, w)),
            }
        }
        weights.retain(|(_, w)| *w != 0.0);
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(ConfigError::InvalidChangeVector {
                text: render(&weights),
                reason: "change vector must have finite, non-zero length".to_string(),
            });
        }
        Ok(Self {
            weights: weights.into_iter().map(|(n, w)| (n, w / norm)).collect(),
        })
    }

    /// Parse the expression part of a change vector, e.g. `"d_a - 0.5*f_in"`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidChangeVector {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let compact = text
            .replace("+ ", "+")
            .replace("- ", "-")
            .replace("* ", "*")
            .replace(" *", "*");

        let mut weights = Vec::new();
        for term in compact.split_whitespace() {
            let (sign, term) = match term.as_bytes()[0] {
                b'+' => (1.0, &term[1..]),
                b'-' => (-1.0, &term[1..]),
                _ => (1.0, term),
            };
            let (coef, name) = match term.split_once('*') {
                Some((c, n)) => (
                    c.parse::<f64>().map_err(|_| invalid("coefficient is not a number"))?,
                    n,
                ),
                None => (1.0, term),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid("parameter names may only contain letters, digits and '_'"));
            }
            weights.push((name.to_string(), sign * coef));
        }
        if weights.is_empty() {
            return Err(invalid("empty change vector"));
        }
        Self::new(weights)
    }

    /// Non-zero unit-norm weights in declaration order.
    pub fn weights(&self) -> &[(String, f64)] {
        &self.weights
    }

    /// Weight for `name`, zero if absent.
    pub fn weight(&self, name: &str) -> f64 {
        self.weights
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0.0, |(_, w)| *w)
    }

    /// Dense weights in the order of `parameters`.
    pub fn to_dense(&self, parameters: &[String]) -> Result<Vec<f64>, ConfigError> {
        for (name, _) in &self.weights {
            if !parameters.contains(name) {
                return Err(ConfigError::UnknownParameter {
                    name: name.clone(),
                    available: parameters.to_vec(),
                });
            }
        }
        Ok(parameters.iter().map(|p| self.weight(p)).collect())
    }
}

impl fmt::Display for ChangeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.weights))
    }
}

/// Render `{a: 1, b: -0.5}` as `"a - 0.5*b"` (one decimal place, unit
/// coefficients omitted).
fn render(weights: &[(String, f64)]) -> String {
    let mut out = String::new();
    for (i, (name, w)) in weights.iter().enumerate() {
        let coef = format!("{:.1}", w.abs());
        let term = if coef == "1.0" {
            name.clone()
        } else {
            format!("{coef}*{name}")
        };
        match (i, *w < 0.0) {
            (0, false) => out.push_str(&term),
            (0, true) => {
                out.push('-');
                out.push_str(&term);
            }
            (_, false) => {
                out.push_str(" + ");
                out.push_str(&term);
            }
            (_, true) => {
                out.push_str(" - ");
                out.push_str(&term);
            }
        }
    }
    out
}

/// One hypothesis to train: a change vector, a sign constraint and a prior weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Direction in parameter space.
    pub vector: ChangeVector,
    /// Allowed sign of the change amount.
    pub direction: Direction,
    /// Unnormalised prior probability of this hypothesis.
    pub prior_weight: f64,
}

impl CandidateSpec {
    /// Two-sided change in one parameter with unit prior weight.
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            vector: ChangeVector::single(name),
            direction: Direction::TwoSided,
            prior_weight: 1.0,
        }
    }

    /// Display name, e.g. `"d_a, twosided"`.
    pub fn name(&self) -> String {
        format!("{}, {}", self.vector, self.direction)
    }

    /// One two-sided hypothesis per parameter.
    pub fn one_per_parameter(parameters: &[String]) -> Vec<Self> {
        parameters.iter().map(Self::single).collect()
    }
}

/// Parse change-vector lines into candidate hypotheses.
///
/// Each line is `expression[, direction ...]` with an optional `#` comment.
/// A line listing several directions yields one candidate per direction.
/// Blank and comment-only lines are skipped.
pub fn parse_change_vectors<S: AsRef<str>>(lines: &[S]) -> Result<Vec<CandidateSpec>, ConfigError> {
    let mut candidates = Vec::new();
    for line in lines {
        let line = line.as_ref();
        let text = line.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }

        let (expr, dirs) = match text.split_once(',') {
            Some((e, d)) => (e, d),
            None => (text, ""),
        };
        let vector = ChangeVector::parse(expr.trim())?;

        let mut directions = Vec::new();
        for token in dirs.split_whitespace() {
            let direction = Direction::parse(token).ok_or_else(|| ConfigError::InvalidChangeVector {
                text: line.to_string(),
                reason: format!(
                    "direction should be any of [twosided, positive, negative] but got '{token}'"
                ),
            })?;
            directions.push(direction);
        }
        if directions.is_empty() {
            directions.push(Direction::TwoSided);
        }

        for direction in directions {
            candidates.push(CandidateSpec {
                vector: vector.clone(),
                direction,
                prior_weight: 1.0,
            });
        }
    }
    Ok(candidates)
}
