//! Acquisition protocol: the shells of a diffusion acquisition and the
//! fingerprint used to check that a trained model matches a study.

use serde::{Deserialize, Serialize};

use crate::constants::BVAL_DECIMALS;
use crate::summary::SummaryReduction;

/// One shell of an acquisition: a b-value and its gradient directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shell {
    /// b-value in ms/µm².
    pub bval: f64,
    /// Unit gradient directions.
    pub directions: Vec<[f64; 3]>,
}

impl Shell {
    /// Create a shell, normalising every direction to unit length.
    ///
    /// Zero-length directions (typical for b=0 volumes) are kept as the z axis.
    pub fn new(bval: f64, directions: Vec<[f64; 3]>) -> Self {
        let directions = directions.into_iter().map(normalize).collect();
        Self {
            bval: round_bval(bval),
            directions,
        }
    }

    /// Whether this is an unweighted (b≈0) shell.
    pub fn is_unweighted(&self) -> bool {
        self.bval.abs() < 1e-6
    }
}

/// Fixed set of measurement conditions shared by every subject in a study.
///
/// Measurements are ordered shell by shell, direction by direction. Forward
/// models emit one value per measurement in this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    shells: Vec<Shell>,
}

impl Acquisition {
    /// Create an acquisition from shells.
    pub fn new(shells: Vec<Shell>) -> Self {
        Self { shells }
    }

    /// Single measurement at the given b-value along z.
    pub fn scalar(bval: f64) -> Self {
        Self::new(vec![Shell::new(bval, vec![[0.0, 0.0, 1.0]])])
    }

    /// Multi-shell acquisition with `n_directions` well-spread directions per
    /// weighted shell and a single unweighted measurement for b=0.
    pub fn multi_shell(bvals: &[f64], n_directions: usize) -> Self {
        let shells = bvals
            .iter()
            .map(|&b| {
                if b.abs() < 1e-6 {
                    Shell::new(b, vec![[0.0, 0.0, 1.0]])
                } else {
                    Shell::new(b, fibonacci_hemisphere(n_directions))
                }
            })
            .collect();
        Self::new(shells)
    }

    /// Group raw per-volume b-values and b-vectors into shells.
    ///
    /// b-values within `tolerance` of a shell's first member join that shell;
    /// shells are returned in order of first appearance.
    pub fn from_bvals_bvecs(bvals: &[f64], bvecs: &[[f64; 3]], tolerance: f64) -> Self {
        let mut shells: Vec<(f64, Vec<[f64; 3]>)> = Vec::new();
        for (&b, &g) in bvals.iter().zip(bvecs) {
            match shells.iter_mut().find(|(sb, _)| (sb - b).abs() <= tolerance) {
                Some((_, dirs)) => dirs.push(g),
                None => shells.push((b, vec![g])),
            }
        }
        Self::new(
            shells
                .into_iter()
                .map(|(b, dirs)| Shell::new(b, dirs))
                .collect(),
        )
    }

    /// Shells in measurement order.
    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    /// Total number of measurements.
    pub fn n_measurements(&self) -> usize {
        self.shells.iter().map(|s| s.directions.len()).sum()
    }

    /// Iterate over `(bval, direction)` for every measurement in order.
    pub fn measurements(&self) -> impl Iterator<Item = (f64, [f64; 3])> + '_ {
        self.shells
            .iter()
            .flat_map(|s| s.directions.iter().map(move |&g| (s.bval, g)))
    }

    /// Fingerprint of this protocol under a given summary reduction.
    pub fn fingerprint(&self, reduction: SummaryReduction) -> ProtocolFingerprint {
        ProtocolFingerprint {
            bvals: self.shells.iter().map(|s| s.bval).collect(),
            directions_per_shell: self.shells.iter().map(|s| s.directions.len()).collect(),
            reduction,
            summary_dim: reduction.prepare(self).dim(),
        }
    }
}

/// Explicit description of an acquisition protocol, stored with every
/// trained change model and compared exactly at inference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFingerprint {
    /// Shell b-values, rounded.
    pub bvals: Vec<f64>,
    /// Number of gradient directions in each shell.
    pub directions_per_shell: Vec<usize>,
    /// Reduction from measurements to summary vector.
    pub reduction: SummaryReduction,
    /// Length of the summary vector.
    pub summary_dim: usize,
}

impl ProtocolFingerprint {
    /// Describe the first difference to `other`, or `None` when identical.
    pub fn difference(&self, other: &Self) -> Option<String> {
        if self.bvals != other.bvals {
            return Some(format!("b-values {:?} vs {:?}", self.bvals, other.bvals));
        }
        if self.directions_per_shell != other.directions_per_shell {
            return Some(format!(
                "directions per shell {:?} vs {:?}",
                self.directions_per_shell, other.directions_per_shell
            ));
        }
        if self.reduction != other.reduction {
            return Some(format!(
                "summary reduction {} vs {}",
                self.reduction.name(),
                other.reduction.name()
            ));
        }
        if self.summary_dim != other.summary_dim {
            return Some(format!(
                "summary dimension {} vs {}",
                self.summary_dim, other.summary_dim
            ));
        }
        None
    }
}

/// Roughly uniform unit directions on the upper hemisphere (Fibonacci lattice).
pub fn fibonacci_hemisphere(n: usize) -> Vec<[f64; 3]> {
    let golden_angle = core::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - (i as f64 + 0.5) / n as f64;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let phi = golden_angle * i as f64;
            [r * phi.cos(), r * phi.sin(), z]
        })
        .collect()
}

fn round_bval(b: f64) -> f64 {
    let scale = 10f64.powi(BVAL_DECIMALS);
    (b * scale).round() / scale
}

fn normalize(g: [f64; 3]) -> [f64; 3] {
    let norm = (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt();
    if norm < 1e-12 {
        [0.0, 0.0, 1.0]
    } else {
        [g[0] / norm, g[1] / norm, g[2] / norm]
    }
}
