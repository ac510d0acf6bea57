//! Forward models: deterministic maps from biophysical parameters and an
//! acquisition protocol to noiseless measurements.
//!
//! The trainer and the inference engine only ever see [`ForwardModel`];
//! concrete models differ in their functional form and parameter count.

mod ball_stick;
mod quadratic;
mod standard_model;

pub use ball_stick::BallStick;
pub use quadratic::Quadratic;
pub use standard_model::StickZeppelinBall;

use crate::acquisition::Acquisition;
use crate::priors::PriorRegistry;
use crate::types::{Matrix, Vector};

/// Deterministic forward model.
///
/// Implementations must have no hidden randomness and must be defined over
/// the full support of their default priors. Parameter slices are ordered as
/// [`parameter_names`](ForwardModel::parameter_names).
pub trait ForwardModel: Send + Sync {
    /// Identifier stored in trained artifacts.
    fn name(&self) -> &str;

    /// Ordered free-parameter names.
    fn parameter_names(&self) -> Vec<String>;

    /// Priors used for sampling when none are supplied.
    fn default_priors(&self) -> PriorRegistry;

    /// Noiseless measurement vector, one entry per acquisition measurement.
    fn simulate(&self, params: &[f64], acquisition: &Acquisition) -> Vector;

    /// Simulate many parameter vectors; row `i` is the measurement for `params[i]`.
    fn simulate_batch(&self, params: &[Vec<f64>], acquisition: &Acquisition) -> Matrix {
        let n_meas = acquisition.n_measurements();
        let mut out = Matrix::zeros(params.len(), n_meas);
        for (i, p) in params.iter().enumerate() {
            out.set_row(i, &self.simulate(p, acquisition).transpose());
        }
        out
    }
}

/// Names accepted by [`builtin`].
pub const BUILTIN_MODELS: &[&str] = &["quadratic", "ball_stick", "stick_zeppelin_ball"];

/// Look up a built-in forward model by name.
pub fn builtin(name: &str) -> Option<Box<dyn ForwardModel>> {
    match name {
        "quadratic" => Some(Box::new(Quadratic)),
        "ball_stick" => Some(Box::new(BallStick)),
        "stick_zeppelin_ball" => Some(Box::new(StickZeppelinBall)),
        _ => None,
    }
}

/// Squared cosine between a gradient direction and the fibre axis (z).
#[inline]
pub(crate) fn cos2_to_fibre(g: [f64; 3]) -> f64 {
    g[2] * g[2]
}
