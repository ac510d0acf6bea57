use crate::acquisition::Acquisition;
use crate::priors::{Prior, PriorRegistry};
use crate::types::Vector;

use super::ForwardModel;

/// One-parameter toy model: measurementᵢ = bᵢ · radius².
///
/// Useful as a sanity check: the sensitivity to radius is 2·b·radius in
/// closed form.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quadratic;

impl ForwardModel for Quadratic {
    fn name(&self) -> &str {
        "quadratic"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["radius".to_string()]
    }

    fn default_priors(&self) -> PriorRegistry {
        PriorRegistry::new().with("radius", Prior::uniform(1.0, 2.0))
    }

    fn simulate(&self, params: &[f64], acquisition: &Acquisition) -> Vector {
        let radius = params[0];
        Vector::from_iterator(
            acquisition.n_measurements(),
            acquisition.measurements().map(|(b, _)| b * radius * radius),
        )
    }
}
