use crate::acquisition::Acquisition;
use crate::priors::{Prior, PriorRegistry};
use crate::types::Vector;

use super::{cos2_to_fibre, ForwardModel};

/// Ball-and-stick model with the fibre along z.
///
/// S(b, g) = (1 − f)·exp(−b·d) + f·exp(−b·d·(g·z)²)
#[derive(Debug, Clone, Copy, Default)]
pub struct BallStick;

impl ForwardModel for BallStick {
    fn name(&self) -> &str {
        "ball_stick"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["f_stick".to_string(), "d".to_string()]
    }

    fn default_priors(&self) -> PriorRegistry {
        PriorRegistry::new()
            .with("f_stick", Prior::uniform(0.05, 0.95))
            .with("d", Prior::uniform(0.3, 3.0))
    }

    fn simulate(&self, params: &[f64], acquisition: &Acquisition) -> Vector {
        let (f, d) = (params[0], params[1]);
        Vector::from_iterator(
            acquisition.n_measurements(),
            acquisition.measurements().map(|(b, g)| {
                let ball = (-b * d).exp();
                let stick = (-b * d * cos2_to_fibre(g)).exp();
                (1.0 - f) * ball + f * stick
            }),
        )
    }
}
