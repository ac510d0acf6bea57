use crate::acquisition::Acquisition;
use crate::constants::FREE_WATER_DIFFUSIVITY;
use crate::priors::{Prior, PriorRegistry};
use crate::types::Vector;

use super::{cos2_to_fibre, ForwardModel};

/// Three-compartment white-matter model with the fibre along z.
///
/// A free-water ball (fraction `f_csf`, diffusivity 3 µm²/ms) plus tissue made
/// of an intra-axonal stick (fraction `f_in`, axial diffusivity `d_a`) and an
/// extra-axonal zeppelin sharing `d_a` along the fibre with perpendicular
/// diffusivity `d_e_perp`:
///
/// ```text
/// S = f_csf·e^{−b·3} + (1 − f_csf)·[f_in·e^{−b·d_a·c²} + (1 − f_in)·e^{−b·(d_e_perp + (d_a − d_e_perp)·c²)}]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StickZeppelinBall;

impl ForwardModel for StickZeppelinBall {
    fn name(&self) -> &str {
        "stick_zeppelin_ball"
    }

    fn parameter_names(&self) -> Vec<String> {
        ["f_in", "d_a", "d_e_perp", "f_csf"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn default_priors(&self) -> PriorRegistry {
        PriorRegistry::new()
            .with("f_in", Prior::uniform(0.05, 0.95))
            .with("d_a", Prior::uniform(0.5, 3.0))
            .with("d_e_perp", Prior::uniform(0.1, 1.5))
            .with("f_csf", Prior::uniform(0.0, 0.5))
    }

    fn simulate(&self, params: &[f64], acquisition: &Acquisition) -> Vector {
        let (f_in, d_a, d_e_perp, f_csf) = (params[0], params[1], params[2], params[3]);
        Vector::from_iterator(
            acquisition.n_measurements(),
            acquisition.measurements().map(|(b, g)| {
                let c2 = cos2_to_fibre(g);
                let stick = (-b * d_a * c2).exp();
                let zeppelin = (-b * (d_e_perp + (d_a - d_e_perp) * c2)).exp();
                let ball = (-b * FREE_WATER_DIFFUSIVITY).exp();
                f_csf * ball + (1.0 - f_csf) * (f_in * stick + (1.0 - f_in) * zeppelin)
            }),
        )
    }
}
