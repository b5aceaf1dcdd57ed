use std::f64::consts::PI;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::models::derivatives::{self, DerivativeRequirement, Derivatives};
use crate::models::{PdeModel, StabilityHints};
use crate::Error;

/// A coefficient that is either the same along every axis or given per axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coefficient {
    Uniform(f64),
    PerAxis(Vec<f64>),
}

impl Default for Coefficient {
    fn default() -> Self {
        Coefficient::Uniform(0.0)
    }
}

impl From<f64> for Coefficient {
    fn from(value: f64) -> Self {
        Coefficient::Uniform(value)
    }
}

impl From<Vec<f64>> for Coefficient {
    fn from(values: Vec<f64>) -> Self {
        Coefficient::PerAxis(values)
    }
}

impl Coefficient {
    fn resolve(&self, name: &str, dimensions: usize) -> Result<Vec<f64>, Error> {
        let values = match self {
            Coefficient::Uniform(value) => vec![*value; dimensions],
            Coefficient::PerAxis(values) if values.len() == dimensions => values.clone(),
            Coefficient::PerAxis(values) => {
                return Err(Error::BadCoefficient {
                    name: name.to_string(),
                    reason: format!("{} components given for {} axes", values.len(), dimensions),
                })
            }
        };

        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::BadCoefficient {
                name: name.to_string(),
                reason: "components must be finite".to_string(),
            });
        }
        Ok(values)
    }
}

/// Describes the composition of an `AdvectionDiffusionModel`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvectionDiffusionDescriptor {
    pub dimensions: usize,
    pub velocity: Coefficient,
    pub diffusivity: Coefficient,
}

/// Linear advection-diffusion, `u_t = -v · ∇u + D · ∇²u` with per-axis `v` and `D`.
///
/// First derivatives are only required along axes with a nonzero velocity and second
/// derivatives only along axes with a nonzero diffusivity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "AdvectionDiffusionDescriptor",
    into = "AdvectionDiffusionDescriptor"
)]
pub struct AdvectionDiffusionModel {
    dimensions: usize,
    velocity: Vec<f64>,
    diffusivity: Vec<f64>,
    derivatives: DerivativeRequirement,
}

impl TryFrom<AdvectionDiffusionDescriptor> for AdvectionDiffusionModel {
    type Error = Error;

    fn try_from(desc: AdvectionDiffusionDescriptor) -> Result<Self, Error> {
        Self::new(desc)
    }
}

impl From<AdvectionDiffusionModel> for AdvectionDiffusionDescriptor {
    fn from(model: AdvectionDiffusionModel) -> Self {
        Self {
            dimensions: model.dimensions,
            velocity: Coefficient::PerAxis(model.velocity),
            diffusivity: Coefficient::PerAxis(model.diffusivity),
        }
    }
}

impl AdvectionDiffusionModel {
    pub fn new(desc: AdvectionDiffusionDescriptor) -> Result<Self, Error> {
        if desc.dimensions == 0 {
            return Err(Error::NoDimensions);
        }

        let velocity = desc.velocity.resolve("velocity", desc.dimensions)?;
        let diffusivity = desc.diffusivity.resolve("diffusivity", desc.dimensions)?;
        if diffusivity.iter().any(|&d| d < 0.0) {
            return Err(Error::BadCoefficient {
                name: "diffusivity".to_string(),
                reason: "components must be non-negative".to_string(),
            });
        }

        let nonzero = |values: &[f64]| {
            values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0.0)
                .map(|(axis, _)| axis)
                .collect::<Vec<_>>()
        };

        let mut derivatives = DerivativeRequirement::new(desc.dimensions);
        let advected = nonzero(&velocity);
        if !advected.is_empty() {
            derivatives.for_axes("x", Some(&advected));
        }
        let diffused = nonzero(&diffusivity);
        if !diffused.is_empty() {
            derivatives.for_axes("xx", Some(&diffused));
        }

        Ok(Self {
            dimensions: desc.dimensions,
            velocity,
            diffusivity,
            derivatives,
        })
    }

    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    pub fn diffusivity(&self) -> &[f64] {
        &self.diffusivity
    }
}

impl PdeModel for AdvectionDiffusionModel {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn required_derivatives(&self) -> &DerivativeRequirement {
        &self.derivatives
    }

    fn rhs(&self, state: ArrayViewD<f64>, supplied: &Derivatives) -> Result<ArrayD<f64>, Error> {
        if state.ndim() != self.dimensions {
            return Err(Error::DimensionMismatch {
                model: self.dimensions,
                grid: state.ndim(),
            });
        }
        self.derivatives.satisfied_by(supplied)?;

        let mut rhs = ArrayD::zeros(state.raw_dim());
        for axis in 0..self.dimensions {
            let (v, d) = (self.velocity[axis], self.diffusivity[axis]);
            if v != 0.0 {
                let u_x = supplied.get_checked(&derivatives::first(axis), state.shape())?;
                rhs.scaled_add(-v, &u_x);
            }
            if d != 0.0 {
                let u_xx = supplied.get_checked(&derivatives::second(axis), state.shape())?;
                rhs.scaled_add(d, &u_xx);
            }
        }

        Ok(rhs)
    }

    /// The fundamental solution, a unit mass released at the origin at `t = 0` and carried
    /// with the velocity. Only defined when every diffusivity is positive and `t > 0`.
    fn analytic_solution(&self, coordinates: ArrayViewD<f64>, time: f64) -> Option<ArrayD<f64>> {
        if time.is_nan() || time <= 0.0 || self.diffusivity.iter().any(|&d| d <= 0.0) {
            return None;
        }
        let last = coordinates.ndim().checked_sub(1)?;
        if coordinates.shape()[last] != self.dimensions {
            return None;
        }

        let mut solution = ArrayD::zeros(IxDyn(&coordinates.shape()[..last]));
        Zip::from(&mut solution)
            .and(coordinates.lanes(Axis(last)))
            .for_each(|u, x| {
                *u = (0..self.dimensions)
                    .map(|i| {
                        let spread = 4.0 * self.diffusivity[i] * time;
                        let offset = x[i] - self.velocity[i] * time;
                        (-offset * offset / spread).exp() / (PI * spread).sqrt()
                    })
                    .product();
            });

        Some(solution)
    }

    fn stability_hints(&self) -> StabilityHints {
        StabilityHints {
            diffusivity: self.diffusivity.clone(),
            speeds: self.velocity.iter().map(|v| v.abs()).collect(),
            reaction_rate: 0.0,
        }
    }

    fn name(&self) -> &'static str {
        "Advection-diffusion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FiniteStateGrid, GridDimension};

    fn model(dimensions: usize, velocity: Coefficient, diffusivity: Coefficient) -> AdvectionDiffusionModel {
        AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor {
            dimensions,
            velocity,
            diffusivity,
        })
        .unwrap()
    }

    #[test]
    fn zero_velocity_requires_no_first_derivatives() {
        let m = model(3, 0.0.into(), 1.0.into());
        assert_eq!(m.required_derivatives().names(), &["x0x0", "x1x1", "x2x2"]);
    }

    #[test]
    fn zero_diffusivity_requires_no_second_derivatives() {
        let m = model(2, vec![1.0, -2.0].into(), 0.0.into());
        assert_eq!(m.required_derivatives().names(), &["x0", "x1"]);

        let still = model(2, 0.0.into(), 0.0.into());
        assert!(still.required_derivatives().is_empty());
    }

    #[test]
    fn requirements_follow_nonzero_axes() {
        let m = model(3, vec![0.0, 1.0, 0.0].into(), vec![2.0, 0.0, 0.0].into());
        assert_eq!(m.required_derivatives().names(), &["x1", "x0x0"]);
    }

    #[test]
    fn rejects_bad_coefficients() {
        let desc = |velocity: Coefficient, diffusivity: Coefficient| AdvectionDiffusionDescriptor {
            dimensions: 2,
            velocity,
            diffusivity,
        };
        assert!(matches!(
            AdvectionDiffusionModel::new(desc(vec![1.0].into(), 0.0.into())),
            Err(Error::BadCoefficient { .. })
        ));
        assert!(matches!(
            AdvectionDiffusionModel::new(desc(0.0.into(), (-1.0).into())),
            Err(Error::BadCoefficient { .. })
        ));
        assert!(matches!(
            AdvectionDiffusionModel::new(desc(f64::INFINITY.into(), 0.0.into())),
            Err(Error::BadCoefficient { .. })
        ));
        assert!(matches!(
            AdvectionDiffusionModel::new(AdvectionDiffusionDescriptor::default()),
            Err(Error::NoDimensions)
        ));
    }

    #[test]
    fn rhs_combines_supplied_derivatives() {
        let m = model(1, 2.0.into(), 0.5.into());
        let state = ArrayD::<f64>::zeros(IxDyn(&[3]));
        let supplied: Derivatives = [
            ("x0", ArrayD::from_elem(IxDyn(&[3]), 1.0)),
            ("x0x0", ArrayD::from_elem(IxDyn(&[3]), 4.0)),
        ]
        .into_iter()
        .collect();

        let rhs = m.rhs(state.view(), &supplied).unwrap();
        assert!(rhs.iter().all(|&r| (r - 0.0).abs() < 1e-15));

        let supplied: Derivatives = [
            ("x0", ArrayD::from_elem(IxDyn(&[3]), 1.0)),
            ("x0x0", ArrayD::from_elem(IxDyn(&[3]), 6.0)),
        ]
        .into_iter()
        .collect();
        let rhs = m.rhs(state.view(), &supplied).unwrap();
        assert!(rhs.iter().all(|&r| (r - 1.0).abs() < 1e-15));
    }

    #[test]
    fn rhs_reports_missing_derivative() {
        let m = model(2, vec![0.0, 1.0].into(), 1.0.into());
        let state = ArrayD::<f64>::zeros(IxDyn(&[2, 2]));
        let supplied: Derivatives = [("x1", ArrayD::zeros(IxDyn(&[2, 2])))].into_iter().collect();
        match m.rhs(state.view(), &supplied) {
            Err(Error::MissingDerivative(name)) => assert_eq!(name, "x0x0"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn analytic_solution_is_optional() {
        let grid = FiniteStateGrid::new(vec![GridDimension::new(-1.0, 1.0, 8).unwrap()]).unwrap();
        let pure_advection = model(1, 1.0.into(), 0.0.into());
        assert!(pure_advection.analytic_solution(grid.domain(), 0.1).is_none());

        let diffusion = model(1, 0.0.into(), 1.0.into());
        assert!(diffusion.analytic_solution(grid.domain(), 0.0).is_none());
        assert_eq!(
            diffusion.analytic_solution(grid.domain(), 0.1).unwrap().shape(),
            grid.shape()
        );
    }

    #[test]
    fn analytic_solution_carries_unit_mass_with_the_flow() {
        let cells = 2000;
        let grid =
            FiniteStateGrid::new(vec![GridDimension::new(-10.0, 10.0, cells).unwrap()]).unwrap();
        let m = model(1, 1.5.into(), 0.2.into());
        let u = m.analytic_solution(grid.domain(), 2.0).unwrap();

        let h = grid.spacing()[0];
        let mass = u.sum() * h;
        assert!((mass - 1.0).abs() < 1e-6, "{mass}");

        let peak = u
            .indexed_iter()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i[0], v) } else { best });
        let x_peak = grid.coordinates(&[peak.0]).unwrap()[0];
        assert!((x_peak - 3.0).abs() <= h);
    }
}
