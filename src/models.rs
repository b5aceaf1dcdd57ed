//! PDE models.

mod advection_diffusion;
pub mod derivatives;
mod linear_decay;

pub use advection_diffusion::{AdvectionDiffusionDescriptor, AdvectionDiffusionModel, Coefficient};
pub use derivatives::{DerivativeRequirement, Derivatives};
pub use linear_decay::LinearDecayModel;

use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Describes the time derivative of a state field.
pub trait PdeModel {
    fn dimensions(&self) -> usize;

    /// The derivatives that must be supplied to `rhs`.
    fn required_derivatives(&self) -> &DerivativeRequirement;

    /// Computes the right-hand side `∂u/∂t` for `state`, which it has the shape of.
    fn rhs(&self, state: ArrayViewD<f64>, derivatives: &Derivatives) -> Result<ArrayD<f64>, Error>;

    /// Evaluates the exact solution at `coordinates`, laid out like `FiniteStateGrid::domain`,
    /// if the model has one.
    fn analytic_solution(&self, _coordinates: ArrayViewD<f64>, _time: f64) -> Option<ArrayD<f64>> {
        None
    }

    /// Coefficient magnitudes the solver bounds its time step with.
    fn stability_hints(&self) -> StabilityHints;

    fn name(&self) -> &'static str;
}

/// Coefficient magnitudes that limit explicit time steps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StabilityHints {
    /// Diffusivity along each axis.
    pub diffusivity: Vec<f64>,
    /// Absolute advection speed along each axis.
    pub speeds: Vec<f64>,
    /// Largest linear reaction rate.
    pub reaction_rate: f64,
}

/// Every model the crate provides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Model {
    AdvectionDiffusion(AdvectionDiffusionModel),
    LinearDecay(LinearDecayModel),
}

impl Model {
    fn inner(&self) -> &dyn PdeModel {
        match self {
            Model::AdvectionDiffusion(model) => model,
            Model::LinearDecay(model) => model,
        }
    }
}

impl PdeModel for Model {
    fn dimensions(&self) -> usize {
        self.inner().dimensions()
    }

    fn required_derivatives(&self) -> &DerivativeRequirement {
        self.inner().required_derivatives()
    }

    fn rhs(&self, state: ArrayViewD<f64>, derivatives: &Derivatives) -> Result<ArrayD<f64>, Error> {
        self.inner().rhs(state, derivatives)
    }

    fn analytic_solution(&self, coordinates: ArrayViewD<f64>, time: f64) -> Option<ArrayD<f64>> {
        self.inner().analytic_solution(coordinates, time)
    }

    fn stability_hints(&self) -> StabilityHints {
        self.inner().stability_hints()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

impl From<AdvectionDiffusionModel> for Model {
    fn from(model: AdvectionDiffusionModel) -> Self {
        Model::AdvectionDiffusion(model)
    }
}

impl From<LinearDecayModel> for Model {
    fn from(model: LinearDecayModel) -> Self {
        Model::LinearDecay(model)
    }
}
