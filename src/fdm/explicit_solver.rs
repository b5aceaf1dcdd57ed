use ndarray::{ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};

use crate::fdm::stencil;
use crate::grid::{BoundaryPolicy, FiniteStateGrid};
use crate::models::PdeModel;
use crate::{ComputeDescriptor, Error, Solver};

/// Relative slack on stability limits, so a step computed as exactly the limit passes.
const LIMIT_TOLERANCE: f64 = 1e-12;

/// Explicit time integration schemes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeScheme {
    /// `u' = u + Δt f(u)`
    #[default]
    ForwardEuler,
    /// Two stage, second order Runge-Kutta (explicit trapezoidal rule).
    Heun,
    /// Classic four stage, fourth order Runge-Kutta.
    RungeKutta4,
}

impl TimeScheme {
    /// Length of the stability region along the negative real axis, in units of `Δt λ`.
    pub fn real_stability_interval(&self) -> f64 {
        match self {
            TimeScheme::ForwardEuler | TimeScheme::Heun => 2.0,
            TimeScheme::RungeKutta4 => 2.785,
        }
    }

    /// Half length of the stability region along the imaginary axis. Zero when the scheme
    /// amplifies every purely oscillating mode.
    pub fn imaginary_stability_interval(&self) -> f64 {
        match self {
            TimeScheme::ForwardEuler | TimeScheme::Heun => 0.0,
            TimeScheme::RungeKutta4 => 2.0 * std::f64::consts::SQRT_2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeScheme::ForwardEuler => "Forward Euler",
            TimeScheme::Heun => "Heun",
            TimeScheme::RungeKutta4 => "Runge-Kutta 4",
        }
    }
}

/// Describes the composition of an `ExplicitSolver`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplicitSolverDescriptor {
    pub scheme: TimeScheme,
    /// Applied uniformly at every edge of the grid.
    pub boundary: BoundaryPolicy,
    /// Overrides `c` in the diffusive limit `Δt ≤ c min(h)² / max(D)`. Must be finite and
    /// positive.
    pub stability_constant: Option<f64>,
    /// Evaluate stencils on the rayon thread pool.
    pub parallel: bool,
}

/// Method-of-lines time stepping with central finite differences.
///
/// Every stage reads the committed state and writes into fresh buffers; the grid only sees the
/// final result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "ExplicitSolverDescriptor",
    into = "ExplicitSolverDescriptor"
)]
pub struct ExplicitSolver {
    scheme: TimeScheme,
    boundary: BoundaryPolicy,
    stability_constant: Option<f64>,
    parallel: bool,
}

impl ExplicitSolver {
    pub fn new(desc: ExplicitSolverDescriptor) -> Result<Self, Error> {
        if let Some(c) = desc.stability_constant {
            if !c.is_finite() || c <= 0.0 {
                return Err(Error::BadCoefficient {
                    name: "stability_constant".to_string(),
                    reason: "must be finite and positive".to_string(),
                });
            }
        }

        Ok(Self {
            scheme: desc.scheme,
            boundary: desc.boundary,
            stability_constant: desc.stability_constant,
            parallel: desc.parallel,
        })
    }

    pub fn scheme(&self) -> TimeScheme {
        self.scheme
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    /// `c` of the diffusive limit on a grid of `dimensions` axes.
    pub fn stability_constant(&self, dimensions: usize) -> f64 {
        self.stability_constant.unwrap_or_else(|| {
            self.scheme.real_stability_interval() / (4.0 * dimensions.max(1) as f64)
        })
    }

    /// Supplies the model's derivatives for `state` and evaluates its right-hand side.
    fn evaluate(
        &self,
        model: &dyn PdeModel,
        state: ArrayViewD<f64>,
        deltas: &[f64],
    ) -> Result<ArrayD<f64>, Error> {
        let derivatives = stencil::supply(
            model.required_derivatives(),
            state.view(),
            deltas,
            self.boundary,
            self.parallel,
        )?;
        model.rhs(state, &derivatives)
    }
}

impl TryFrom<ExplicitSolverDescriptor> for ExplicitSolver {
    type Error = Error;

    fn try_from(desc: ExplicitSolverDescriptor) -> Result<Self, Error> {
        Self::new(desc)
    }
}

impl From<ExplicitSolver> for ExplicitSolverDescriptor {
    fn from(solver: ExplicitSolver) -> Self {
        Self {
            scheme: solver.scheme,
            boundary: solver.boundary,
            stability_constant: solver.stability_constant,
            parallel: solver.parallel,
        }
    }
}

/// `u + Σ w_i k_i`
fn combine(u: ArrayViewD<f64>, terms: &[(f64, &ArrayD<f64>)]) -> ArrayD<f64> {
    let mut out = u.to_owned();
    for &(weight, k) in terms {
        out.scaled_add(weight, k);
    }
    out
}

impl Solver for ExplicitSolver {
    fn step(&self, grid: &mut FiniteStateGrid, desc: ComputeDescriptor) -> Result<(), Error> {
        let model = desc.model;
        if model.dimensions() != grid.ndim() {
            return Err(Error::DimensionMismatch {
                model: model.dimensions(),
                grid: grid.ndim(),
            });
        }

        let dt = desc.delta_t;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::InvalidTimeStep(dt));
        }
        if let Some(limit) = self.stability_limit(grid, model) {
            if dt > limit * (1.0 + LIMIT_TOLERANCE) {
                tracing::debug!(
                    "rejecting {} step of Δt={:e} for `{}` model (limit {:e})",
                    self.scheme.name(),
                    dt,
                    model.name(),
                    limit,
                );
                return Err(Error::UnstableStep { delta_t: dt, limit });
            }
        }

        let u = grid.states();
        let deltas = grid.spacing();
        let next = match self.scheme {
            TimeScheme::ForwardEuler => {
                let k1 = self.evaluate(model, u.view(), deltas)?;
                combine(u.view(), &[(dt, &k1)])
            }
            TimeScheme::Heun => {
                let k1 = self.evaluate(model, u.view(), deltas)?;
                let predictor = combine(u.view(), &[(dt, &k1)]);
                let k2 = self.evaluate(model, predictor.view(), deltas)?;
                combine(u.view(), &[(0.5 * dt, &k1), (0.5 * dt, &k2)])
            }
            TimeScheme::RungeKutta4 => {
                let k1 = self.evaluate(model, u.view(), deltas)?;
                let k2 = self.evaluate(model, combine(u.view(), &[(0.5 * dt, &k1)]).view(), deltas)?;
                let k3 = self.evaluate(model, combine(u.view(), &[(0.5 * dt, &k2)]).view(), deltas)?;
                let k4 = self.evaluate(model, combine(u.view(), &[(dt, &k3)]).view(), deltas)?;
                combine(
                    u.view(),
                    &[
                        (dt / 6.0, &k1),
                        (dt / 3.0, &k2),
                        (dt / 3.0, &k3),
                        (dt / 6.0, &k4),
                    ],
                )
            }
        };

        if next.iter().any(|v| !v.is_finite()) {
            return Err(Error::Diverged { time: desc.time });
        }

        grid.commit(next);
        Ok(())
    }

    /// The smallest of the diffusive, advective and reactive limits that apply to `model`.
    ///
    /// `Some(0.0)` means no step is stable: Forward Euler and Heun amplify central advection
    /// along any axis that lacks diffusion.
    fn stability_limit(&self, grid: &FiniteStateGrid, model: &dyn PdeModel) -> Option<f64> {
        let hints = model.stability_hints();
        let deltas = grid.spacing();
        let mut limit = f64::INFINITY;

        let diffusivity = hints.diffusivity.iter().cloned().fold(0.0, f64::max);
        if diffusivity > 0.0 {
            let h = deltas.iter().cloned().fold(f64::INFINITY, f64::min);
            limit = limit.min(self.stability_constant(grid.ndim()) * h * h / diffusivity);
        }

        let courant_rate: f64 = hints.speeds.iter().zip(deltas).map(|(v, h)| v.abs() / h).sum();
        if courant_rate > 0.0 {
            let reach = self.scheme.imaginary_stability_interval();
            if reach > 0.0 {
                limit = limit.min(reach / courant_rate);
            } else {
                // cell Péclet bound, Δt ≤ 2 D_i / v_i²
                for (axis, &v) in hints.speeds.iter().enumerate() {
                    if v != 0.0 {
                        let d = hints.diffusivity.get(axis).copied().unwrap_or(0.0);
                        limit = limit.min(2.0 * d / (v * v));
                    }
                }
            }
        }

        if hints.reaction_rate > 0.0 {
            limit = limit.min(self.scheme.real_stability_interval() / hints.reaction_rate);
        }

        limit.is_finite().then_some(limit)
    }

    fn name(&self) -> &'static str {
        self.scheme.name()
    }
}
