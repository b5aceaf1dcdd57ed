//! A framework for simulating linear partial differential equations on finite-difference grids.
//!
//! A simulation is composed bottom-up: [`GridDimension`]s describe the axes of a
//! [`FiniteStateGrid`], a [`models::PdeModel`] computes the time derivative of the grid state,
//! a [`Solver`] advances the state by one time step and a [`Simulation`] drives the solver over
//! a time interval, yielding snapshots of the state.
//!
//! To get started, refer to the `demos` directory in the main repository.

mod simulation;

pub mod fdm;
pub mod grid;
pub mod models;
pub mod prelude;
pub mod registry;

pub use grid::{BoundaryPolicy, FiniteStateGrid, GridDimension};
pub use simulation::{
    CancelToken, Resolution, Run, RunDescriptor, Simulation, SimulationDescriptor, Snapshot,
};
#[cfg(feature = "hdf5")]
pub use simulation::SaveSettings;

/// Represents an error in the simulation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid grid dimension \
        ( lower bound: {lower}, upper bound: {upper}, cells: {cells} )")]
    InvalidDimension {
        lower: f64,
        upper: f64,
        cells: usize,
    },
    #[error("A grid or model needs at least one dimension")]
    NoDimensions,
    #[error("Index {indices:?} is out of bounds for grid of shape {shape:?}")]
    OutOfBounds {
        indices: Vec<isize>,
        shape: Vec<usize>,
    },
    #[error("Init {array_name} array does not have expected shape \
        ( {array_name} array shape: {input_shape:?}, \
        expected shape: {expected_shape:?} )")]
    BadInit {
        array_name: String,
        input_shape: Vec<usize>,
        expected_shape: Vec<usize>,
    },
    #[error("Required derivative named {0} was not passed in")]
    MissingDerivative(String),
    #[error("`{0}` is not a valid derivative name")]
    InvalidDerivativeName(String),
    #[error("Derivative {name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        found: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("Model has {model} dimensions but the grid has {grid}")]
    DimensionMismatch { model: usize, grid: usize },
    #[error("Coefficient `{name}` is invalid: {reason}")]
    BadCoefficient { name: String, reason: String },
    #[error("Time step {delta_t:e} exceeds the stability limit {limit:e}")]
    UnstableStep { delta_t: f64, limit: f64 },
    #[error("Time step {0} is not a positive finite number")]
    InvalidTimeStep(f64),
    #[error("Invalid time range [{start}, {end}]")]
    InvalidTimeRange { start: f64, end: f64 },
    #[error("State became non-finite while stepping from t = {time}")]
    Diverged { time: f64 },
    #[error("Snapshot of step {step} does not belong to a simulation of {steps} steps")]
    SnapshotOutOfRange { step: usize, steps: usize },
    #[error("Simulation was cancelled at t = {time}")]
    Cancelled { time: f64 },
    #[error("Simulation timed out at t = {time} after {steps} steps")]
    Timeout { time: f64, steps: usize },
    #[error("No entry named `{name}` in {collection}")]
    NotFound { collection: String, name: String },
    #[error("An entry named `{name}` already exists in {collection}")]
    AlreadyExists { collection: String, name: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    H5Error(#[from] hdf5::Error),
}

/// Advances the state of a grid through time.
pub trait Solver {
    /// Advances the grid state by one time step.
    ///
    /// The new state is only committed to `grid` when the whole step succeeds; on error the
    /// grid is left exactly as it was.
    fn step(&self, grid: &mut FiniteStateGrid, desc: ComputeDescriptor) -> Result<(), Error>;

    /// The largest stable time step for `model` on `grid`, or `None` if any step is stable.
    fn stability_limit(&self, grid: &FiniteStateGrid, model: &dyn models::PdeModel)
        -> Option<f64>;

    fn name(&self) -> &'static str;
}

/// Describes how a `Solver` should take a step.
pub struct ComputeDescriptor<'a> {
    pub model: &'a dyn models::PdeModel,
    /// Time of the state currently held by the grid.
    pub time: f64,
    pub delta_t: f64,
}
