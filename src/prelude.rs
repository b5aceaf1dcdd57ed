//! Includes commonly used library components.

pub use crate::fdm::{ExplicitSolver, ExplicitSolverDescriptor, TimeScheme};
pub use crate::models::{
    AdvectionDiffusionDescriptor, AdvectionDiffusionModel, DerivativeRequirement, Derivatives,
    LinearDecayModel, Model, PdeModel,
};
pub use crate::registry::{Registry, SimulationRecord};
#[cfg(feature = "hdf5")]
pub use crate::SaveSettings;
pub use crate::{
    BoundaryPolicy,
    CancelToken,
    ComputeDescriptor,
    Error,
    FiniteStateGrid,
    GridDimension,
    Resolution,
    RunDescriptor,
    Simulation,
    SimulationDescriptor,
    Snapshot,
    Solver,
};
