//! Finite-difference methods.

mod explicit_solver;
pub mod stencil;

pub use explicit_solver::{ExplicitSolver, ExplicitSolverDescriptor, TimeScheme};
