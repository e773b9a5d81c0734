//! SMT infrastructure: the infeasibility oracle and its solver backends.

pub mod oracle;
pub mod solvers;

pub use oracle::ipcheck;
pub use solvers::{ConstraintSolver, LinearBackend, SolverResult};
#[cfg(feature = "z3")]
pub use solvers::Z3Backend;
