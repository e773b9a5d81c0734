//! Constraint Solvers
//!
//! Backends deciding satisfiability of a predicate conjunction. The
//! built-in [`LinearBackend`] covers integer linear arithmetic with no
//! system dependency; the Z3 backend (behind `--features z3`) adds full
//! theory support.

use crate::features::expression::infrastructure::Dag;
use crate::features::state::domain::Predicate;

pub mod linear;
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use linear::LinearBackend;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Backend;

/// Solver verdict on one conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResult {
    /// A model exists (or the backend cannot refute one).
    Sat,
    /// The conjunction is contradictory.
    Unsat,
    /// Timeout or unsupported fragment; treated as Sat by callers.
    Unknown,
}

/// A satisfiability backend. Implementations own their internal solver
/// state; one instance serves one worker thread.
pub trait ConstraintSolver {
    fn name(&self) -> &'static str;

    /// Decide the conjunction of `preds` over the expressions of `dag`.
    fn solve_conjunction(&mut self, dag: &Dag, preds: &[Predicate]) -> SolverResult;
}
