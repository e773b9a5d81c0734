//! SMT Feature
//!
//! The infeasibility oracle: converts a state's labelled predicates into
//! solver constraints, detects unsatisfiable conjunctions and minimizes
//! the offending edge set. The built-in linear backend needs no system
//! dependency; Z3 is available behind `--features z3`.

pub mod domain;
pub mod infrastructure;

pub use domain::IpStats;
pub use infrastructure::{ipcheck, ConstraintSolver, LinearBackend, SolverResult};
