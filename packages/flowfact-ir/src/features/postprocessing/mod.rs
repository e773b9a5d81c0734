//! Post-Processing Feature
//!
//! Dominance-based shortening of the collected infeasible paths before
//! they reach the downstream emitters.

pub mod infrastructure;

pub use infrastructure::{simplify_path, simplify_paths};
