//! Post-processing infrastructure.

pub mod simplifier;

pub use simplifier::{simplify_path, simplify_paths};
