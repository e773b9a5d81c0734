//! Analysis infrastructure: the worklist driver.

pub mod driver;

pub use driver::{analyze, analyze_with_dominance};
