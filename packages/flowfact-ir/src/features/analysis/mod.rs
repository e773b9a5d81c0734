//! Analysis Feature
//!
//! The worklist driver tying everything together: loop-aware fixpoint
//! traversal, call composition, oracle invocations, and the final
//! post-processing of collected paths.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::InfeasiblePathUseCase;
pub use domain::{AnalysisReport, LoopStatus};
pub use infrastructure::{analyze, analyze_with_dominance};
