//! Abstract State Feature
//!
//! Everything an abstract path state carries (labelled predicates, the
//! detailed path, local-variable and memory stores) plus the operations
//! the driver applies to it: block transfer, edge append, merge, widening
//! and function composition.

pub mod domain;
pub mod infrastructure;

pub use domain::{DetailedPath, FlowInfo, LabelledPredicate, LocalVariables, MemId, MemoryMap, Predicate};
pub use infrastructure::{execute_block, AnalysisContext, State, States};
