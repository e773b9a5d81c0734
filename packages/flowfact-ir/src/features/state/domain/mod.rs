//! State domain models: predicates, detailed paths, local variables and
//! the memory store.

pub mod detailed_path;
pub mod local_vars;
pub mod memory;
pub mod predicate;

pub use detailed_path::{DetailedPath, FlowInfo};
pub use local_vars::LocalVariables;
pub use memory::{MemCell, MemId, MemoryMap};
pub use predicate::{LabelledPredicate, Predicate};
