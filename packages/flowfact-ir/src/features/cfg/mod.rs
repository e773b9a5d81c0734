//! CFG Feature
//!
//! Input contract of the analysis: programs, per-function CFGs with
//! semantic-instruction streams, loop/call annotations, the platform
//! descriptor, the read-only initial memory image, and the dominance
//! query service consumed by the post-processor.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    Block, BlockKind, Cfg, Edge, InitialData, Platform, Program, SemInst,
};
pub use infrastructure::{EdgeDominance, GlobalDominance, ProgramBuilder};
