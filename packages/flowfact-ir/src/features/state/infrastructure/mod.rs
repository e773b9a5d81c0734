//! State infrastructure: the abstract state machinery.

pub mod compositor;
pub mod context;
pub mod state;
pub mod transfer;

pub use compositor::Compositor;
pub use context::AnalysisContext;
pub use state::{ApplyMode, State, States};
pub use transfer::execute_block;
