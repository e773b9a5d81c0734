//! Error types for flowfact-ir
//!
//! Unified error handling across the crate. Per-state problems degrade
//! the affected state (Top slots, bottom flag) and are logged; only
//! CFG-level contract violations surface here.

use thiserror::Error;

/// Main error type for analysis operations.
#[derive(Debug, Error)]
pub enum FlowfactError {
    /// Malformed input CFG (missing entry, dangling callee, cross-CFG edge).
    #[error("CFG error: {0}")]
    Cfg(String),

    /// The lifter lost track of the stack pointer and `sp_critical` is set.
    #[error("stack pointer not tracked: {0}")]
    SpNotTracked(String),

    /// A detailed path lost its bracket structure.
    #[error("malformed flow-event bracketing: {0}")]
    BracketMismatch(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, FlowfactError>;
