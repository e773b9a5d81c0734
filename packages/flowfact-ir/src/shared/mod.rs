//! Shared identifiers and small common models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic-block identifier, unique across the whole [`Program`](crate::features::cfg::Program)
/// (not per-CFG), so label sets and dominance queries need no extra scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// CFG edge identifier, unique across the whole program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Identifier of one CFG (function) inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CfgId(pub u32);

/// Register or temporary index. Temporaries are negative, registers are
/// non-negative (the lifter's convention).
pub type VarId = i32;

/// Whether a variable id denotes a block-local temporary.
#[inline]
pub fn is_tempvar(v: VarId) -> bool {
    v < 0
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for CfgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}
