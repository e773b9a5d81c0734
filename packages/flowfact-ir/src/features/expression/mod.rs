//! Symbolic Expression Feature
//!
//! Hash-consed expression DAG over machine registers, temporaries, memory
//! cells and loop iteration counters. Pure, shareable, immutable once
//! interned; handle equality is the public equality.

pub mod domain;
pub mod infrastructure;

pub use domain::{ArithOp, CmpOp, Constant, Expr, ExprId};
pub use infrastructure::{Dag, LinAtom, LinExpr};
