//! Expression infrastructure: the interning DAG and its linear view.

pub mod dag;
pub mod linearize;

pub use dag::{Dag, ExprDisplay};
pub use linearize::{has_opaque_atom, linearize, LinAtom, LinExpr};
