//! Expression Domain Models
//!
//! Value objects for the symbolic expression DAG: machine constants with
//! stack-pointer relativity, arithmetic operator tags, comparison
//! operators, and the closed expression sum itself.

use crate::shared::{BlockId, VarId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed 32-bit machine constant, optionally relative to the value of the
/// stack pointer at function entry.
///
/// `sp_rel` anchors stack addressing: `Constant::sp()` is the entry-time
/// stack pointer itself, `SP+k` is `Constant::rel(k)`. Arithmetic follows
/// the relativity algebra: rel ± abs stays rel, rel − rel is abs, and any
/// product/quotient involving a relative operand has no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Constant {
    pub value: i32,
    pub sp_rel: bool,
}

impl Constant {
    /// Absolute constant.
    pub fn abs(value: i32) -> Self {
        Self { value, sp_rel: false }
    }

    /// Stack-pointer-relative constant (`SP + value`).
    pub fn rel(value: i32) -> Self {
        Self { value, sp_rel: true }
    }

    /// The entry-time stack pointer (`SP + 0`).
    pub fn sp() -> Self {
        Self::rel(0)
    }

    pub fn is_absolute(&self) -> bool {
        !self.sp_rel
    }

    /// `self + other`, if the relativity algebra allows it.
    pub fn checked_add(&self, other: &Constant) -> Option<Constant> {
        match (self.sp_rel, other.sp_rel) {
            (true, true) => None, // SP + SP has no meaning
            (rel, other_rel) => Some(Constant {
                value: self.value.wrapping_add(other.value),
                sp_rel: rel || other_rel,
            }),
        }
    }

    /// `self - other`, if the relativity algebra allows it.
    pub fn checked_sub(&self, other: &Constant) -> Option<Constant> {
        match (self.sp_rel, other.sp_rel) {
            (false, true) => None, // abs - SP has no meaning
            (rel, other_rel) => Some(Constant {
                value: self.value.wrapping_sub(other.value),
                sp_rel: rel && !other_rel,
            }),
        }
    }

    /// `self * other`; relative operands do not multiply.
    pub fn checked_mul(&self, other: &Constant) -> Option<Constant> {
        if self.sp_rel || other.sp_rel {
            return None;
        }
        Some(Constant::abs(self.value.wrapping_mul(other.value)))
    }

    /// Truncated division; undefined on zero and on relative operands.
    pub fn checked_div(&self, other: &Constant) -> Option<Constant> {
        if self.sp_rel || other.sp_rel || other.value == 0 {
            return None;
        }
        Some(Constant::abs(self.value.wrapping_div(other.value)))
    }

    /// Remainder; undefined on zero and on relative operands.
    pub fn checked_rem(&self, other: &Constant) -> Option<Constant> {
        if self.sp_rel || other.sp_rel || other.value == 0 {
            return None;
        }
        Some(Constant::abs(self.value.wrapping_rem(other.value)))
    }

    pub fn checked_neg(&self) -> Option<Constant> {
        if self.sp_rel {
            return None;
        }
        Some(Constant::abs(self.value.wrapping_neg()))
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sp_rel {
            if self.value == 0 {
                write!(f, "SP")
            } else if self.value < 0 {
                write!(f, "SP-{}", -(self.value as i64))
            } else {
                write!(f, "SP+{}", self.value)
            }
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// Binary arithmetic operator tags of the expression DAG.
///
/// `Cmp` is the opaque comparison value a `cmp` semantic instruction
/// produces; the relation tested on it lives on the branch, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Cmp,
}

impl ArithOp {
    pub fn is_commutative(&self) -> bool {
        matches!(self, ArithOp::Add | ArithOp::Mul)
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::Cmp => "~",
        };
        write!(f, "{}", s)
    }
}

/// Comparison operators of predicates and branch conditions.
///
/// Predicate construction normalizes `Gt`/`Ge` away by swapping operands,
/// so stored predicates only ever use `Eq`, `Ne`, `Lt`, `Le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// The relation with operands swapped (`a op b` ⇔ `b op.swapped() a`).
    pub fn swapped(&self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    /// The complement relation (`!(a op b)` ⇔ `a op.negated() b`).
    pub fn negated(&self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    /// Evaluate the relation on two known integers.
    pub fn eval(&self, a: i32, b: i32) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Handle to an interned expression node.
///
/// Equality of handles is the public equality of expressions: the DAG
/// factory guarantees structurally equal (modulo normalization) trees
/// intern to the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Interned expression node. Closed sum; dispatch is by matching, never by
/// trait objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Machine constant (absolute or SP-relative).
    Const(Constant),

    /// Register or temporary value at function entry.
    Var(VarId),

    /// Content of the memory cell at a constant address. `generation` is
    /// the wipe generation of the owning state when the cell was first
    /// read, so reads across a memory wipe intern to distinct nodes.
    Mem { addr: Constant, generation: u32 },

    /// Symbolic iteration count of a loop header.
    Iter(BlockId),

    /// Binary arithmetic.
    Arith { op: ArithOp, lhs: ExprId, rhs: ExprId },

    /// Arithmetic negation.
    Neg(ExprId),

    /// The unknown value.
    Top,
}

impl Expr {
    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }

    pub fn as_const(&self) -> Option<Constant> {
        match self {
            Expr::Const(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Expr::Top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_relativity_algebra() {
        let sp4 = Constant::rel(4);
        let two = Constant::abs(2);

        assert_eq!(sp4.checked_add(&two), Some(Constant::rel(6)));
        assert_eq!(sp4.checked_sub(&Constant::rel(4)), Some(Constant::abs(0)));
        assert_eq!(sp4.checked_add(&Constant::sp()), None);
        assert_eq!(sp4.checked_mul(&two), None);
        assert_eq!(two.checked_div(&Constant::abs(0)), None);
    }

    #[test]
    fn test_cmp_op_swap_and_negate() {
        assert_eq!(CmpOp::Gt.swapped(), CmpOp::Lt);
        assert_eq!(CmpOp::Le.negated(), CmpOp::Gt);
        assert_eq!(CmpOp::Eq.negated(), CmpOp::Ne);
        assert!(CmpOp::Lt.eval(1, 2));
        assert!(!CmpOp::Ge.eval(1, 2));
    }
}
