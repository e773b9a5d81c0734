//! Predicates and Labelled Predicates
//!
//! A predicate is a comparison of two interned expressions; a labelled
//! predicate additionally carries the set of edges along which it was
//! generated; the predicate is known to hold on any concrete execution
//! traversing *all* of those edges.

use crate::features::expression::domain::{CmpOp, Expr, ExprId};
use crate::features::expression::infrastructure::Dag;
use crate::shared::EdgeId;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison of two expressions. Construction normalizes `Gt`/`Ge` by
/// swapping operands, so `op` is always one of `Eq`, `Ne`, `Lt`, `Le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub op: CmpOp,
    pub lhs: ExprId,
    pub rhs: ExprId,
}

impl Predicate {
    pub fn new(op: CmpOp, lhs: ExprId, rhs: ExprId) -> Self {
        match op {
            CmpOp::Gt | CmpOp::Ge => Self { op: op.swapped(), lhs: rhs, rhs: lhs },
            _ => Self { op, lhs, rhs },
        }
    }

    /// The complement predicate (`!(a op b)`).
    pub fn negated(&self) -> Predicate {
        Predicate::new(self.op.negated(), self.lhs, self.rhs)
    }

    /// Truth value when it is decidable without a solver: both operands
    /// constant, or operands sharing one node.
    pub fn truth(&self, dag: &Dag) -> Option<bool> {
        if let (Some(a), Some(b)) = (dag.as_const(self.lhs), dag.as_const(self.rhs)) {
            if a.sp_rel == b.sp_rel {
                return Some(self.op.eval(a.value, b.value));
            }
            // SP+k against an absolute constant is undecidable here
            return None;
        }
        if self.lhs == self.rhs && !dag.is_top(self.lhs) {
            return Some(matches!(self.op, CmpOp::Eq | CmpOp::Le));
        }
        None
    }

    pub fn is_tautology(&self, dag: &Dag) -> bool {
        self.truth(dag) == Some(true)
    }

    pub fn is_contradiction(&self, dag: &Dag) -> bool {
        self.truth(dag) == Some(false)
    }

    /// Both operands constant (such predicates are tautologies of any
    /// satisfiable state and are stripped after a SAT verdict).
    pub fn is_constant(&self, dag: &Dag) -> bool {
        dag.is_const(self.lhs) && dag.is_const(self.rhs)
    }

    pub fn mentions_top(&self, dag: &Dag) -> bool {
        dag.contains_top(self.lhs) || dag.contains_top(self.rhs)
    }

    /// An operand substitution can collapse a predicate onto itself
    /// (`x = f(x)`): one side is a plain variable that also occurs inside
    /// the other. Generation drops such predicates unless they are
    /// decidable tautologies. The `x op x` case is excluded here; it is
    /// decided by [`Predicate::truth`].
    pub fn is_self_referential(&self, dag: &Dag) -> bool {
        let refers = |side: ExprId, other: ExprId| match dag.get(side) {
            Expr::Var(v) => side != other && dag.mentions_var(other, v),
            _ => false,
        };
        refers(self.lhs, self.rhs) || refers(self.rhs, self.lhs)
    }

    /// Tree size of both operands (predicate clamping).
    pub fn size(&self, dag: &Dag) -> usize {
        dag.size(self.lhs) + dag.size(self.rhs)
    }

    pub fn display<'a>(&self, dag: &'a Dag) -> PredicateDisplay<'a> {
        PredicateDisplay { dag, pred: *self }
    }
}

/// Borrowing display wrapper.
pub struct PredicateDisplay<'a> {
    dag: &'a Dag,
    pred: Predicate,
}

impl fmt::Display for PredicateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.dag.display(self.pred.lhs),
            self.pred.op,
            self.dag.display(self.pred.rhs)
        )
    }
}

/// Predicate plus the edges it was generated along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledPredicate {
    pub pred: Predicate,
    pub labels: BTreeSet<EdgeId>,
}

impl LabelledPredicate {
    pub fn new(pred: Predicate, labels: BTreeSet<EdgeId>) -> Self {
        Self { pred, labels }
    }

    pub fn unlabelled(pred: Predicate) -> Self {
        Self { pred, labels: BTreeSet::new() }
    }

    pub fn add_label(&mut self, e: EdgeId) {
        self.labels.insert(e);
    }
}
