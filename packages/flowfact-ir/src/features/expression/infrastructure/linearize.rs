//! Linear View of Expressions
//!
//! Flattens an interned expression into `Σ coeff·atom + constant`, where
//! an atom is a leaf the linear theory cannot look into: an entry-time
//! variable, a memory cell, a loop iteration counter, the SP base, or an
//! opaque arithmetic node (cmp, div, mod, products of non-constants).
//! Opaque atoms are keyed by their interned node id, so two occurrences of
//! the same sub-expression share an atom: this is what lets the solver
//! refute e.g. `x%3 = 0 ∧ x%3 = 1` without a non-linear theory.
//!
//! Expressions containing Top have no linear view.

use crate::features::expression::domain::{ArithOp, Expr, ExprId};
use crate::features::expression::infrastructure::dag::Dag;
use std::collections::BTreeMap;

/// Key of one linear atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinAtom {
    /// The entry-time stack pointer (base of every SP-relative constant).
    SpBase,
    /// Any interned leaf or opaque node.
    Node(ExprId),
}

/// A linear combination of atoms with an integer constant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinExpr {
    pub terms: BTreeMap<LinAtom, i64>,
    pub constant: i64,
}

impl LinExpr {
    pub fn constant_of(k: i64) -> Self {
        Self { terms: BTreeMap::new(), constant: k }
    }

    pub fn atom(a: LinAtom) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(a, 1);
        Self { terms, constant: 0 }
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Coefficient of `a` (zero when absent).
    pub fn coeff(&self, a: LinAtom) -> i64 {
        self.terms.get(&a).copied().unwrap_or(0)
    }

    fn add_term(&mut self, a: LinAtom, c: i64) {
        if c == 0 {
            return;
        }
        let entry = self.terms.entry(a).or_insert(0);
        *entry += c;
        if *entry == 0 {
            self.terms.remove(&a);
        }
    }

    pub fn add(&self, other: &LinExpr) -> LinExpr {
        let mut out = self.clone();
        out.constant += other.constant;
        for (&a, &c) in &other.terms {
            out.add_term(a, c);
        }
        out
    }

    pub fn sub(&self, other: &LinExpr) -> LinExpr {
        let mut out = self.clone();
        out.constant -= other.constant;
        for (&a, &c) in &other.terms {
            out.add_term(a, -c);
        }
        out
    }

    pub fn scale(&self, k: i64) -> LinExpr {
        if k == 0 {
            return LinExpr::default();
        }
        LinExpr {
            terms: self.terms.iter().map(|(&a, &c)| (a, c * k)).collect(),
            constant: self.constant * k,
        }
    }

    pub fn negate(&self) -> LinExpr {
        self.scale(-1)
    }
}

/// Linear view of `id`, or `None` when the expression involves Top.
pub fn linearize(dag: &Dag, id: ExprId) -> Option<LinExpr> {
    match dag.get(id) {
        Expr::Const(k) => {
            let mut le = LinExpr::constant_of(k.value as i64);
            if k.sp_rel {
                le.add_term(LinAtom::SpBase, 1);
            }
            Some(le)
        }
        Expr::Var(_) | Expr::Mem { .. } | Expr::Iter(_) => Some(LinExpr::atom(LinAtom::Node(id))),
        Expr::Neg(x) => Some(linearize(dag, x)?.negate()),
        Expr::Arith { op, lhs, rhs } => match op {
            ArithOp::Add => Some(linearize(dag, lhs)?.add(&linearize(dag, rhs)?)),
            ArithOp::Sub => Some(linearize(dag, lhs)?.sub(&linearize(dag, rhs)?)),
            ArithOp::Mul => {
                let l = linearize(dag, lhs)?;
                let r = linearize(dag, rhs)?;
                if l.is_constant() {
                    Some(r.scale(l.constant))
                } else if r.is_constant() {
                    Some(l.scale(r.constant))
                } else {
                    Some(LinExpr::atom(LinAtom::Node(id)))
                }
            }
            // opaque to the linear theory; shared by node identity
            ArithOp::Div | ArithOp::Mod | ArithOp::Cmp => Some(LinExpr::atom(LinAtom::Node(id))),
        },
        Expr::Top => None,
    }
}

/// Whether the expression contains an atom the linear theory treats as
/// opaque (used by the `smt_check_linear` predicate filter).
pub fn has_opaque_atom(dag: &Dag, id: ExprId) -> bool {
    match dag.get(id) {
        Expr::Arith { op, lhs, rhs } => match op {
            ArithOp::Div | ArithOp::Mod | ArithOp::Cmp => true,
            ArithOp::Mul => {
                !(dag.is_const(lhs) || dag.is_const(rhs))
                    || has_opaque_atom(dag, lhs)
                    || has_opaque_atom(dag, rhs)
            }
            _ => has_opaque_atom(dag, lhs) || has_opaque_atom(dag, rhs),
        },
        Expr::Neg(x) => has_opaque_atom(dag, x),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::expression::domain::Constant;

    #[test]
    fn test_linearize_affine() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let three = dag.cst_abs(3);
        let e = dag.mul(x, three);
        let five = dag.cst_abs(5);
        let e = dag.add(e, five);

        let le = linearize(&dag, e).unwrap();
        assert_eq!(le.constant, 5);
        assert_eq!(le.coeff(LinAtom::Node(x)), 3);
    }

    #[test]
    fn test_linearize_sp_relative() {
        let mut dag = Dag::new();
        let sp8 = dag.cst(Constant::rel(8));
        let le = linearize(&dag, sp8).unwrap();
        assert_eq!(le.constant, 8);
        assert_eq!(le.coeff(LinAtom::SpBase), 1);
    }

    #[test]
    fn test_opaque_nodes_share_an_atom() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let three = dag.cst_abs(3);
        let m1 = dag.modulo(x, three);
        let m2 = dag.modulo(x, three);
        assert_eq!(
            linearize(&dag, m1).unwrap().terms,
            linearize(&dag, m2).unwrap().terms
        );
    }

    #[test]
    fn test_top_has_no_linear_view() {
        let mut dag = Dag::new();
        let t = dag.top();
        assert!(linearize(&dag, t).is_none());
    }

    #[test]
    fn test_cancellation() {
        let mut dag = Dag::new();
        let x = dag.var(1);
        let y = dag.var(2);
        let s = dag.add(x, y);
        let d = dag.sub(s, y);
        // the DAG does not cancel y structurally, the linear view does
        let le = linearize(&dag, d).unwrap();
        assert_eq!(le.coeff(LinAtom::Node(y)), 0);
        assert_eq!(le.coeff(LinAtom::Node(x)), 1);
    }
}
