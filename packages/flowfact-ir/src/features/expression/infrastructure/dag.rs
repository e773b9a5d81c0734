//! Hash-Consed Expression DAG
//!
//! Interning factory for symbolic expressions. Calling a constructor twice
//! with equal arguments returns the same [`ExprId`], so handle equality is
//! semantic equality modulo the normalization performed at construction:
//!
//! - constant folding (`cst ⊕ cst`, SP-relativity algebra)
//! - identity and absorbing laws (`x+0`, `x*0`, `x*1`, `x-0`, `x-x`)
//! - commutative normalization (smaller node id on the left)
//! - re-association of constant tails (`(x+c1)+c2 = x+(c1+c2)`)
//! - double-negation cancellation
//! - Top absorbs every arithmetic operator
//!
//! The DAG owns all nodes and outlives every state referencing them; its
//! lifetime is the owning analysis worker's.

use crate::features::expression::domain::{ArithOp, Constant, Expr, ExprId};
use crate::shared::{BlockId, VarId};
use rustc_hash::FxHashMap;
use std::fmt;

/// Expression interning table.
#[derive(Debug, Default)]
pub struct Dag {
    nodes: Vec<Expr>,
    interned: FxHashMap<Expr, ExprId>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct interned nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node behind a handle. Handles are never invalidated.
    pub fn get(&self, id: ExprId) -> Expr {
        self.nodes[id.index()]
    }

    fn intern(&mut self, node: Expr) -> ExprId {
        if let Some(&id) = self.interned.get(&node) {
            return id;
        }
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.interned.insert(node, id);
        id
    }

    // ── Leaf constructors ──────────────────────────────────────────────

    pub fn cst(&mut self, k: Constant) -> ExprId {
        self.intern(Expr::Const(k))
    }

    pub fn cst_abs(&mut self, value: i32) -> ExprId {
        self.cst(Constant::abs(value))
    }

    pub fn var(&mut self, v: VarId) -> ExprId {
        self.intern(Expr::Var(v))
    }

    pub fn mem(&mut self, addr: Constant, generation: u32) -> ExprId {
        self.intern(Expr::Mem { addr, generation })
    }

    pub fn iter(&mut self, header: BlockId) -> ExprId {
        self.intern(Expr::Iter(header))
    }

    pub fn top(&mut self) -> ExprId {
        self.intern(Expr::Top)
    }

    // ── Arithmetic constructors ────────────────────────────────────────

    pub fn add(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if self.is_top(a) || self.is_top(b) {
            return self.top();
        }
        match (self.as_const(a), self.as_const(b)) {
            (Some(ka), Some(kb)) => {
                return match ka.checked_add(&kb) {
                    Some(k) => self.cst(k),
                    None => self.top(),
                };
            }
            (Some(ka), None) if ka == Constant::abs(0) => return b,
            (None, Some(kb)) if kb == Constant::abs(0) => return a,
            _ => {}
        }
        // fold a constant tail into an adjacent constant: (x+c1)+c2 = x+(c1+c2)
        if let Some(kb) = self.as_const(b) {
            if let Some((x, k)) = self.split_const_add(a) {
                if let Some(sum) = k.checked_add(&kb) {
                    let c = self.cst(sum);
                    return self.add(x, c);
                }
            }
        }
        if let Some(ka) = self.as_const(a) {
            if let Some((x, k)) = self.split_const_add(b) {
                if let Some(sum) = k.checked_add(&ka) {
                    let c = self.cst(sum);
                    return self.add(x, c);
                }
            }
        }
        let (lhs, rhs) = if a <= b { (a, b) } else { (b, a) };
        self.intern(Expr::Arith { op: ArithOp::Add, lhs, rhs })
    }

    pub fn sub(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if self.is_top(a) || self.is_top(b) {
            return self.top();
        }
        if a == b {
            return self.cst_abs(0);
        }
        match (self.as_const(a), self.as_const(b)) {
            (Some(ka), Some(kb)) => {
                return match ka.checked_sub(&kb) {
                    Some(k) => self.cst(k),
                    None => self.top(),
                };
            }
            (_, Some(kb)) if kb.is_absolute() => {
                // x - c = x + (-c), so the re-association rules apply
                let c = self.cst(Constant::abs(kb.value.wrapping_neg()));
                return self.add(a, c);
            }
            _ => {}
        }
        self.intern(Expr::Arith { op: ArithOp::Sub, lhs: a, rhs: b })
    }

    pub fn mul(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if self.is_top(a) || self.is_top(b) {
            return self.top();
        }
        match (self.as_const(a), self.as_const(b)) {
            (Some(ka), Some(kb)) => {
                return match ka.checked_mul(&kb) {
                    Some(k) => self.cst(k),
                    None => self.top(),
                };
            }
            (Some(k), None) | (None, Some(k)) if k == Constant::abs(0) => {
                return self.cst_abs(0);
            }
            (Some(k), None) if k == Constant::abs(1) => return b,
            (None, Some(k)) if k == Constant::abs(1) => return a,
            _ => {}
        }
        // (x*c1)*c2 = x*(c1*c2)
        if let Some(kb) = self.as_const(b) {
            if let Some((x, k)) = self.split_const_mul(a) {
                if let Some(prod) = k.checked_mul(&kb) {
                    let c = self.cst(prod);
                    return self.mul(x, c);
                }
            }
        }
        if let Some(ka) = self.as_const(a) {
            if let Some((x, k)) = self.split_const_mul(b) {
                if let Some(prod) = k.checked_mul(&ka) {
                    let c = self.cst(prod);
                    return self.mul(x, c);
                }
            }
        }
        let (lhs, rhs) = if a <= b { (a, b) } else { (b, a) };
        self.intern(Expr::Arith { op: ArithOp::Mul, lhs, rhs })
    }

    pub fn div(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if self.is_top(a) || self.is_top(b) {
            return self.top();
        }
        if let (Some(ka), Some(kb)) = (self.as_const(a), self.as_const(b)) {
            return match ka.checked_div(&kb) {
                Some(k) => self.cst(k),
                None => self.top(),
            };
        }
        if self.as_const(b) == Some(Constant::abs(1)) {
            return a;
        }
        self.intern(Expr::Arith { op: ArithOp::Div, lhs: a, rhs: b })
    }

    pub fn modulo(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if self.is_top(a) || self.is_top(b) {
            return self.top();
        }
        if let (Some(ka), Some(kb)) = (self.as_const(a), self.as_const(b)) {
            return match ka.checked_rem(&kb) {
                Some(k) => self.cst(k),
                None => self.top(),
            };
        }
        self.intern(Expr::Arith { op: ArithOp::Mod, lhs: a, rhs: b })
    }

    pub fn neg(&mut self, a: ExprId) -> ExprId {
        match self.get(a) {
            Expr::Top => self.top(),
            Expr::Const(k) => match k.checked_neg() {
                Some(n) => self.cst(n),
                None => self.top(),
            },
            Expr::Neg(x) => x,
            _ => self.intern(Expr::Neg(a)),
        }
    }

    /// Opaque comparison value (the result of a `cmp` semantic
    /// instruction); the relation applied to it lives on the branch.
    pub fn cmp(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if self.is_top(a) || self.is_top(b) {
            return self.top();
        }
        self.intern(Expr::Arith { op: ArithOp::Cmp, lhs: a, rhs: b })
    }

    /// Dispatch on an [`ArithOp`] tag (block-transfer convenience).
    pub fn arith(&mut self, op: ArithOp, a: ExprId, b: ExprId) -> ExprId {
        match op {
            ArithOp::Add => self.add(a, b),
            ArithOp::Sub => self.sub(a, b),
            ArithOp::Mul => self.mul(a, b),
            ArithOp::Div => self.div(a, b),
            ArithOp::Mod => self.modulo(a, b),
            ArithOp::Cmp => self.cmp(a, b),
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn is_top(&self, id: ExprId) -> bool {
        self.get(id).is_top()
    }

    pub fn is_const(&self, id: ExprId) -> bool {
        self.get(id).is_const()
    }

    pub fn as_const(&self, id: ExprId) -> Option<Constant> {
        self.get(id).as_const()
    }

    /// Number of nodes in the tree unfolding of `id` (predicate clamping).
    pub fn size(&self, id: ExprId) -> usize {
        match self.get(id) {
            Expr::Arith { lhs, rhs, .. } => 1 + self.size(lhs) + self.size(rhs),
            Expr::Neg(x) => 1 + self.size(x),
            _ => 1,
        }
    }

    /// Whether the tree under `id` contains a Top node. Top absorbs
    /// arithmetic at construction, so this only ever fires on Top itself;
    /// kept as a query so callers need not rely on that invariant.
    pub fn contains_top(&self, id: ExprId) -> bool {
        match self.get(id) {
            Expr::Top => true,
            Expr::Arith { lhs, rhs, .. } => self.contains_top(lhs) || self.contains_top(rhs),
            Expr::Neg(x) => self.contains_top(x),
            _ => false,
        }
    }

    /// Whether `Var(v)` occurs in the tree under `id`.
    pub fn mentions_var(&self, id: ExprId, v: VarId) -> bool {
        match self.get(id) {
            Expr::Var(w) => w == v,
            Expr::Arith { lhs, rhs, .. } => {
                self.mentions_var(lhs, v) || self.mentions_var(rhs, v)
            }
            Expr::Neg(x) => self.mentions_var(x, v),
            _ => false,
        }
    }

    /// Display adapter (expressions do not know their DAG).
    pub fn display(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { dag: self, id }
    }
}

/// Borrowing [`fmt::Display`] wrapper for an interned expression.
pub struct ExprDisplay<'a> {
    dag: &'a Dag,
    id: ExprId,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dag.get(self.id) {
            Expr::Const(k) => write!(f, "{}", k),
            Expr::Var(v) => {
                if v < 0 {
                    write!(f, "t{}", -v)
                } else {
                    write!(f, "r{}", v)
                }
            }
            Expr::Mem { addr, generation } => write!(f, "[{}]#{}", addr, generation),
            Expr::Iter(h) => write!(f, "I({})", h),
            Expr::Arith { op, lhs, rhs } => write!(
                f,
                "({} {} {})",
                self.dag.display(lhs),
                op,
                self.dag.display(rhs)
            ),
            Expr::Neg(x) => write!(f, "-{}", self.dag.display(x)),
            Expr::Top => write!(f, "T"),
        }
    }
}

impl Dag {
    /// `a` viewed as `x + k` when its constant tail is explicit.
    fn split_const_add(&self, a: ExprId) -> Option<(ExprId, Constant)> {
        if let Expr::Arith { op: ArithOp::Add, lhs, rhs } = self.get(a) {
            if let Some(k) = self.as_const(rhs) {
                return Some((lhs, k));
            }
            if let Some(k) = self.as_const(lhs) {
                return Some((rhs, k));
            }
        }
        None
    }

    /// `a` viewed as `x * k` when its constant factor is explicit.
    fn split_const_mul(&self, a: ExprId) -> Option<(ExprId, Constant)> {
        if let Expr::Arith { op: ArithOp::Mul, lhs, rhs } = self.get(a) {
            if let Some(k) = self.as_const(rhs) {
                return Some((lhs, k));
            }
            if let Some(k) = self.as_const(lhs) {
                return Some((rhs, k));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_identity() {
        let mut dag = Dag::new();
        let a = dag.var(0);
        let b = dag.var(1);
        let s1 = dag.add(a, b);
        let s2 = dag.add(b, a); // commutative normalization
        assert_eq!(s1, s2);
        assert_eq!(dag.var(0), a);
    }

    #[test]
    fn test_constant_folding() {
        let mut dag = Dag::new();
        let two = dag.cst_abs(2);
        let three = dag.cst_abs(3);
        let five = dag.add(two, three);
        assert_eq!(dag.as_const(five), Some(Constant::abs(5)));

        let sp = dag.cst(Constant::sp());
        let four = dag.cst_abs(4);
        let sp4 = dag.add(sp, four);
        assert_eq!(dag.as_const(sp4), Some(Constant::rel(4)));
    }

    #[test]
    fn test_identity_and_absorbing_laws() {
        let mut dag = Dag::new();
        let x = dag.var(3);
        let zero = dag.cst_abs(0);
        let one = dag.cst_abs(1);

        assert_eq!(dag.add(x, zero), x);
        assert_eq!(dag.mul(x, zero), zero);
        assert_eq!(dag.mul(x, one), x);
        assert_eq!(dag.sub(x, zero), x);
        assert_eq!(dag.sub(x, x), zero);
    }

    #[test]
    fn test_constant_tail_reassociation() {
        let mut dag = Dag::new();
        let x = dag.var(2);
        let c1 = dag.cst_abs(3);
        let c2 = dag.cst_abs(4);
        let lhs = dag.add(x, c1);
        let lhs = dag.add(lhs, c2);
        let c7 = dag.cst_abs(7);
        let rhs = dag.add(x, c7);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn test_sub_becomes_add_of_negated_constant() {
        let mut dag = Dag::new();
        let x = dag.var(1);
        let c4 = dag.cst_abs(4);
        let c1 = dag.cst_abs(1);
        let d = dag.sub(x, c4);
        let d = dag.add(d, c1);
        let c3 = dag.cst_abs(-3);
        assert_eq!(d, dag.add(x, c3));
    }

    #[test]
    fn test_double_negation() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let n = dag.neg(x);
        assert_eq!(dag.neg(n), x);
    }

    #[test]
    fn test_top_absorbs() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let t = dag.top();
        let a = dag.add(x, t);
        let m = dag.mul(t, t);
        let c = dag.cmp(x, t);
        assert!(dag.is_top(a));
        assert!(dag.is_top(m));
        assert!(dag.is_top(c));
    }

    #[test]
    fn test_mentions_var() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let y = dag.var(1);
        let two = dag.cst_abs(2);
        let e = dag.mul(y, two);
        let e = dag.add(x, e);
        let n = dag.neg(e);

        assert!(dag.mentions_var(n, 0));
        assert!(dag.mentions_var(n, 1));
        assert!(!dag.mentions_var(n, 2));
        assert!(!dag.mentions_var(two, 0));
    }

    #[test]
    fn test_mem_generations_are_distinct() {
        let mut dag = Dag::new();
        let before = dag.mem(Constant::rel(4), 0);
        let after = dag.mem(Constant::rel(4), 1);
        assert_ne!(before, after);
        assert_eq!(dag.mem(Constant::rel(4), 0), before);
    }

    #[test]
    fn test_division_by_zero_degrades_to_top() {
        let mut dag = Dag::new();
        let x = dag.cst_abs(8);
        let zero = dag.cst_abs(0);
        let d = dag.div(x, zero);
        let m = dag.modulo(x, zero);
        assert!(dag.is_top(d));
        assert!(dag.is_top(m));
    }
}
