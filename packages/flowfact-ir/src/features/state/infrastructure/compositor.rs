//! Expression Compositor
//!
//! Rewrites a callee-relative expression into the caller's frame: variable
//! references become the caller's current values, SP-relative constants
//! are shifted by the caller's stack offset, and memory atoms are resolved
//! through the caller's memory map (materializing cells the caller never
//! touched). The labels of every substituted binding are collected so the
//! rewritten predicate stays tied to the caller edges that produced the
//! substituted values.
//!
//! The same machinery composes an accelerated loop iterate onto the state
//! that entered the loop.

use crate::features::expression::domain::{Constant, Expr, ExprId};
use crate::features::expression::infrastructure::Dag;
use crate::features::state::domain::{LocalVariables, MemoryMap};
use crate::shared::EdgeId;
use std::collections::BTreeSet;

/// Caller-side view needed by the rewrite.
pub struct Compositor<'a> {
    pub lvars: &'a LocalVariables,
    pub mem: &'a mut MemoryMap,
    /// Caller SP as an entry-relative offset; `None` when the caller's SP
    /// is not a constant (SP-relative callee knowledge is then lost).
    pub sp_offset: Option<i32>,
}

impl Compositor<'_> {
    /// Shift a callee-frame address into the caller frame.
    pub fn shift_addr(&self, addr: Constant) -> Option<Constant> {
        if addr.sp_rel {
            self.sp_offset
                .map(|off| Constant::rel(addr.value.wrapping_add(off)))
        } else {
            Some(addr)
        }
    }

    /// Rewrite `g_expr` into the caller frame, accumulating the labels of
    /// every caller binding the rewrite consumed.
    pub fn rewrite(
        &mut self,
        dag: &mut Dag,
        g_expr: ExprId,
        labels: &mut BTreeSet<EdgeId>,
    ) -> ExprId {
        match dag.get(g_expr) {
            Expr::Const(k) => match self.shift_addr(k) {
                Some(k) => dag.cst(k),
                None => dag.top(),
            },
            Expr::Var(v) => match self.lvars.get(v) {
                Some(e) => {
                    labels.extend(self.lvars.labels_of(v).iter().copied());
                    e
                }
                None => dag.var(v),
            },
            Expr::Mem { addr, .. } => match self.shift_addr(addr) {
                Some(addr) => {
                    if let Some(cell) = self.mem.read(&addr) {
                        labels.extend(cell.labels.iter().copied());
                        cell.value
                    } else {
                        self.mem.materialize(dag, addr)
                    }
                }
                None => dag.top(),
            },
            Expr::Iter(h) => dag.iter(h),
            Expr::Neg(x) => {
                let x = self.rewrite(dag, x, labels);
                dag.neg(x)
            }
            Expr::Arith { op, lhs, rhs } => {
                let l = self.rewrite(dag, lhs, labels);
                let r = self.rewrite(dag, rhs, labels);
                dag.arith(op, l, r)
            }
            Expr::Top => dag.top(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_substitutes_caller_values_and_labels() {
        let mut dag = Dag::new();
        let mut lvars = LocalVariables::new(4, 0);
        let mut mem = MemoryMap::new();

        let zero = dag.cst_abs(0);
        lvars.set(0, zero, [EdgeId(9)].into_iter().collect());

        // callee expression: r0 + 1
        let r0 = dag.var(0);
        let one = dag.cst_abs(1);
        let g = dag.add(r0, one);

        let mut comp = Compositor { lvars: &lvars, mem: &mut mem, sp_offset: Some(-8) };
        let mut labels = BTreeSet::new();
        let rewritten = comp.rewrite(&mut dag, g, &mut labels);

        assert_eq!(dag.as_const(rewritten), Some(Constant::abs(1)));
        assert!(labels.contains(&EdgeId(9)));
    }

    #[test]
    fn test_rewrite_shifts_sp_relative_addresses() {
        let mut dag = Dag::new();
        let lvars = LocalVariables::new(4, 0);
        let mut mem = MemoryMap::new();

        let callee_slot = dag.cst(Constant::rel(4));
        let mut comp = Compositor { lvars: &lvars, mem: &mut mem, sp_offset: Some(-8) };
        let mut labels = BTreeSet::new();
        let shifted = comp.rewrite(&mut dag, callee_slot, &mut labels);
        assert_eq!(dag.as_const(shifted), Some(Constant::rel(-4)));
    }

    #[test]
    fn test_unknown_sp_degrades_to_top() {
        let mut dag = Dag::new();
        let lvars = LocalVariables::new(4, 0);
        let mut mem = MemoryMap::new();

        let callee_slot = dag.cst(Constant::rel(4));
        let mut comp = Compositor { lvars: &lvars, mem: &mut mem, sp_offset: None };
        let mut labels = BTreeSet::new();
        let shifted = comp.rewrite(&mut dag, callee_slot, &mut labels);
        assert!(dag.is_top(shifted));
    }

    #[test]
    fn test_memory_atom_resolves_through_caller_cells() {
        let mut dag = Dag::new();
        let lvars = LocalVariables::new(4, 0);
        let mut mem = MemoryMap::new();
        let seven = dag.cst_abs(7);
        mem.write(Constant::rel(-4), seven, [EdgeId(2)].into_iter().collect());

        // callee reads its [SP+4]; caller SP is SP-8, so that is caller [SP-4]
        let atom = dag.mem(Constant::rel(4), 0);
        let mut comp = Compositor { lvars: &lvars, mem: &mut mem, sp_offset: Some(-8) };
        let mut labels = BTreeSet::new();
        let v = comp.rewrite(&mut dag, atom, &mut labels);
        assert_eq!(v, seven);
        assert!(labels.contains(&EdgeId(2)));
    }
}
