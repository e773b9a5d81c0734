//! Block Transfer
//!
//! Interprets the semantic-instruction stream of one basic block on an
//! abstract state: local variables and memory are updated symbolically,
//! branch conditions generate predicates into the taken / not-taken
//! batches. Per-instruction errors degrade the affected slot to Top
//! rather than aborting the analysis.

use crate::features::expression::domain::ExprId;
use crate::features::expression::infrastructure::Dag;
use crate::features::cfg::domain::{Block, SemInst};
use crate::features::expression::domain::{ArithOp, Expr};
use crate::features::state::domain::{LabelledPredicate, Predicate};
use crate::features::state::infrastructure::context::AnalysisContext;
use crate::features::state::infrastructure::state::State;
use crate::shared::{EdgeId, VarId};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Operands of a pending comparison value, kept aside so the branch that
/// tests it can rebuild the relation with the labels that produced it.
#[derive(Clone)]
struct PendingCmp {
    lhs: ExprId,
    rhs: ExprId,
    labels: BTreeSet<EdgeId>,
}

/// Run `block`'s semantic stream on `state`.
pub fn execute_block(
    state: &mut State,
    block: &Block,
    ctx: &AnalysisContext<'_>,
    dag: &mut Dag,
) {
    let mut pending: FxHashMap<VarId, PendingCmp> = FxHashMap::default();

    for (index, inst) in block.insts.iter().enumerate() {
        match *inst {
            SemInst::Set { dst, src } => {
                let (v, labels) = operand(state, dag, src);
                let forwarded = pending.get(&src).cloned();
                rebind(state, dag, &mut pending, dst);
                if let Some(c) = forwarded {
                    pending.insert(dst, c);
                }
                state.lvars.set(dst, v, labels);
            }
            SemInst::SetI { dst, value } => {
                let k = dag.cst_abs(value);
                rebind(state, dag, &mut pending, dst);
                state.lvars.set(dst, k, BTreeSet::new());
            }
            SemInst::Arith { op, dst, a, b } => {
                let (va, la) = operand(state, dag, a);
                let (vb, lb) = operand(state, dag, b);
                let v = dag.arith(op, va, vb);
                rebind(state, dag, &mut pending, dst);
                state.lvars.set(dst, v, union(la, lb));
            }
            SemInst::Cmp { dst, a, b } => {
                let (va, la) = operand(state, dag, a);
                let (vb, lb) = operand(state, dag, b);
                let labels = union(la, lb);
                let v = dag.cmp(va, vb);
                rebind(state, dag, &mut pending, dst);
                pending.insert(dst, PendingCmp { lhs: va, rhs: vb, labels: labels.clone() });
                state.lvars.set(dst, v, labels);
            }
            SemInst::Branch { op, cond } => {
                let looked_up = pending.get(&cond).cloned().or_else(|| {
                    // the comparison may have been carried in from an
                    // earlier block through the condition register
                    let (v, labels) = operand(state, dag, cond);
                    match dag.get(v) {
                        Expr::Arith { op: ArithOp::Cmp, lhs, rhs } => {
                            Some(PendingCmp { lhs, rhs, labels })
                        }
                        _ => None,
                    }
                });
                let Some(c) = looked_up else {
                    warn!(
                        "branch in {} tests a condition with no known comparison, \
                         no predicate generated",
                        block.id
                    );
                    continue;
                };
                let taken = Predicate::new(op, c.lhs, c.rhs);
                record(state, dag, taken, c.labels.clone(), true);
                record(state, dag, taken.negated(), c.labels, false);
            }
            SemInst::Load { dst, addr } => {
                let (av, albls) = operand(state, dag, addr);
                rebind(state, dag, &mut pending, dst);
                match dag.as_const(av) {
                    Some(k) => {
                        if let Some(cell) = state.mem.read(&k) {
                            let value = cell.value;
                            let labels = union(albls, cell.labels.clone());
                            state.lvars.set(dst, value, labels);
                        } else if k.is_absolute() && ctx.config.use_initial_data {
                            match ctx.initial.lookup(k.value) {
                                Some(v) => {
                                    let c = dag.cst_abs(v);
                                    state.lvars.set(dst, c, albls);
                                }
                                None => {
                                    let atom = state.mem.materialize(dag, k);
                                    state.lvars.set(dst, atom, albls);
                                }
                            }
                        } else {
                            let atom = state.mem.materialize(dag, k);
                            state.lvars.set(dst, atom, albls);
                        }
                    }
                    None => {
                        debug!("load through a non-constant address in {}", block.id);
                        let top = dag.top();
                        state.lvars.set(dst, top, BTreeSet::new());
                    }
                }
            }
            SemInst::Store { src, addr } => {
                let (av, albls) = operand(state, dag, addr);
                let (sv, slbls) = operand(state, dag, src);
                match dag.as_const(av) {
                    Some(k) => state.mem.write(k, sv, union(slbls, albls)),
                    None => {
                        // expected aliasing wipe, not an error
                        debug!(
                            "store through a non-constant address in {}: wiping memory",
                            block.id
                        );
                        state.mem.wipe(block.id, index as u32);
                    }
                }
            }
            SemInst::Scratch { dst } => {
                let top = dag.top();
                rebind(state, dag, &mut pending, dst);
                state.lvars.set(dst, top, BTreeSet::new());
            }
        }
    }
}

/// Rebinding `dst` invalidates every predicate mentioning it: the pending
/// comparison it held or fed, and the uncommitted generated batches.
fn rebind(
    state: &mut State,
    dag: &Dag,
    pending: &mut FxHashMap<VarId, PendingCmp>,
    dst: VarId,
) {
    pending.retain(|&cond, c| {
        cond != dst && !dag.mentions_var(c.lhs, dst) && !dag.mentions_var(c.rhs, dst)
    });
    state.invalidate_generated(dag, dst);
}

fn operand(state: &mut State, dag: &mut Dag, v: VarId) -> (ExprId, BTreeSet<EdgeId>) {
    let value = state.lvars.value(dag, v);
    let labels = state.lvars.labels_of(v).clone();
    (value, labels)
}

fn union(mut a: BTreeSet<EdgeId>, b: BTreeSet<EdgeId>) -> BTreeSet<EdgeId> {
    a.extend(b);
    a
}

/// Record a generated predicate unless it is trivially true, collapses
/// onto itself after substitution, or is useless to the solver.
fn record(
    state: &mut State,
    dag: &Dag,
    pred: Predicate,
    labels: BTreeSet<EdgeId>,
    taken: bool,
) {
    if pred.is_tautology(dag) || pred.mentions_top(dag) || pred.is_self_referential(dag) {
        return;
    }
    state.push_generated(LabelledPredicate::new(pred, labels), taken);
}
