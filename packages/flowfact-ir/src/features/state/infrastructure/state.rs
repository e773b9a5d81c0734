//! Abstract State and State Collections
//!
//! A state abstracts the set of concrete executions sharing one path
//! through the CFG: the detailed path itself, the symbolic local-variable
//! and memory stores, and the labelled predicates accumulated so far.
//! States are created on a CFG entry edge and mutated only by the block
//! transfer and the edge-append/merge/widening/apply operations, all on
//! the owning analysis worker.

use crate::errors::{FlowfactError, Result};
use crate::features::expression::domain::{CmpOp, Constant, ExprId};
use crate::features::expression::infrastructure::{linearize, Dag, LinAtom};
use crate::features::cfg::domain::{Block, Edge};
use crate::features::state::domain::{
    DetailedPath, LabelledPredicate, LocalVariables, MemoryMap, Predicate,
};
use crate::features::state::infrastructure::compositor::Compositor;
use crate::features::state::infrastructure::context::AnalysisContext;
use crate::shared::{BlockId, EdgeId, VarId};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// How a composition anchors its path bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Function apply at a call block.
    Call(BlockId),
    /// Accelerated loop iterate applied onto the loop-entry state.
    Loop(BlockId),
}

/// Abstract state of a set of program paths.
#[derive(Debug, Clone)]
pub struct State {
    bottom: bool,
    pub path: DetailedPath,
    pub lvars: LocalVariables,
    pub mem: MemoryMap,
    /// Predicates labelled with the edges they were generated along.
    labelled: Vec<LabelledPredicate>,
    /// Predicates generated in the current block (not yet labelled).
    generated: Vec<LabelledPredicate>,
    /// Taken-side batch of a conditional block.
    generated_taken: Vec<LabelledPredicate>,
}

impl State {
    /// Identity state: every variable holds its entry value, memory is
    /// pristine, SP is anchored at `SP+0`. Used for function entries,
    /// callee summaries and relative loop iterates alike.
    pub fn initial(ctx: &AnalysisContext<'_>, dag: &mut Dag) -> Self {
        let mut lvars =
            LocalVariables::new(ctx.platform.registers, ctx.platform.tempvars);
        let sp = dag.cst(Constant::sp());
        lvars.set(ctx.platform.sp, sp, BTreeSet::new());
        lvars.clear_labels();
        Self {
            bottom: false,
            path: DetailedPath::new(),
            lvars,
            mem: MemoryMap::new(),
            labelled: Vec::new(),
            generated: Vec::new(),
            generated_taken: Vec::new(),
        }
    }

    pub fn is_bottom(&self) -> bool {
        self.bottom
    }

    pub fn set_bottom(&mut self) {
        self.bottom = true;
    }

    // ── Predicate access ───────────────────────────────────────────────

    /// Every predicate the state currently knows: the block-local batch
    /// first, then the labelled store (the original iteration order).
    pub fn predicates(&self) -> impl Iterator<Item = &LabelledPredicate> {
        self.generated.iter().chain(self.labelled.iter())
    }

    pub fn labelled_preds(&self) -> &[LabelledPredicate] {
        &self.labelled
    }

    pub fn push_generated(&mut self, lp: LabelledPredicate, taken: bool) {
        if taken {
            self.generated_taken.push(lp);
        } else {
            self.generated.push(lp);
        }
    }

    pub fn push_labelled(&mut self, lp: LabelledPredicate) {
        self.labelled.push(lp);
    }

    /// Rebinding `v` retires every uncommitted generated predicate that
    /// mentions it; the comparison it was built from no longer describes
    /// the register being tested.
    pub fn invalidate_generated(&mut self, dag: &Dag, v: VarId) {
        let survives = |lp: &LabelledPredicate| {
            !dag.mentions_var(lp.pred.lhs, v) && !dag.mentions_var(lp.pred.rhs, v)
        };
        self.generated.retain(survives);
        self.generated_taken.retain(survives);
    }

    /// Constant predicates left after a SAT verdict are tautologies of
    /// the state; keeping them only slows the next solver call.
    pub fn remove_constant_predicates(&mut self, dag: &Dag) {
        self.labelled.retain(|lp| !lp.pred.is_constant(dag));
        self.generated.retain(|lp| !lp.pred.is_constant(dag));
    }

    /// Drop Top-valued bindings and cells; they carry no information and
    /// only grow the state.
    pub fn clean_tops(&mut self, dag: &Dag) {
        let tops: Vec<VarId> = self
            .lvars
            .bound()
            .filter(|&(_, e)| dag.is_top(e))
            .map(|(v, _)| v)
            .collect();
        for v in tops {
            self.lvars.forget(v);
        }
        self.mem.drop_tops(dag);
        self.labelled.retain(|lp| !lp.pred.mentions_top(dag));
        self.generated.retain(|lp| !lp.pred.mentions_top(dag));
    }

    // ── Edge append and predicate labelling ────────────────────────────

    /// Append `edge` to the path and label the relevant predicate batch
    /// with it. On a conditional's taken edge the taken batch is used;
    /// otherwise the plain batch is used and the taken batch is flushed.
    /// The unused batch holds facts about the *other* successor and is
    /// discarded either way; the batches are local to one block.
    pub fn append_edge(&mut self, edge: &Edge, source_is_conditional: bool) {
        self.path.add_edge(edge.id);
        let batch = if source_is_conditional && edge.taken {
            self.generated.clear();
            std::mem::take(&mut self.generated_taken)
        } else {
            self.generated_taken.clear();
            std::mem::take(&mut self.generated)
        };
        for mut lp in batch {
            lp.add_label(edge.id);
            self.labelled.push(lp);
        }
        self.lvars.on_edge(edge.id);
        self.mem.on_edge(edge.id);
    }

    // ── Fixpoint equivalence ───────────────────────────────────────────

    /// Not Leibniz equality: the fixpoint test. Paths, labels and memory
    /// origins are ignored; only the bottom flags, the variable values and
    /// the predicate set (by value) matter.
    pub fn equiv(&self, other: &State) -> bool {
        if self.bottom || other.bottom {
            return self.bottom == other.bottom;
        }
        if !self.lvars.values_equal(&other.lvars) {
            return false;
        }
        if self.labelled.len() != other.labelled.len() {
            return false;
        }
        self.labelled
            .iter()
            .all(|lp| other.labelled.iter().any(|o| o.pred == lp.pred))
    }

    // ── Merge (join at a confluence point) ─────────────────────────────

    /// Merge a non-empty collection into one state converging on `block`.
    pub fn merged(
        states: &[State],
        block: &Block,
        ctx: &AnalysisContext<'_>,
        dag: &mut Dag,
    ) -> Result<State> {
        debug_assert!(!states.is_empty(), "merge of an empty state collection");
        check_satisfiable_sp(states, ctx, dag)?;
        debug!("merging {} states at {}", states.len(), block.id);

        let mut s = states[0].clone();
        s.generated.clear();
        s.generated_taken.clear();
        // the merged predicate no longer holds under any single edge set
        s.labelled = states[0]
            .labelled
            .iter()
            .map(|lp| LabelledPredicate::unlabelled(lp.pred))
            .collect();

        let mut wipe = false;
        for other in &states[1..] {
            s.lvars.merge(&other.lvars);
            if other.mem.memid() != s.mem.memid() {
                wipe = true;
            } else if !wipe {
                s.mem.pointwise_merge(&other.mem, dag);
            }
            s.labelled
                .retain(|lp| other.labelled.iter().any(|o| o.pred == lp.pred));
        }

        s.path = DetailedPath::from_context(block);
        if wipe {
            s.mem.wipe(block.id, 0);
        }
        s.bottom = false;
        Ok(s)
    }

    // ── Composition (function apply) ───────────────────────────────────

    /// `self ∘ g`: apply the summary state `g` (callee, or accelerated
    /// loop iterate) on top of this state. The mode decides the path
    /// bookkeeping: a call wraps the callee path in Call/Return markers,
    /// a loop opens the loop bracket and discards the relative iteration
    /// path (its bindings were erased by widening anyway).
    pub fn apply(
        &mut self,
        g: &State,
        mode: ApplyMode,
        ctx: &AnalysisContext<'_>,
        dag: &mut Dag,
    ) {
        let anchor = match mode {
            ApplyMode::Call(b) | ApplyMode::Loop(b) => b,
        };
        let sp_offset = match self.lvars.get(ctx.platform.sp) {
            None => Some(0),
            Some(e) => match dag.as_const(e) {
                Some(k) if k.sp_rel => Some(k.value),
                _ => None,
            },
        };

        let wipe = sp_offset.is_none() || g.mem.memid().was_wiped();
        let mut scratch_mem = self.mem.clone();
        if wipe {
            if g.mem.memid().was_wiped() {
                warn!(
                    "discarding callee memory: wiped at {:?}",
                    g.mem.memid().block
                );
            } else {
                warn!("discarding callee memory: caller SP is not a constant");
            }
            scratch_mem.wipe(anchor, 0);
        }

        let mut rewrites: Vec<(VarId, ExprId, BTreeSet<EdgeId>)> = Vec::new();
        let mut cell_writes = Vec::new();
        let mut new_preds = Vec::new();
        {
            let mut comp = Compositor {
                lvars: &self.lvars,
                mem: &mut scratch_mem,
                sp_offset,
            };

            for (v, ge) in g.lvars.bound() {
                let mut labels = g.lvars.labels_of(v).clone();
                let e = comp.rewrite(dag, ge, &mut labels);
                rewrites.push((v, e, labels));
            }

            if !wipe {
                for (addr, cell) in g.mem.iter() {
                    let Some(addr) = comp.shift_addr(*addr) else { continue };
                    let mut labels = cell.labels.clone();
                    let v = comp.rewrite(dag, cell.value, &mut labels);
                    cell_writes.push((addr, v, labels));
                }
            }

            for lp in g.predicates() {
                let mut labels = lp.labels.clone();
                let l = comp.rewrite(dag, lp.pred.lhs, &mut labels);
                let r = comp.rewrite(dag, lp.pred.rhs, &mut labels);
                let p = Predicate::new(lp.pred.op, l, r);
                if p.is_tautology(dag) || p.mentions_top(dag) || p.is_self_referential(dag) {
                    continue;
                }
                new_preds.push(LabelledPredicate::new(p, labels));
            }
        }

        for (v, e, labels) in rewrites {
            self.lvars.set(v, e, labels);
        }
        for (addr, v, labels) in cell_writes {
            scratch_mem.write(addr, v, labels);
        }
        self.mem = scratch_mem;
        self.labelled.extend(new_preds);
        match mode {
            ApplyMode::Call(b) => self.path.apply(&g.path, b),
            // the loop-entry state already carries its LoopEntry marker;
            // the relative iteration path dissolves into the acceleration
            ApplyMode::Loop(_) => {}
        }
    }

    // ── Loop acceleration ──────────────────────────────────────────────

    /// Forget everything a loop iteration changes in a non-constant way,
    /// so the next pass computes values relative to the iteration entry.
    pub fn prepare_fixpoint(&mut self, dag: &Dag) {
        let forget: Vec<VarId> = self
            .lvars
            .bound()
            .filter(|&(_, e)| !dag.is_const(e))
            .map(|(v, _)| v)
            .collect();
        for v in forget {
            self.lvars.forget(v);
        }
        self.mem.retain_constants(dag);
        self.labelled.clear();
        self.generated.clear();
        self.generated_taken.clear();
    }

    /// Single-shot widening with the iteration operand `n`: affine updates
    /// with unit coefficient accelerate to `x0 + n·b`, linear slots defer
    /// to their dependencies, everything else goes to Top. Accelerated
    /// bindings are loop invariants, so their labels are erased, and the
    /// oracle learns `0 ≤ n`.
    pub fn widening(&mut self, n: ExprId, dag: &mut Dag, no_widening: bool) {
        let len = self.lvars.len();
        let mut done = vec![false; len];
        let top = dag.top();

        if no_widening {
            let modified: Vec<VarId> = self.lvars.bound().map(|(v, _)| v).collect();
            for v in modified {
                self.lvars.set(v, top, BTreeSet::new());
            }
        } else {
            loop {
                let mut changed = false;
                for i in 0..len {
                    if done[i] {
                        continue;
                    }
                    let v = self.lvars.id_at(i);
                    let Some(e) = self.lvars.get(v) else {
                        done[i] = true; // identity stays identity
                        changed = true;
                        continue;
                    };
                    let self_var = dag.var(v);
                    if e == self_var {
                        done[i] = true;
                        changed = true;
                        continue;
                    }
                    let Some(le) = linearize(dag, e) else {
                        self.lvars.set(v, top, BTreeSet::new());
                        done[i] = true;
                        changed = true;
                        continue;
                    };
                    let self_coeff = le.coeff(LinAtom::Node(self_var));
                    let only_self = le
                        .terms
                        .keys()
                        .all(|&a| a == LinAtom::Node(self_var));
                    if self_coeff == 1 && only_self {
                        // x_{k+1} = x_k + b accelerates to x0 + n·b
                        match i32::try_from(le.constant) {
                            Ok(b) => {
                                let bk = dag.cst_abs(b);
                                let step = dag.mul(n, bk);
                                let acc = dag.add(self_var, step);
                                self.lvars.set(v, acc, BTreeSet::new());
                            }
                            Err(_) => {
                                self.lvars.set(v, top, BTreeSet::new());
                            }
                        }
                        done[i] = true;
                        changed = true;
                    } else if self_coeff == 0 {
                        // no self-dependence: wait until every variable it
                        // reads has been decided, then keep it
                        let ready = le.terms.keys().all(|&a| match a {
                            LinAtom::SpBase => true,
                            LinAtom::Node(id) => match dag.get(id) {
                                crate::features::expression::domain::Expr::Var(w) => {
                                    let wi = (0..len)
                                        .find(|&j| self.lvars.id_at(j) == w)
                                        .unwrap_or(i);
                                    done[wi]
                                }
                                _ => false,
                            },
                        });
                        if ready {
                            done[i] = true;
                            changed = true;
                        }
                    } else {
                        // self-coefficient ≠ 1 (or mixed): not accelerable
                        warn!(
                            "widening: update of r{} too complex to accelerate, going to Top",
                            v
                        );
                        self.lvars.set(v, top, BTreeSet::new());
                        done[i] = true;
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
            for i in 0..len {
                if !done[i] {
                    let v = self.lvars.id_at(i);
                    self.lvars.set(v, top, BTreeSet::new());
                }
            }
        }

        self.mem.retain_constants(dag);
        self.lvars.clear_labels();
        self.mem.clear_labels();
        // predicates tied to edges of one specific iteration do not
        // survive acceleration
        self.labelled.retain(|lp| lp.labels.is_empty());

        let zero = dag.cst_abs(0);
        self.labelled.push(LabelledPredicate::unlabelled(Predicate::new(
            CmpOp::Le,
            zero,
            n,
        )));
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bottom {
            write!(f, "⊥")
        } else {
            write!(f, "{}", self.path)
        }
    }
}

/// SP-consistency check before a merge: states reaching one confluence
/// point with different stack offsets indicate broken stack tracking
/// upstream.
fn check_satisfiable_sp(
    states: &[State],
    ctx: &AnalysisContext<'_>,
    dag: &Dag,
) -> Result<()> {
    if ctx.config.assume_identical_sp {
        return Ok(());
    }
    let mut seen: Option<Constant> = None;
    for s in states {
        let sp = match s.lvars.get(ctx.platform.sp) {
            None => Constant::sp(),
            Some(e) => match dag.as_const(e) {
                Some(k) if k.sp_rel => k,
                _ => {
                    let msg = "SP is not tracked as a stack-relative constant".to_string();
                    if ctx.config.sp_critical {
                        return Err(FlowfactError::SpNotTracked(msg));
                    }
                    warn!("{msg}");
                    return Ok(());
                }
            },
        };
        match seen {
            None => seen = Some(sp),
            Some(prev) if prev != sp => {
                let msg = format!("merging states with different SP offsets ({prev} vs {sp})");
                if ctx.config.sp_critical {
                    return Err(FlowfactError::SpNotTracked(msg));
                }
                warn!("{msg}");
                return Ok(());
            }
            _ => {}
        }
    }
    Ok(())
}

/// Ordered collection of states flowing along one edge.
#[derive(Debug, Clone, Default)]
pub struct States {
    list: Vec<State>,
}

impl States {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(list: Vec<State>) -> Self {
        Self { list }
    }

    pub fn push(&mut self, s: State) {
        self.list.push(s);
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, State> {
        self.list.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, State> {
        self.list.iter_mut()
    }

    pub fn states(&self) -> &[State] {
        &self.list
    }

    pub fn into_vec(self) -> Vec<State> {
        self.list
    }

    pub fn extend(&mut self, other: States) {
        self.list.extend(other.list);
    }

    pub fn purge_bottom_states(&mut self) {
        self.list.retain(|s| !s.is_bottom());
    }

    /// Collapse the collection into a single merged state.
    pub fn merge_into_one(
        &self,
        block: &Block,
        ctx: &AnalysisContext<'_>,
        dag: &mut Dag,
    ) -> Result<States> {
        let live: Vec<State> = self.list.iter().filter(|s| !s.is_bottom()).cloned().collect();
        if live.len() <= 1 {
            return Ok(States::from_vec(live));
        }
        let merged = State::merged(&live, block, ctx, dag)?;
        Ok(States::from_vec(vec![merged]))
    }

    /// Compose every state with every summary state (function apply).
    pub fn applied(
        &self,
        summaries: &States,
        mode: ApplyMode,
        ctx: &AnalysisContext<'_>,
        dag: &mut Dag,
    ) -> States {
        let mut out = States::new();
        for f in &self.list {
            if f.is_bottom() {
                continue;
            }
            for g in &summaries.list {
                if g.is_bottom() {
                    continue;
                }
                let mut composed = f.clone();
                composed.apply(g, mode, ctx, dag);
                out.push(composed);
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a States {
    type Item = &'a State;
    type IntoIter = std::slice::Iter<'a, State>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::features::cfg::domain::{BlockKind, InitialData, Platform};
    use crate::shared::CfgId;

    fn block(id: u32) -> Block {
        Block {
            id: BlockId(id),
            cfg: CfgId(0),
            kind: BlockKind::Basic,
            insts: Vec::new(),
            callee: None,
            is_loop_header: false,
            loop_nest: Vec::new(),
            ins: Vec::new(),
            outs: Vec::new(),
        }
    }

    #[test]
    fn test_initial_state_anchors_sp() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();
        let s = State::initial(&ctx, &mut dag);
        let sp = s.lvars.get(13).unwrap();
        assert_eq!(dag.as_const(sp), Some(Constant::sp()));
        assert!(!s.is_bottom());
    }

    #[test]
    fn test_equiv_ignores_labels_and_paths() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();

        let mut a = State::initial(&ctx, &mut dag);
        let mut b = State::initial(&ctx, &mut dag);
        let x = dag.var(0);
        let ten = dag.cst_abs(10);
        let p = Predicate::new(CmpOp::Lt, x, ten);

        a.push_labelled(LabelledPredicate::new(p, [EdgeId(1)].into_iter().collect()));
        b.push_labelled(LabelledPredicate::new(p, [EdgeId(2)].into_iter().collect()));
        b.path.add_edge(EdgeId(7));

        assert!(a.equiv(&b));

        b.push_labelled(LabelledPredicate::unlabelled(p.negated()));
        assert!(!a.equiv(&b));
    }

    #[test]
    fn test_merge_intersects_predicates_and_erases_labels() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();

        let mut a = State::initial(&ctx, &mut dag);
        let mut b = State::initial(&ctx, &mut dag);
        let x = dag.var(0);
        let ten = dag.cst_abs(10);
        let shared = Predicate::new(CmpOp::Lt, x, ten);
        let only_a = Predicate::new(CmpOp::Ne, x, ten);

        a.push_labelled(LabelledPredicate::new(shared, [EdgeId(1)].into_iter().collect()));
        a.push_labelled(LabelledPredicate::unlabelled(only_a));
        b.push_labelled(LabelledPredicate::new(shared, [EdgeId(2)].into_iter().collect()));

        let merged =
            State::merged(&[a, b], &block(4), &ctx, &mut dag).unwrap();
        assert_eq!(merged.labelled_preds().len(), 1);
        assert_eq!(merged.labelled_preds()[0].pred, shared);
        assert!(merged.labelled_preds()[0].labels.is_empty());
    }

    #[test]
    fn test_append_edge_labels_the_right_batch() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();

        let mut s = State::initial(&ctx, &mut dag);
        let x = dag.var(0);
        let ten = dag.cst_abs(10);
        let taken_pred = Predicate::new(CmpOp::Lt, x, ten);
        let else_pred = taken_pred.negated();
        s.push_generated(LabelledPredicate::unlabelled(taken_pred), true);
        s.push_generated(LabelledPredicate::unlabelled(else_pred), false);

        let e = Edge {
            id: EdgeId(3),
            source: BlockId(0),
            target: BlockId(1),
            taken: true,
            back: false,
            loop_exit: None,
        };
        s.append_edge(&e, true);

        assert_eq!(s.labelled_preds().len(), 1);
        assert_eq!(s.labelled_preds()[0].pred, taken_pred);
        assert!(s.labelled_preds()[0].labels.contains(&EdgeId(3)));
        // predicate labelling invariant: labels ⊆ path edges
        assert!(s.path.contains_edge(EdgeId(3)));

        // the not-taken batch described the other successor; it must not
        // leak onto a later edge
        let next = Edge {
            id: EdgeId(4),
            source: BlockId(1),
            target: BlockId(2),
            taken: false,
            back: false,
            loop_exit: None,
        };
        s.append_edge(&next, false);
        assert_eq!(s.labelled_preds().len(), 1);
    }

    #[test]
    fn test_apply_drops_self_referential_rewrites() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();

        // caller binds r1 = r0 + 1; callee asserts r1 = r0, which
        // rewrites to r0 + 1 = r0
        let mut f = State::initial(&ctx, &mut dag);
        let r0 = dag.var(0);
        let one = dag.cst_abs(1);
        let r0p1 = dag.add(r0, one);
        f.lvars.set(1, r0p1, BTreeSet::new());

        let mut g = State::initial(&ctx, &mut dag);
        let r1 = dag.var(1);
        g.push_labelled(LabelledPredicate::unlabelled(Predicate::new(CmpOp::Eq, r1, r0)));

        let before = f.labelled_preds().len();
        f.apply(&g, ApplyMode::Call(BlockId(5)), &ctx, &mut dag);
        assert_eq!(f.labelled_preds().len(), before);
    }

    #[test]
    fn test_invalidate_generated_retires_mentions() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();

        let mut s = State::initial(&ctx, &mut dag);
        let x = dag.var(0);
        let y = dag.var(1);
        let ten = dag.cst_abs(10);
        s.push_generated(LabelledPredicate::unlabelled(Predicate::new(CmpOp::Lt, x, ten)), true);
        s.push_generated(LabelledPredicate::unlabelled(Predicate::new(CmpOp::Lt, y, ten)), true);

        // rebinding r0 retires the x predicate; the y one is untouched
        s.invalidate_generated(&dag, 0);
        let e = Edge {
            id: EdgeId(9),
            source: BlockId(0),
            target: BlockId(1),
            taken: true,
            back: false,
            loop_exit: None,
        };
        s.append_edge(&e, true);
        assert_eq!(s.labelled_preds().len(), 1);
        assert_eq!(s.labelled_preds()[0].pred.lhs, y);
    }

    #[test]
    fn test_widening_accelerates_unit_affine_updates() {
        let config = AnalysisConfig::default();
        let initial = InitialData::new();
        let ctx = AnalysisContext::new(Platform::new(13, 16, 8), &initial, &config);
        let mut dag = Dag::new();

        let mut s = State::initial(&ctx, &mut dag);
        // r0 := r0 + 2 each iteration; r1 := r1 * r1 is too complex
        let r0 = dag.var(0);
        let two = dag.cst_abs(2);
        let upd = dag.add(r0, two);
        s.lvars.set(0, upd, BTreeSet::new());
        let r1 = dag.var(1);
        let sq = dag.mul(r1, r1);
        s.lvars.set(1, sq, BTreeSet::new());

        let n = dag.iter(BlockId(9));
        s.widening(n, &mut dag, false);

        let step = dag.mul(n, two);
        let expected = dag.add(r0, step);
        assert_eq!(s.lvars.get(0), Some(expected));
        assert!(dag.is_top(s.lvars.get(1).unwrap()));
        // the oracle learns 0 <= n
        assert!(s
            .labelled_preds()
            .iter()
            .any(|lp| lp.pred.op == CmpOp::Le && lp.pred.rhs == n));
    }
}
