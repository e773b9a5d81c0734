//! Worklist Driver
//!
//! Depth-oriented traversal of each CFG with per-loop fixpoint detection
//! and acceleration, function-call composition through memoized callee
//! summaries, and oracle invocations at the conditional edges of the
//! sequential level.
//!
//! Loops are analyzed *relative to their entry*: the first arrival at a
//! header snapshots the incoming state and seeds an identity iterate;
//! back-edge arrivals are compared against the previous iterate (the
//! fixpoint test), promoting the header along
//! `Enter → Fix (prepared baseline) → Accel (widened) → Leave`. At
//! `Leave` the accelerated iterate is composed onto the snapshot and one
//! final pass runs over the body with the oracle enabled and the exit
//! edges released.

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::analysis::domain::{AnalysisReport, LoopStatus};
use crate::features::cfg::domain::{Block, BlockKind, Edge, InitialData, Platform, Program};
use crate::features::cfg::infrastructure::dominance::{EdgeDominance, GlobalDominance};
use crate::features::expression::infrastructure::Dag;
use crate::features::postprocessing::infrastructure::simplify_paths;
use crate::features::smt::domain::IpStats;
use crate::features::smt::infrastructure::oracle::ipcheck;
use crate::features::state::domain::DetailedPath;
use crate::features::state::infrastructure::context::AnalysisContext;
use crate::features::state::infrastructure::state::{ApplyMode, State, States};
use crate::features::state::infrastructure::transfer::execute_block;
use crate::shared::{BlockId, CfgId, EdgeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, warn};

/// Analyze a whole program; dominance for the post-processor is computed
/// from the program itself.
pub fn analyze(
    program: &Program,
    platform: Platform,
    initial: &InitialData,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    let dominance = EdgeDominance::from_program(program);
    analyze_with_dominance(program, platform, initial, &dominance, config)
}

/// Analyze with a caller-provided dominance service.
pub fn analyze_with_dominance(
    program: &Program,
    platform: Platform,
    initial: &InitialData,
    dominance: &dyn GlobalDominance,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    let ctx = AnalysisContext::new(platform, initial, config);
    let mut driver = Driver::new(program, ctx);

    let mut entry = States::new();
    entry.push(State::initial(&driver.ctx, &mut driver.dag));
    driver.analyze_cfg(program.entry, entry)?;

    let mut paths = driver.infeasible;
    if config.post_processing {
        paths = simplify_paths(paths, dominance);
    } else {
        let mut unique: Vec<DetailedPath> = Vec::with_capacity(paths.len());
        for p in paths {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        paths = unique;
    }
    Ok(AnalysisReport { infeasible_paths: paths, stats: driver.stats })
}

struct Driver<'p, 'c> {
    program: &'p Program,
    ctx: AnalysisContext<'c>,
    dag: Dag,
    /// Callee exit summaries, relative to the callee's entry.
    summaries: FxHashMap<CfgId, Rc<States>>,
    /// Cycle guard for (unsupported) recursive call chains.
    in_progress: FxHashSet<CfgId>,
    infeasible: Vec<DetailedPath>,
    stats: IpStats,
}

/// Per-CFG traversal bookkeeping.
#[derive(Default)]
struct CfgPass {
    edge_states: FxHashMap<EdgeId, Rc<States>>,
    loop_status: FxHashMap<BlockId, LoopStatus>,
    /// Outer states observed when the loop was first entered.
    loop_entry: FxHashMap<BlockId, States>,
    /// Previous relative iterate of each header (the fixpoint reference).
    loop_prev: FxHashMap<BlockId, State>,
    /// Accelerated entry states of a header at Leave.
    leave_input: FxHashMap<BlockId, States>,
    iterations: FxHashMap<BlockId, usize>,
    worklist: VecDeque<BlockId>,
    queued: FxHashSet<BlockId>,
}

impl CfgPass {
    fn status(&self, h: BlockId) -> LoopStatus {
        self.loop_status.get(&h).copied().unwrap_or(LoopStatus::Enter)
    }

    fn push(&mut self, b: BlockId) {
        if self.queued.insert(b) {
            self.worklist.push_back(b);
        }
    }

    fn pop(&mut self) -> Option<BlockId> {
        let b = self.worklist.pop_front()?;
        self.queued.remove(&b);
        Some(b)
    }
}

impl<'p, 'c> Driver<'p, 'c> {
    fn new(program: &'p Program, ctx: AnalysisContext<'c>) -> Self {
        Self {
            program,
            ctx,
            dag: Dag::new(),
            summaries: FxHashMap::default(),
            in_progress: FxHashSet::default(),
            infeasible: Vec::new(),
            stats: IpStats::default(),
        }
    }

    /// Run the worklist over one CFG; returns the states reaching its
    /// exit block (the function summary when entered with an identity
    /// state).
    fn analyze_cfg(&mut self, cfg_id: CfgId, entry_states: States) -> Result<States> {
        let program = self.program;
        let cfg = program.cfg(cfg_id);
        debug!("analyzing CFG {} ({})", cfg_id, cfg.name);
        let mut pass = CfgPass::default();

        let entry_block = program.block(cfg.entry);
        for &e in &entry_block.outs {
            let edge = program.edge(e);
            let states = self.follow_edge(entry_states.clone(), edge, entry_block);
            self.store(&mut pass, edge, states);
        }

        while let Some(b) = pass.pop() {
            if b == cfg.exit {
                continue;
            }
            let block = program.block(b);
            match block.kind {
                BlockKind::Call => self.process_call(block, &mut pass)?,
                _ if block.is_loop_header && pass.status(b) != LoopStatus::Leave => {
                    self.process_loop_header(block, &mut pass)?
                }
                _ => self.process_block(block, &mut pass)?,
            }
        }

        // the function summary is whatever reaches the exit block
        let exit_block = program.block(cfg.exit);
        let mut out = self.join(&pass, &exit_block.ins);
        out.purge_bottom_states();
        Ok(out)
    }

    // ── Plain blocks ───────────────────────────────────────────────────

    fn process_block(&mut self, block: &Block, pass: &mut CfgPass) -> Result<()> {
        if !self.ins_ready(block, pass) {
            return Ok(());
        }
        let inputs = self.join_for(block, pass)?;
        if inputs.is_empty() {
            return Ok(());
        }
        self.transfer_and_propagate(inputs, block, pass)
    }

    /// A block may only be processed once every non-back ingoing edge has
    /// been annotated (possibly with an empty collection): judging a
    /// partial join would let the oracle accept witnesses a still-missing
    /// sibling state could later refute.
    fn ins_ready(&self, block: &Block, pass: &CfgPass) -> bool {
        block
            .ins
            .iter()
            .filter(|&&e| !self.program.edge(e).back)
            .all(|e| pass.edge_states.contains_key(e))
    }

    /// Join of the relevant ingoing edges of `block`, merged down when
    /// the collection outgrows the configured limit.
    fn join_for(&mut self, block: &Block, pass: &mut CfgPass) -> Result<States> {
        if pass.status(block.id) == LoopStatus::Leave && block.is_loop_header {
            // the accelerated entry replaces the (stale) in-edge states
            return Ok(pass.leave_input.get(&block.id).cloned().unwrap_or_default());
        }
        let mut inputs = self.join(pass, &block.ins);
        inputs.purge_bottom_states();
        if self.ctx.config.merge && inputs.len() > self.ctx.config.state_size_limit {
            inputs = inputs.merge_into_one(block, &self.ctx, &mut self.dag)?;
        }
        Ok(inputs)
    }

    fn join(&self, pass: &CfgPass, edges: &[EdgeId]) -> States {
        let mut out = States::new();
        for e in edges {
            if let Some(ss) = pass.edge_states.get(e) {
                for s in ss.iter() {
                    out.push(s.clone());
                }
            }
        }
        out
    }

    /// Transfer `block` on every input state and push the results along
    /// each permitted outgoing edge.
    fn transfer_and_propagate(
        &mut self,
        inputs: States,
        block: &Block,
        pass: &mut CfgPass,
    ) -> Result<()> {
        let mut transferred = States::new();
        for s in inputs.iter() {
            let mut s = s.clone();
            execute_block(&mut s, block, &self.ctx, &mut self.dag);
            transferred.push(s);
        }
        self.propagate(transferred, block, pass)
    }

    fn propagate(&mut self, states: States, block: &Block, pass: &mut CfgPass) -> Result<()> {
        let program = self.program;
        for &e in &block.outs {
            let edge = program.edge(e);
            if !self.edge_permitted(edge, pass) {
                continue;
            }
            let mut out = self.follow_edge(states.clone(), edge, block);
            if self.in_d_ip(edge, block, pass) {
                let found = ipcheck(&mut out, &self.dag, self.ctx.config, &mut self.stats);
                self.infeasible.extend(found);
            }
            self.store(pass, edge, out);
        }
        Ok(())
    }

    /// Append `edge` to every state, with loop entry/exit markers derived
    /// from the difference of the endpoint loop nests.
    fn follow_edge(&mut self, mut states: States, edge: &Edge, source: &Block) -> States {
        let target = self.program.block(edge.target);
        let common = source
            .loop_nest
            .iter()
            .zip(target.loop_nest.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let conditional = source.is_conditional();

        for s in states.iter_mut() {
            if s.is_bottom() {
                continue;
            }
            // leave inner loops first
            for &h in source.loop_nest[common..].iter().rev() {
                s.path.on_loop_exit(h);
            }
            s.append_edge(edge, conditional);
            for &h in &target.loop_nest[common..] {
                if !edge.back {
                    s.path.on_loop_entry(h);
                }
            }
        }
        states
    }

    /// Loop-exit edges may only propagate once every loop they leave is
    /// resolved; back edges into a resolved loop are dropped.
    fn edge_permitted(&self, edge: &Edge, pass: &CfgPass) -> bool {
        if edge.back {
            return pass.status(edge.target) != LoopStatus::Leave;
        }
        if edge.loop_exit.is_some() {
            let source = self.program.block(edge.source);
            let target = self.program.block(edge.target);
            let exited = source
                .loop_nest
                .iter()
                .filter(|h| !target.loop_nest.contains(h));
            return exited
                .into_iter()
                .all(|&h| pass.status(h) == LoopStatus::Leave);
        }
        true
    }

    /// The edge sits in the domain of path predicates the oracle can
    /// judge: either it returns from a call, or its source is a
    /// conditional whose every enclosing loop is resolved.
    fn in_d_ip(&self, edge: &Edge, source: &Block, pass: &CfgPass) -> bool {
        if source.kind == BlockKind::Call {
            return true;
        }
        if !source.is_conditional() {
            return false;
        }
        source
            .loop_nest
            .iter()
            .all(|&h| pass.status(h) == LoopStatus::Leave)
    }

    fn store(&mut self, pass: &mut CfgPass, edge: &Edge, states: States) {
        pass.edge_states.insert(edge.id, Rc::new(states));
        // even an empty annotation may complete a successor's in-set
        pass.push(edge.target);
    }

    // ── Loop headers ───────────────────────────────────────────────────

    fn process_loop_header(&mut self, block: &Block, pass: &mut CfgPass) -> Result<()> {
        if !self.ins_ready(block, pass) {
            return Ok(());
        }
        let h = block.id;
        let program = self.program;
        let (back_edges, seq_edges): (Vec<EdgeId>, Vec<EdgeId>) = block
            .ins
            .iter()
            .copied()
            .partition(|&e| program.edge(e).back);

        let mut back_states = self.join(pass, &back_edges);
        back_states.purge_bottom_states();

        // refresh the outer snapshot whenever the sequential edges carry
        // something
        let mut outer = self.join(pass, &seq_edges);
        outer.purge_bottom_states();
        if !outer.is_empty() {
            let merged = outer.merge_into_one(block, &self.ctx, &mut self.dag)?;
            pass.loop_entry.insert(h, merged);
        }

        if back_states.is_empty() {
            // first arrival: seed the identity iterate
            if !pass.loop_entry.contains_key(&h) {
                return Ok(());
            }
            let mut rel = State::initial(&self.ctx, &mut self.dag);
            rel.path = DetailedPath::from_context(block);
            pass.loop_prev.remove(&h);
            return self.transfer_and_propagate(States::from_vec(vec![rel]), block, pass);
        }

        let rel_new = match back_states
            .merge_into_one(block, &self.ctx, &mut self.dag)?
            .into_vec()
            .pop()
        {
            Some(s) => s,
            None => return Ok(()),
        };

        let iterations = pass.iterations.entry(h).or_insert(0);
        *iterations += 1;
        let exhausted = *iterations > self.ctx.config.max_loop_iterations;
        if exhausted {
            warn!("loop {} exceeded the iteration bound, forcing acceleration", h);
        }

        let stable = pass
            .loop_prev
            .get(&h)
            .map(|prev| rel_new.equiv(prev))
            .unwrap_or(false);

        if !stable && !exhausted {
            // re-iterate from a prepared baseline so the next iterate has
            // a comparable shape
            let status = pass.status(h);
            if status == LoopStatus::Enter {
                pass.loop_status.insert(h, LoopStatus::Fix);
            }
            pass.loop_prev.insert(h, rel_new.clone());
            let mut base = rel_new;
            base.prepare_fixpoint(&self.dag);
            return self.transfer_and_propagate(States::from_vec(vec![base]), block, pass);
        }

        // stable (or forced): widen the iterate and compose it onto the
        // loop-entry snapshot, then run the final pass with the oracle on
        pass.loop_status.insert(h, LoopStatus::Accel);
        let mut widened = rel_new;
        let n = self.dag.iter(h);
        widened.widening(n, &mut self.dag, self.ctx.config.no_widening);
        debug!("loop {} accelerated", h);

        let entry = pass.loop_entry.get(&h).cloned().unwrap_or_default();
        let composed = entry.applied(
            &States::from_vec(vec![widened]),
            ApplyMode::Loop(h),
            &self.ctx,
            &mut self.dag,
        );

        pass.loop_status.insert(h, LoopStatus::Leave);
        for &e in &back_edges {
            pass.edge_states.remove(&e);
        }
        pass.leave_input.insert(h, composed.clone());
        self.transfer_and_propagate(composed, block, pass)
    }

    // ── Calls ──────────────────────────────────────────────────────────

    fn process_call(&mut self, block: &Block, pass: &mut CfgPass) -> Result<()> {
        if !self.ins_ready(block, pass) {
            return Ok(());
        }
        let callee = match block.callee {
            Some(c) => c,
            None => {
                warn!("call block {} without callee, treating as identity", block.id);
                let inputs = self.join_for(block, pass)?;
                return self.propagate(inputs, block, pass);
            }
        };
        let inputs = self.join_for(block, pass)?;
        if inputs.is_empty() {
            return Ok(());
        }
        let summary = self.summary_of(callee)?;
        let mut composed = inputs.applied(
            &summary,
            ApplyMode::Call(block.id),
            &self.ctx,
            &mut self.dag,
        );
        if self.ctx.config.merge_after_apply
            && composed.len() > self.ctx.config.state_size_limit
        {
            composed = composed.merge_into_one(block, &self.ctx, &mut self.dag)?;
        }
        self.propagate(composed, block, pass)
    }

    /// Callee exit summary from an identity entry state, memoized per
    /// CFG. Recursive chains are not supported and degrade to a summary
    /// that forgets everything.
    fn summary_of(&mut self, callee: CfgId) -> Result<Rc<States>> {
        if let Some(s) = self.summaries.get(&callee) {
            return Ok(Rc::clone(s));
        }
        if self.in_progress.contains(&callee) {
            warn!("recursive call into {}, degrading its summary to Top", callee);
            let mut degraded = State::initial(&self.ctx, &mut self.dag);
            let top = self.dag.top();
            for r in 0..self.ctx.platform.registers as i32 {
                if r != self.ctx.platform.sp {
                    degraded.lvars.set(r, top, Default::default());
                }
            }
            degraded.mem.wipe(self.program.cfg(callee).entry, 0);
            return Ok(Rc::new(States::from_vec(vec![degraded])));
        }

        self.in_progress.insert(callee);
        let mut entry = States::new();
        entry.push(State::initial(&self.ctx, &mut self.dag));
        let summary = self.analyze_cfg(callee, entry)?;
        self.in_progress.remove(&callee);
        let summary = Rc::new(summary);
        self.summaries.insert(callee, Rc::clone(&summary));
        Ok(summary)
    }
}
