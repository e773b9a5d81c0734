//! Detailed Paths
//!
//! Ordered sequence of flow events accumulated along an abstract state:
//! edges traversed, loop entries/exits, calls and returns. Call/Return and
//! LoopEntry/LoopExit nest as a well-formed bracket structure; the
//! self-normalization collapses empty bracket pairs and strips trailing
//! calls that never returned, and is idempotent.

use crate::features::cfg::domain::Block;
use crate::shared::{BlockId, EdgeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One flow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowInfo {
    Edge(EdgeId),
    LoopEntry(BlockId),
    LoopExit(BlockId),
    Call(BlockId),
    Return(BlockId),
}

impl FlowInfo {
    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            FlowInfo::Edge(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for FlowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowInfo::Edge(e) => write!(f, "{}", e),
            FlowInfo::LoopEntry(h) => write!(f, "LEn({})", h),
            FlowInfo::LoopExit(h) => write!(f, "LEx({})", h),
            FlowInfo::Call(b) => write!(f, "C({})", b),
            FlowInfo::Return(b) => write!(f, "R({})", b),
        }
    }
}

/// Ordered flow-event sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedPath {
    items: Vec<FlowInfo>,
}

impl DetailedPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<FlowInfo>) -> Self {
        Self { items }
    }

    /// Bracket context of a block: one LoopEntry per enclosing header,
    /// outermost first. Used when a merge discards the member paths.
    pub fn from_context(block: &Block) -> Self {
        Self {
            items: block.loop_nest.iter().map(|&h| FlowInfo::LoopEntry(h)).collect(),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[FlowInfo] {
        &self.items
    }

    pub fn push(&mut self, fi: FlowInfo) {
        self.items.push(fi);
    }

    pub fn add_edge(&mut self, e: EdgeId) {
        self.items.push(FlowInfo::Edge(e));
    }

    pub fn on_loop_entry(&mut self, header: BlockId) {
        self.items.push(FlowInfo::LoopEntry(header));
    }

    pub fn on_loop_exit(&mut self, header: BlockId) {
        self.items.push(FlowInfo::LoopExit(header));
    }

    pub fn on_call(&mut self, call_block: BlockId) {
        self.items.push(FlowInfo::Call(call_block));
    }

    pub fn on_return(&mut self, call_block: BlockId) {
        self.items.push(FlowInfo::Return(call_block));
    }

    /// Append a callee's (already accumulated) path between Call/Return
    /// markers; the composition step of function application.
    pub fn apply(&mut self, callee: &DetailedPath, call_block: BlockId) {
        self.on_call(call_block);
        let mut inner = callee.clone();
        inner.normalize();
        self.items.extend(inner.items);
        self.on_return(call_block);
    }

    // ── Edge views ─────────────────────────────────────────────────────

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.items.iter().filter_map(FlowInfo::as_edge)
    }

    pub fn edge_set(&self) -> BTreeSet<EdgeId> {
        self.edges().collect()
    }

    pub fn first_edge(&self) -> Option<EdgeId> {
        self.edges().next()
    }

    pub fn last_edge(&self) -> Option<EdgeId> {
        self.items.iter().rev().find_map(FlowInfo::as_edge)
    }

    pub fn count_edges(&self) -> usize {
        self.edges().count()
    }

    pub fn contains_edge(&self, e: EdgeId) -> bool {
        self.edges().any(|x| x == e)
    }

    pub fn contains_all_edges(&self, edges: &BTreeSet<EdgeId>) -> bool {
        let own = self.edge_set();
        edges.iter().all(|e| own.contains(e))
    }

    /// Keep only the edges in `keep` (markers survive); used when a
    /// minimized edge set is reordered along its witness path.
    pub fn retain_edges(&self, keep: &BTreeSet<EdgeId>) -> DetailedPath {
        let items = self
            .items
            .iter()
            .filter(|fi| match fi {
                FlowInfo::Edge(e) => keep.contains(e),
                _ => true,
            })
            .copied()
            .collect();
        let mut path = DetailedPath { items };
        path.normalize();
        path
    }

    // ── Normalization ──────────────────────────────────────────────────

    /// Self-normalization: collapse adjacent Call(x)/Return(x) and
    /// LoopEntry(h)/LoopExit(h) pairs, drop adjacent duplicate markers,
    /// and remove trailing calls with no matching return. Idempotent.
    pub fn normalize(&mut self) {
        loop {
            let before = self.items.len();
            self.collapse_adjacent();
            self.strip_unreturned_calls();
            if self.items.len() == before {
                break;
            }
        }
    }

    fn collapse_adjacent(&mut self) {
        let mut out: Vec<FlowInfo> = Vec::with_capacity(self.items.len());
        for &fi in &self.items {
            match (out.last().copied(), fi) {
                (Some(FlowInfo::Call(x)), FlowInfo::Return(y)) if x == y => {
                    out.pop();
                }
                (Some(FlowInfo::LoopEntry(h)), FlowInfo::LoopExit(g)) if h == g => {
                    out.pop();
                }
                (Some(prev), _) if prev == fi && !matches!(fi, FlowInfo::Edge(_)) => {
                    // duplicate marker
                }
                _ => out.push(fi),
            }
        }
        self.items = out;
    }

    fn strip_unreturned_calls(&mut self) {
        // a Call is "trailing" when no matching Return follows it
        loop {
            let mut removed = false;
            for i in (0..self.items.len()).rev() {
                if let FlowInfo::Call(b) = self.items[i] {
                    let has_return = self.items[i + 1..]
                        .iter()
                        .any(|fi| matches!(fi, FlowInfo::Return(r) if *r == b));
                    if !has_return {
                        self.items.remove(i);
                        removed = true;
                        break;
                    }
                }
            }
            if !removed {
                break;
            }
        }
    }

    /// Call/Return and LoopEntry/LoopExit nest as balanced brackets.
    pub fn is_well_bracketed(&self) -> bool {
        let mut stack: Vec<FlowInfo> = Vec::new();
        for &fi in &self.items {
            match fi {
                FlowInfo::Call(_) | FlowInfo::LoopEntry(_) => stack.push(fi),
                FlowInfo::Return(b) => match stack.pop() {
                    Some(FlowInfo::Call(c)) if c == b => {}
                    _ => return false,
                },
                FlowInfo::LoopExit(h) => match stack.pop() {
                    Some(FlowInfo::LoopEntry(g)) if g == h => {}
                    _ => return false,
                },
                FlowInfo::Edge(_) => {}
            }
        }
        // open loop brackets are fine (the path may still be inside the
        // loop); an open Call is not, normalization strips it
        stack.iter().all(|fi| matches!(fi, FlowInfo::LoopEntry(_)))
    }
}

impl fmt::Display for DetailedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, fi) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", fi)?;
        }
        write!(f, "]")
    }
}
