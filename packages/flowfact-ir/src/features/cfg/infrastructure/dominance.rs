//! Dominance Query Service
//!
//! The post-processor consults dominance and post-dominance between CFG
//! *edges*. Dominator computation itself is delegated to petgraph over an
//! edge-split view of each CFG (every edge becomes a node between its
//! endpoints), so edge-to-edge queries reduce to node dominance.

use crate::features::cfg::domain::Program;
use crate::shared::EdgeId;
use petgraph::algo::dominators::{simple_fast, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

/// Read-only dominance oracle over CFG edges.
pub trait GlobalDominance {
    /// Every path from the program entry to `b` traverses `a`.
    fn dominates(&self, a: EdgeId, b: EdgeId) -> bool;

    /// Every path from `b` to the function exit traverses `a`.
    fn postdominates(&self, a: EdgeId, b: EdgeId) -> bool;
}

struct CfgDomData {
    edge_nodes: FxHashMap<EdgeId, NodeIndex>,
    dom: Dominators<NodeIndex>,
    postdom: Dominators<NodeIndex>,
}

/// Petgraph-backed implementation, one dominator tree pair per CFG.
/// Edges of different CFGs are never comparable and answer `false`.
pub struct EdgeDominance {
    per_cfg: Vec<CfgDomData>,
    cfg_of_edge: FxHashMap<EdgeId, usize>,
}

impl EdgeDominance {
    pub fn from_program(program: &Program) -> Self {
        let mut per_cfg = Vec::with_capacity(program.cfgs.len());
        let mut cfg_of_edge = FxHashMap::default();

        for (ci, cfg) in program.cfgs.iter().enumerate() {
            let mut fwd: DiGraph<(), ()> = DiGraph::new();
            let mut rev: DiGraph<(), ()> = DiGraph::new();
            let mut fwd_blocks = FxHashMap::default();
            let mut rev_blocks = FxHashMap::default();
            for &b in &cfg.blocks {
                fwd_blocks.insert(b, fwd.add_node(()));
                rev_blocks.insert(b, rev.add_node(()));
            }

            let mut edge_nodes = FxHashMap::default();
            let mut rev_edge_nodes = FxHashMap::default();
            for edge in &program.edges {
                if program.block(edge.source).cfg != cfg.id {
                    continue;
                }
                let fnode = fwd.add_node(());
                fwd.add_edge(fwd_blocks[&edge.source], fnode, ());
                fwd.add_edge(fnode, fwd_blocks[&edge.target], ());

                let rnode = rev.add_node(());
                rev.add_edge(rev_blocks[&edge.target], rnode, ());
                rev.add_edge(rnode, rev_blocks[&edge.source], ());

                edge_nodes.insert(edge.id, fnode);
                rev_edge_nodes.insert(edge.id, rnode);
                cfg_of_edge.insert(edge.id, ci);
            }

            let dom = simple_fast(&fwd, fwd_blocks[&cfg.entry]);
            let postdom = simple_fast(&rev, rev_blocks[&cfg.exit]);

            // the two graphs allocate nodes in the same order, so the
            // forward edge node indexes the post-dominator tree as well
            debug_assert!(edge_nodes
                .iter()
                .all(|(e, n)| rev_edge_nodes[e].index() == n.index()));

            per_cfg.push(CfgDomData { edge_nodes, dom, postdom });
        }

        Self { per_cfg, cfg_of_edge }
    }

    fn node_dominates(dom: &Dominators<NodeIndex>, a: NodeIndex, b: NodeIndex) -> bool {
        match dom.dominators(b) {
            Some(mut chain) => chain.any(|d| d == a),
            None => false, // b unreachable from the root
        }
    }
}

impl GlobalDominance for EdgeDominance {
    fn dominates(&self, a: EdgeId, b: EdgeId) -> bool {
        let (Some(&ca), Some(&cb)) = (self.cfg_of_edge.get(&a), self.cfg_of_edge.get(&b)) else {
            return false;
        };
        if ca != cb {
            return false;
        }
        let data = &self.per_cfg[ca];
        Self::node_dominates(&data.dom, data.edge_nodes[&a], data.edge_nodes[&b])
    }

    fn postdominates(&self, a: EdgeId, b: EdgeId) -> bool {
        let (Some(&ca), Some(&cb)) = (self.cfg_of_edge.get(&a), self.cfg_of_edge.get(&b)) else {
            return false;
        };
        if ca != cb {
            return false;
        }
        let data = &self.per_cfg[ca];
        Self::node_dominates(&data.postdom, data.edge_nodes[&a], data.edge_nodes[&b])
    }
}
