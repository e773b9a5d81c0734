//! Program Builder
//!
//! Assembles [`Program`] instances and derives the redundant structure the
//! analysis relies on (in/out edge lists, loop nests). CFG construction
//! itself (loader, decoder) is an external concern; the builder is the
//! seam those collaborators and the test suites go through.

use crate::errors::{FlowfactError, Result};
use crate::features::cfg::domain::{Block, BlockKind, Cfg, Edge, Program, SemInst};
use crate::shared::{BlockId, CfgId, EdgeId};

/// Incremental [`Program`] assembly.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    cfgs: Vec<Cfg>,
    blocks: Vec<Block>,
    edges: Vec<Edge>,
    entry: Option<CfgId>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new function; its entry and exit pseudo-blocks are created
    /// immediately.
    pub fn add_cfg(&mut self, name: impl Into<String>) -> CfgId {
        let id = CfgId(self.cfgs.len() as u32);
        let entry = self.push_block(id, BlockKind::Entry, Vec::new(), None);
        let exit = self.push_block(id, BlockKind::Exit, Vec::new(), None);
        self.cfgs.push(Cfg {
            id,
            name: name.into(),
            entry,
            exit,
            blocks: vec![entry, exit],
        });
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    /// Mark `cfg` as the program entry point (defaults to the first CFG).
    pub fn set_entry(&mut self, cfg: CfgId) {
        self.entry = Some(cfg);
    }

    pub fn entry_of(&self, cfg: CfgId) -> BlockId {
        self.cfgs[cfg.0 as usize].entry
    }

    pub fn exit_of(&self, cfg: CfgId) -> BlockId {
        self.cfgs[cfg.0 as usize].exit
    }

    /// Basic block with its semantic-instruction stream.
    pub fn add_block(&mut self, cfg: CfgId, insts: Vec<SemInst>) -> BlockId {
        let id = self.push_block(cfg, BlockKind::Basic, insts, None);
        self.cfgs[cfg.0 as usize].blocks.push(id);
        id
    }

    /// Synthetic call block.
    pub fn add_call_block(&mut self, cfg: CfgId, callee: CfgId) -> BlockId {
        let id = self.push_block(cfg, BlockKind::Call, Vec::new(), Some(callee));
        self.cfgs[cfg.0 as usize].blocks.push(id);
        id
    }

    fn push_block(
        &mut self,
        cfg: CfgId,
        kind: BlockKind,
        insts: Vec<SemInst>,
        callee: Option<CfgId>,
    ) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            cfg,
            kind,
            insts,
            callee,
            is_loop_header: false,
            loop_nest: Vec::new(),
            ins: Vec::new(),
            outs: Vec::new(),
        });
        id
    }

    /// Plain edge.
    pub fn add_edge(&mut self, source: BlockId, target: BlockId) -> EdgeId {
        self.push_edge(source, target, false, false, None)
    }

    /// Taken side of a conditional source block.
    pub fn add_taken_edge(&mut self, source: BlockId, target: BlockId) -> EdgeId {
        self.push_edge(source, target, true, false, None)
    }

    /// Back edge of the loop headed by `target`.
    pub fn add_back_edge(&mut self, source: BlockId, target: BlockId) -> EdgeId {
        self.push_edge(source, target, false, true, None)
    }

    /// Edge leaving the loop(s) up to and including `header`.
    pub fn add_loop_exit_edge(
        &mut self,
        source: BlockId,
        target: BlockId,
        header: BlockId,
        taken: bool,
    ) -> EdgeId {
        self.push_edge(source, target, taken, false, Some(header))
    }

    fn push_edge(
        &mut self,
        source: BlockId,
        target: BlockId,
        taken: bool,
        back: bool,
        loop_exit: Option<BlockId>,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { id, source, target, taken, back, loop_exit });
        self.blocks[source.0 as usize].outs.push(id);
        self.blocks[target.0 as usize].ins.push(id);
        id
    }

    /// Declare a natural loop: `header` plus the blocks of its body.
    /// Outer loops must be declared before the loops they contain, so the
    /// nest vectors end up outermost-first.
    pub fn mark_loop(&mut self, header: BlockId, body: &[BlockId]) {
        self.blocks[header.0 as usize].is_loop_header = true;
        self.blocks[header.0 as usize].loop_nest.push(header);
        for &b in body {
            if b != header {
                self.blocks[b.0 as usize].loop_nest.push(header);
            }
        }
    }

    pub fn build(self) -> Result<Program> {
        let entry = self
            .entry
            .ok_or_else(|| FlowfactError::Cfg("program has no entry CFG".into()))?;
        for e in &self.edges {
            let (s, t) = (&self.blocks[e.source.0 as usize], &self.blocks[e.target.0 as usize]);
            if s.cfg != t.cfg {
                return Err(FlowfactError::Cfg(format!(
                    "edge {} crosses CFG boundaries ({} -> {})",
                    e.id, s.cfg, t.cfg
                )));
            }
        }
        for b in &self.blocks {
            if b.kind == BlockKind::Call && b.callee.is_none() {
                return Err(FlowfactError::Cfg(format!("call block {} has no callee", b.id)));
            }
        }
        Ok(Program {
            cfgs: self.cfgs,
            blocks: self.blocks,
            edges: self.edges,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_wires_edge_lists() {
        let mut b = ProgramBuilder::new();
        let f = b.add_cfg("main");
        let entry = b.entry_of(f);
        let exit = b.exit_of(f);
        let bb = b.add_block(f, Vec::new());
        let e1 = b.add_edge(entry, bb);
        let e2 = b.add_edge(bb, exit);
        let p = b.build().unwrap();

        assert_eq!(p.block(bb).ins, vec![e1]);
        assert_eq!(p.block(bb).outs, vec![e2]);
        assert!(!p.block(bb).is_conditional());
    }

    #[test]
    fn test_loop_nest_is_outermost_first() {
        let mut b = ProgramBuilder::new();
        let f = b.add_cfg("main");
        let outer = b.add_block(f, Vec::new());
        let inner = b.add_block(f, Vec::new());
        let body = b.add_block(f, Vec::new());
        b.mark_loop(outer, &[inner, body]);
        b.mark_loop(inner, &[body]);
        let p = b.build().unwrap();

        assert_eq!(p.block(body).loop_nest, vec![outer, inner]);
        assert_eq!(p.block(inner).loop_nest, vec![outer, inner]);
        assert!(p.block(inner).is_loop_header);
    }

    #[test]
    fn test_cross_cfg_edge_is_rejected() {
        let mut b = ProgramBuilder::new();
        let f = b.add_cfg("f");
        let g = b.add_cfg("g");
        let bf = b.add_block(f, Vec::new());
        let bg = b.add_block(g, Vec::new());
        b.add_edge(bf, bg);
        assert!(b.build().is_err());
    }
}
