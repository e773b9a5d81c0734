//! Memory Store
//!
//! Sparse map from constant address (stack-relative or absolute) to
//! symbolic cell content. The map is tagged with a [`MemId`], the program
//! point of the last full invalidation ("wipe"), and a wipe generation
//! counter; cells materialized by reads embed the generation into their
//! `Mem` atom so that knowledge from before a wipe can never alias with
//! reads after it.

use crate::features::expression::domain::{Constant, ExprId};
use crate::features::expression::infrastructure::Dag;
use crate::shared::{BlockId, EdgeId};
use std::collections::{BTreeMap, BTreeSet};

/// Program point of the last wipe; `block == None` means never wiped.
/// Two memory maps may only be joined or composed when their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemId {
    pub block: Option<BlockId>,
    pub index: u32,
}

impl MemId {
    pub fn at(block: BlockId, index: u32) -> Self {
        Self { block: Some(block), index }
    }

    pub fn pristine() -> Self {
        Self::default()
    }

    pub fn was_wiped(&self) -> bool {
        self.block.is_some()
    }
}

/// One mapped cell: its symbolic content plus the edges under which the
/// binding was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemCell {
    pub value: ExprId,
    pub labels: BTreeSet<EdgeId>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    cells: BTreeMap<Constant, MemCell>,
    memid: MemId,
    generation: u32,
    updated: BTreeSet<Constant>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memid(&self) -> MemId {
        self.memid
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn read(&self, addr: &Constant) -> Option<&MemCell> {
        self.cells.get(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Constant, &MemCell)> {
        self.cells.iter()
    }

    /// Read an unmapped cell: bind it to a fresh generation-tagged `Mem`
    /// atom so later reads (before any wipe) observe the same value.
    pub fn materialize(&mut self, dag: &mut Dag, addr: Constant) -> ExprId {
        let atom = dag.mem(addr, self.generation);
        self.cells
            .entry(addr)
            .or_insert_with(|| MemCell { value: atom, labels: BTreeSet::new() })
            .value
    }

    pub fn write(&mut self, addr: Constant, value: ExprId, labels: BTreeSet<EdgeId>) {
        self.cells.insert(addr, MemCell { value, labels });
        self.updated.insert(addr);
    }

    /// Full invalidation: a store went through an address the analysis
    /// cannot resolve to a constant.
    pub fn wipe(&mut self, block: BlockId, index: u32) {
        self.cells.clear();
        self.updated.clear();
        self.generation += 1;
        self.memid = MemId::at(block, index);
    }

    /// Edge-append callback: label cells written since the previous edge.
    pub fn on_edge(&mut self, e: EdgeId) {
        for addr in &self.updated {
            if let Some(cell) = self.cells.get_mut(addr) {
                cell.labels.insert(e);
            }
        }
        self.updated.clear();
    }

    /// Pointwise join against `other` (same [`MemId`] checked by the
    /// caller): cells disagreeing in either direction degrade to Top, as
    /// do cells present on one side only.
    pub fn pointwise_merge(&mut self, other: &MemoryMap, dag: &mut Dag) {
        let top = dag.top();
        let addrs: BTreeSet<Constant> = self
            .cells
            .keys()
            .chain(other.cells.keys())
            .copied()
            .collect();
        for addr in addrs {
            let same = match (self.cells.get(&addr), other.cells.get(&addr)) {
                (Some(a), Some(b)) if a.value == b.value => true,
                _ => false,
            };
            if !same {
                self.cells.insert(addr, MemCell { value: top, labels: BTreeSet::new() });
            } else if let Some(cell) = self.cells.get_mut(&addr) {
                cell.labels.clear();
            }
        }
        self.updated.clear();
        self.generation = self.generation.max(other.generation);
    }

    /// Drop every cell whose content is not a plain constant (fixpoint
    /// preparation and widening use this as the conservative rule).
    pub fn retain_constants(&mut self, dag: &Dag) {
        self.cells.retain(|_, cell| dag.is_const(cell.value));
        self.updated.clear();
    }

    /// Drop Top-valued cells.
    pub fn drop_tops(&mut self, dag: &Dag) {
        self.cells.retain(|_, cell| !dag.is_top(cell.value));
    }

    pub fn clear_labels(&mut self) {
        for cell in self.cells.values_mut() {
            cell.labels.clear();
        }
        self.updated.clear();
    }

    /// Value-only equality (labels, updated set and memid ignored).
    pub fn values_equal(&self, other: &MemoryMap) -> bool {
        self.cells.len() == other.cells.len()
            && self
                .cells
                .iter()
                .all(|(k, c)| other.cells.get(k).map(|o| o.value) == Some(c.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialized_reads_are_stable_within_a_generation() {
        let mut dag = Dag::new();
        let mut mem = MemoryMap::new();
        let addr = Constant::rel(4);
        let a = mem.materialize(&mut dag, addr);
        let b = mem.materialize(&mut dag, addr);
        assert_eq!(a, b);
    }

    #[test]
    fn test_wipe_changes_the_generation() {
        let mut dag = Dag::new();
        let mut mem = MemoryMap::new();
        let addr = Constant::rel(4);
        let before = mem.materialize(&mut dag, addr);

        mem.wipe(BlockId(3), 2);
        assert!(mem.memid().was_wiped());
        assert!(mem.read(&addr).is_none());

        let after = mem.materialize(&mut dag, addr);
        assert_ne!(before, after);
    }

    #[test]
    fn test_pointwise_merge_tops_disagreements() {
        let mut dag = Dag::new();
        let mut a = MemoryMap::new();
        let mut b = MemoryMap::new();
        let one = dag.cst_abs(1);
        let two = dag.cst_abs(2);
        let k0 = Constant::rel(0);
        let k4 = Constant::rel(4);
        let k8 = Constant::rel(8);

        a.write(k0, one, BTreeSet::new());
        b.write(k0, one, BTreeSet::new());
        a.write(k4, one, BTreeSet::new());
        b.write(k4, two, BTreeSet::new());
        a.write(k8, one, BTreeSet::new());

        a.pointwise_merge(&b, &mut dag);
        assert_eq!(a.read(&k0).unwrap().value, one);
        assert!(dag.is_top(a.read(&k4).unwrap().value));
        assert!(dag.is_top(a.read(&k8).unwrap().value)); // present on one side only
    }
}
