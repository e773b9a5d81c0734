//! Local Variable Store
//!
//! Fixed-length mapping from register/temporary index to its symbolic
//! value, SSA-like along one path. `None` means identity: the variable
//! still holds its function-entry value. Temporaries occupy the upper half
//! of the array and are reset on every edge (they are block-local).
//!
//! Every bound slot carries the label edges under which the binding was
//! established; predicates built by substituting a slot inherit those
//! labels, which is what ties a later contradiction back to the earlier
//! branch that created the value.

use crate::features::expression::domain::ExprId;
use crate::features::expression::infrastructure::Dag;
use crate::shared::{is_tempvar, EdgeId, VarId};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct LocalVariables {
    registers: u16,
    tempvars: u16,
    slots: Vec<Option<ExprId>>,
    labels: Vec<BTreeSet<EdgeId>>,
    /// Slots written since the last edge append; they receive the next
    /// edge as a label.
    updated: BTreeSet<usize>,
}

impl LocalVariables {
    pub fn new(registers: u16, tempvars: u16) -> Self {
        let len = registers as usize + tempvars as usize;
        Self {
            registers,
            tempvars,
            slots: vec![None; len],
            labels: vec![BTreeSet::new(); len],
            updated: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn index(&self, v: VarId) -> usize {
        if is_tempvar(v) {
            self.registers as usize + (-(v) - 1) as usize
        } else {
            v as usize
        }
    }

    /// Variable id of a raw slot index (widening iterates slots).
    pub fn id_at(&self, index: usize) -> VarId {
        if index < self.registers as usize {
            index as VarId
        } else {
            -((index - self.registers as usize) as VarId + 1)
        }
    }

    /// Bound value, or `None` for identity.
    pub fn get(&self, v: VarId) -> Option<ExprId> {
        self.slots[self.index(v)]
    }

    pub fn is_identity(&self, v: VarId) -> bool {
        self.get(v).is_none()
    }

    /// Current symbolic value; identity slots materialize their entry
    /// variable in the DAG.
    pub fn value(&self, dag: &mut Dag, v: VarId) -> ExprId {
        match self.get(v) {
            Some(e) => e,
            None => dag.var(v),
        }
    }

    /// Labels of the binding (empty for identity slots).
    pub fn labels_of(&self, v: VarId) -> &BTreeSet<EdgeId> {
        &self.labels[self.index(v)]
    }

    /// Bind `v`, recording the labels carried in by the defining operands.
    pub fn set(&mut self, v: VarId, value: ExprId, labels: BTreeSet<EdgeId>) {
        let i = self.index(v);
        self.slots[i] = Some(value);
        self.labels[i] = labels;
        self.updated.insert(i);
    }

    /// Forget the binding of `v` (back to identity).
    pub fn forget(&mut self, v: VarId) {
        let i = self.index(v);
        self.slots[i] = None;
        self.labels[i].clear();
        self.updated.remove(&i);
    }

    /// Edge-append callback: label every slot updated since the previous
    /// edge, then reset all temporaries to identity.
    pub fn on_edge(&mut self, e: EdgeId) {
        for &i in &self.updated {
            self.labels[i].insert(e);
        }
        self.updated.clear();
        for i in self.registers as usize..self.slots.len() {
            self.slots[i] = None;
            self.labels[i].clear();
        }
    }

    /// Pointwise join: disagreeing slots are forgotten (identity, i.e.
    /// treated as unconstrained downstream); agreeing slots keep the value
    /// with the labels both sides guarantee.
    pub fn merge(&mut self, other: &LocalVariables) {
        debug_assert_eq!(self.slots.len(), other.slots.len());
        for i in 0..self.slots.len() {
            match (self.slots[i], other.slots[i]) {
                (Some(a), Some(b)) if a == b => {
                    let common: BTreeSet<EdgeId> =
                        self.labels[i].intersection(&other.labels[i]).copied().collect();
                    self.labels[i] = common;
                }
                (None, None) => {}
                _ => {
                    self.slots[i] = None;
                    self.labels[i].clear();
                }
            }
        }
        self.updated.clear();
    }

    /// Value-only equality (labels ignored); the fixpoint test.
    pub fn values_equal(&self, other: &LocalVariables) -> bool {
        self.slots == other.slots
    }

    /// Bound slots, as (variable id, value) pairs.
    pub fn bound(&self) -> impl Iterator<Item = (VarId, ExprId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|e| (self.id_at(i), e)))
    }

    /// Erase every label set (loop-invariant bindings after widening).
    pub fn clear_labels(&mut self) {
        for l in &mut self.labels {
            l.clear();
        }
        self.updated.clear();
    }

    pub fn registers(&self) -> u16 {
        self.registers
    }

    pub fn tempvars(&self) -> u16 {
        self.tempvars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_index_mapping_roundtrip() {
        let lv = LocalVariables::new(16, 8);
        for v in [-8, -1, 0, 15] {
            let i = lv.index(v);
            assert_eq!(lv.id_at(i), v);
        }
    }

    #[test]
    fn test_temps_reset_on_edge() {
        let mut dag = Dag::new();
        let mut lv = LocalVariables::new(4, 4);
        let k = dag.cst_abs(7);
        lv.set(-1, k, BTreeSet::new());
        lv.set(2, k, BTreeSet::new());
        lv.on_edge(EdgeId(0));

        // temp locality: every temp is identity after an edge
        for t in [-1, -2, -3, -4] {
            assert!(lv.is_identity(t));
        }
        assert_eq!(lv.get(2), Some(k));
    }

    #[test]
    fn test_updated_slots_are_labelled_by_the_next_edge() {
        let mut dag = Dag::new();
        let mut lv = LocalVariables::new(4, 0);
        let k = dag.cst_abs(1);
        lv.set(0, k, BTreeSet::new());
        lv.on_edge(EdgeId(5));
        assert!(lv.labels_of(0).contains(&EdgeId(5)));

        // a later edge does not re-label an untouched slot
        lv.on_edge(EdgeId(6));
        assert!(!lv.labels_of(0).contains(&EdgeId(6)));
    }

    #[test]
    fn test_merge_forgets_disagreements() {
        let mut dag = Dag::new();
        let mut a = LocalVariables::new(4, 0);
        let mut b = LocalVariables::new(4, 0);
        let one = dag.cst_abs(1);
        let two = dag.cst_abs(2);

        a.set(0, one, BTreeSet::new());
        b.set(0, two, BTreeSet::new());
        a.set(1, one, [EdgeId(1), EdgeId(2)].into_iter().collect());
        b.set(1, one, [EdgeId(2), EdgeId(3)].into_iter().collect());

        a.merge(&b);
        assert!(a.is_identity(0));
        assert_eq!(a.get(1), Some(one));
        assert_eq!(a.labels_of(1).iter().copied().collect::<Vec<_>>(), vec![EdgeId(2)]);
    }
}
