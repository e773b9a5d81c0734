//! Infeasible-Path Post-Processing
//!
//! Shortens each collected path with dominance information: an edge whose
//! traversal is already implied by its neighbour adds nothing to the
//! infeasibility witness and is dropped. For adjacent edges (a, b) in
//! path order:
//!
//! - `a` dominates `b` ⇒ every execution reaching `b` has traversed `a`,
//!   so `a` is redundant;
//! - `b` post-dominates `a` ⇒ every execution past `a` will traverse `b`,
//!   so `b` is redundant.
//!
//! Each path is reduced to a fixpoint, trailing call fragments are
//! stripped by normalization, and duplicate paths collapse. The pass is
//! idempotent and only ever removes edges.

use crate::features::cfg::infrastructure::dominance::GlobalDominance;
use crate::features::state::domain::{DetailedPath, FlowInfo};

/// Simplify one path to its dominance fixpoint.
pub fn simplify_path(path: &DetailedPath, dom: &dyn GlobalDominance) -> DetailedPath {
    let mut items: Vec<FlowInfo> = path.items().to_vec();
    loop {
        let edge_positions: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, fi)| matches!(fi, FlowInfo::Edge(_)))
            .map(|(i, _)| i)
            .collect();

        let mut to_remove = None;
        for w in edge_positions.windows(2) {
            let (i, j) = (w[0], w[1]);
            let (Some(a), Some(b)) = (items[i].as_edge(), items[j].as_edge()) else {
                continue;
            };
            if dom.dominates(a, b) {
                to_remove = Some(i);
                break;
            }
            if dom.postdominates(b, a) {
                to_remove = Some(j);
                break;
            }
        }
        match to_remove {
            Some(i) => {
                items.remove(i);
            }
            None => break,
        }
    }
    let mut out = DetailedPath::from_items(items);
    out.normalize();
    out
}

/// Simplify a result vector and collapse duplicates.
pub fn simplify_paths(paths: Vec<DetailedPath>, dom: &dyn GlobalDominance) -> Vec<DetailedPath> {
    let mut out: Vec<DetailedPath> = Vec::with_capacity(paths.len());
    for p in &paths {
        let simplified = simplify_path(p, dom);
        if simplified.count_edges() == 0 {
            // a path with no edges constrains nothing
            continue;
        }
        if !out.contains(&simplified) {
            out.push(simplified);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::EdgeId;
    use rustc_hash::FxHashSet;

    /// Table-driven dominance stub.
    #[derive(Default)]
    struct TableDominance {
        dom: FxHashSet<(EdgeId, EdgeId)>,
        postdom: FxHashSet<(EdgeId, EdgeId)>,
    }

    impl GlobalDominance for TableDominance {
        fn dominates(&self, a: EdgeId, b: EdgeId) -> bool {
            self.dom.contains(&(a, b))
        }

        fn postdominates(&self, a: EdgeId, b: EdgeId) -> bool {
            self.postdom.contains(&(a, b))
        }
    }

    fn path_of(edges: &[u32]) -> DetailedPath {
        let mut p = DetailedPath::new();
        for &e in edges {
            p.add_edge(EdgeId(e));
        }
        p
    }

    #[test]
    fn test_dominating_edge_is_removed() {
        // e2 dominates e3: traversing e3 implies e2, so e2 goes
        let mut dom = TableDominance::default();
        dom.dom.insert((EdgeId(2), EdgeId(3)));

        let p = path_of(&[1, 2, 3]);
        let out = simplify_path(&p, &dom);
        assert_eq!(out.edges().collect::<Vec<_>>(), vec![EdgeId(1), EdgeId(3)]);
    }

    #[test]
    fn test_postdominated_predecessor_removes_successor() {
        // e2 post-dominates e1: past e1, e2 is inevitable, so e2 goes
        let mut dom = TableDominance::default();
        dom.postdom.insert((EdgeId(2), EdgeId(1)));

        let p = path_of(&[1, 2]);
        let out = simplify_path(&p, &dom);
        assert_eq!(out.edges().collect::<Vec<_>>(), vec![EdgeId(1)]);
    }

    #[test]
    fn test_cascading_removal_reaches_fixpoint() {
        // e1 dominates e2 and (after e1's removal... it stays) e2
        // dominates e3: both early edges drop, only e3 remains
        let mut dom = TableDominance::default();
        dom.dom.insert((EdgeId(1), EdgeId(2)));
        dom.dom.insert((EdgeId(2), EdgeId(3)));

        let p = path_of(&[1, 2, 3]);
        let out = simplify_path(&p, &dom);
        assert_eq!(out.edges().collect::<Vec<_>>(), vec![EdgeId(3)]);
    }

    #[test]
    fn test_simplification_is_idempotent() {
        let mut dom = TableDominance::default();
        dom.dom.insert((EdgeId(1), EdgeId(2)));
        dom.postdom.insert((EdgeId(3), EdgeId(2)));

        let p = path_of(&[1, 2, 3]);
        let once = simplify_path(&p, &dom);
        let twice = simplify_path(&once, &dom);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_edges_only_shrink() {
        let dom = TableDominance::default();
        let p = path_of(&[4, 5, 6]);
        let out = simplify_path(&p, &dom);
        assert_eq!(out, p);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut dom = TableDominance::default();
        dom.dom.insert((EdgeId(1), EdgeId(2)));

        let a = path_of(&[1, 2]);
        let b = path_of(&[2]);
        let out = simplify_paths(vec![a, b], &dom);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].edges().collect::<Vec<_>>(), vec![EdgeId(2)]);
    }
}
