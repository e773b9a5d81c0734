//! Built-in Linear Arithmetic Backend
//!
//! Decides conjunctions of integer linear constraints:
//!
//! 1. Predicates flatten to `Σ coeff·atom + k  {=, ≤, ≠}  0` through the
//!    expression linearizer; strict `<` tightens to `≤ −1` (all atoms are
//!    machine integers). Opaque arithmetic participates as uninterpreted
//!    atoms shared by node identity.
//! 2. Equalities are eliminated by exact integer Gaussian pivoting
//!    (inequalities are only ever scaled by positive factors).
//! 3. The remaining `≤` system goes through Fourier–Motzkin elimination.
//! 4. A disequality refutes the system only when both of its strict sides
//!    are separately infeasible.
//!
//! Unsat verdicts are exact for the constraints given; the rational
//! relaxation of step 3 can only err towards Sat, which the oracle treats
//! as "no infeasibility", the safe direction.

use super::{ConstraintSolver, SolverResult};
use crate::features::expression::infrastructure::{linearize, Dag, LinAtom};
use crate::features::state::domain::Predicate;
use crate::features::expression::domain::CmpOp;
use std::collections::BTreeMap;

/// One internal row: `Σ terms + k  (rel)  0` with i128 coefficients so
/// elimination products cannot overflow.
#[derive(Debug, Clone)]
struct Row {
    terms: BTreeMap<LinAtom, i128>,
    k: i128,
}

impl Row {
    fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    fn scaled(&self, f: i128) -> Row {
        Row {
            terms: self.terms.iter().map(|(&a, &c)| (a, c * f)).collect(),
            k: self.k * f,
        }
    }

    fn plus(&self, other: &Row) -> Row {
        let mut out = self.clone();
        out.k += other.k;
        for (&a, &c) in &other.terms {
            let e = out.terms.entry(a).or_insert(0);
            *e += c;
            if *e == 0 {
                out.terms.remove(&a);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feasibility {
    Feasible,
    Infeasible,
    Unknown,
}

/// Linear backend with blow-up guards.
pub struct LinearBackend {
    max_atoms: usize,
    max_rows: usize,
}

impl Default for LinearBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearBackend {
    pub fn new() -> Self {
        Self { max_atoms: 32, max_rows: 4096 }
    }

    /// Flatten one predicate; `None` when it has no linear view.
    fn flatten(dag: &Dag, pred: &Predicate) -> Option<(Row, CmpOp)> {
        let l = linearize(dag, pred.lhs)?;
        let r = linearize(dag, pred.rhs)?;
        let d = l.sub(&r);
        let row = Row {
            terms: d.terms.iter().map(|(&a, &c)| (a, c as i128)).collect(),
            k: d.constant as i128,
        };
        Some((row, pred.op))
    }

    /// Exact feasibility of `eqs = 0 ∧ ineqs ≤ 0` over the rationals.
    fn feasible(&self, mut eqs: Vec<Row>, mut ineqs: Vec<Row>) -> Feasibility {
        // Gaussian elimination of the equalities
        while let Some(pos) = eqs.iter().position(|r| !r.is_constant()) {
            let eq = eqs.swap_remove(pos);
            let (&pivot, &c) = eq.terms.iter().next().expect("non-constant row");
            let cabs = c.abs();
            let sign = if c > 0 { 1 } else { -1 };
            let eliminate = |r: &Row| -> Row {
                let d = r.terms.get(&pivot).copied().unwrap_or(0);
                if d == 0 {
                    return r.clone();
                }
                // r·|c| + eq·(−d·sign(c)) cancels the pivot and scales the
                // row by a positive factor only
                r.scaled(cabs).plus(&eq.scaled(-d * sign))
            };
            let next_eqs: Vec<Row> = eqs.iter().map(&eliminate).collect();
            let next_ineqs: Vec<Row> = ineqs.iter().map(&eliminate).collect();
            eqs = next_eqs;
            ineqs = next_ineqs;
        }
        if eqs.iter().any(|r| r.k != 0) {
            return Feasibility::Infeasible;
        }

        // Fourier–Motzkin on the inequalities
        loop {
            if ineqs.iter().any(|r| r.is_constant() && r.k > 0) {
                return Feasibility::Infeasible;
            }
            ineqs.retain(|r| !r.is_constant());
            let Some(&atom) = ineqs.iter().flat_map(|r| r.terms.keys()).next() else {
                return Feasibility::Feasible;
            };

            let mut pos = Vec::new();
            let mut neg = Vec::new();
            let mut rest = Vec::new();
            for r in ineqs {
                match r.terms.get(&atom).copied().unwrap_or(0) {
                    c if c > 0 => pos.push(r),
                    c if c < 0 => neg.push(r),
                    _ => rest.push(r),
                }
            }
            if rest.len() + pos.len() * neg.len() > self.max_rows {
                return Feasibility::Unknown;
            }
            let mut next = rest;
            for p in &pos {
                let pc = p.terms[&atom];
                for n in &neg {
                    let nc = n.terms[&atom];
                    // p·|nc| + n·pc eliminates the atom (both factors > 0)
                    let combined = p.scaled(nc.abs()).plus(&n.scaled(pc));
                    next.push(combined);
                }
            }
            ineqs = next;
        }
    }
}

impl ConstraintSolver for LinearBackend {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn solve_conjunction(&mut self, dag: &Dag, preds: &[Predicate]) -> SolverResult {
        let mut eqs: Vec<Row> = Vec::new();
        let mut ineqs: Vec<Row> = Vec::new();
        let mut nes: Vec<Row> = Vec::new();
        let mut dropped = false;

        for pred in preds {
            let Some((row, op)) = Self::flatten(dag, pred) else {
                dropped = true;
                continue;
            };
            match op {
                CmpOp::Eq => eqs.push(row),
                CmpOp::Ne => nes.push(row),
                CmpOp::Le => ineqs.push(row),
                CmpOp::Lt => {
                    // a < b over the integers is a - b + 1 <= 0
                    let mut r = row;
                    r.k += 1;
                    ineqs.push(r);
                }
                // construction normalizes these away
                CmpOp::Gt | CmpOp::Ge => {
                    let mut r = row.scaled(-1);
                    if op == CmpOp::Gt {
                        r.k += 1;
                    }
                    ineqs.push(r);
                }
            }
        }

        let atom_count = eqs
            .iter()
            .chain(ineqs.iter())
            .chain(nes.iter())
            .flat_map(|r| r.terms.keys())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        if atom_count > self.max_atoms {
            return SolverResult::Unknown;
        }

        match self.feasible(eqs.clone(), ineqs.clone()) {
            Feasibility::Infeasible => return SolverResult::Unsat,
            Feasibility::Unknown => return SolverResult::Unknown,
            Feasibility::Feasible => {}
        }

        // a disequality d ≠ 0 is refutable only when d ≤ −1 and d ≥ 1 are
        // both infeasible under the rest of the system
        for ne in &nes {
            let mut below = ne.clone();
            below.k += 1; // d + 1 <= 0  ⇔  d <= -1
            let mut above = ne.scaled(-1);
            above.k += 1; // -d + 1 <= 0  ⇔  d >= 1

            let mut with_below = ineqs.clone();
            with_below.push(below);
            let mut with_above = ineqs.clone();
            with_above.push(above);

            let b = self.feasible(eqs.clone(), with_below);
            let a = self.feasible(eqs.clone(), with_above);
            if a == Feasibility::Infeasible && b == Feasibility::Infeasible {
                return SolverResult::Unsat;
            }
            if a == Feasibility::Unknown || b == Feasibility::Unknown {
                return SolverResult::Unknown;
            }
        }

        // dropped predicates can only make the verdict more permissive
        let _ = dropped;
        SolverResult::Sat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::expression::domain::CmpOp;

    fn pred(op: CmpOp, l: crate::features::expression::domain::ExprId, r: crate::features::expression::domain::ExprId) -> Predicate {
        Predicate::new(op, l, r)
    }

    #[test]
    fn test_interval_contradiction() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let zero = dag.cst_abs(0);
        let ten = dag.cst_abs(10);

        let mut solver = LinearBackend::new();
        // x < 0 ∧ x > 10
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Lt, x, zero), pred(CmpOp::Gt, x, ten)]);
        assert_eq!(r, SolverResult::Unsat);

        // x < 0 ∧ x > -5
        let m5 = dag.cst_abs(-5);
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Lt, x, zero), pred(CmpOp::Gt, x, m5)]);
        assert_eq!(r, SolverResult::Sat);
    }

    #[test]
    fn test_integer_tightening_of_strict_bounds() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let zero = dag.cst_abs(0);
        let one = dag.cst_abs(1);

        let mut solver = LinearBackend::new();
        // 0 < x ∧ x < 1 has a rational model but no integer one
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Lt, zero, x), pred(CmpOp::Lt, x, one)]);
        assert_eq!(r, SolverResult::Unsat);
    }

    #[test]
    fn test_equality_chain() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let y = dag.var(1);
        let three = dag.cst_abs(3);
        let five = dag.cst_abs(5);

        let mut solver = LinearBackend::new();
        // x = y ∧ y = 3 ∧ x = 5
        let r = solver.solve_conjunction(
            &dag,
            &[
                pred(CmpOp::Eq, x, y),
                pred(CmpOp::Eq, y, three),
                pred(CmpOp::Eq, x, five),
            ],
        );
        assert_eq!(r, SolverResult::Unsat);
    }

    #[test]
    fn test_disequality_against_forced_value() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let three = dag.cst_abs(3);

        let mut solver = LinearBackend::new();
        // x = 3 ∧ x ≠ 3
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Eq, x, three), pred(CmpOp::Ne, x, three)]);
        assert_eq!(r, SolverResult::Unsat);

        // x ≤ 3 ∧ x ≠ 3 is satisfiable
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Le, x, three), pred(CmpOp::Ne, x, three)]);
        assert_eq!(r, SolverResult::Sat);
    }

    #[test]
    fn test_shared_opaque_atom() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let three = dag.cst_abs(3);
        let m = dag.modulo(x, three);
        let zero = dag.cst_abs(0);
        let one = dag.cst_abs(1);

        let mut solver = LinearBackend::new();
        // (x % 3) = 0 ∧ (x % 3) = 1: same atom, contradictory values
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Eq, m, zero), pred(CmpOp::Eq, m, one)]);
        assert_eq!(r, SolverResult::Unsat);
    }

    #[test]
    fn test_iteration_counter_contradiction() {
        let mut dag = Dag::new();
        let n = dag.iter(crate::shared::BlockId(7));
        let i0 = dag.var(1);
        let sum = dag.add(i0, n);
        let zero = dag.cst_abs(0);

        let mut solver = LinearBackend::new();
        // 0 ≤ n ∧ i0 + n < i0
        let r = solver.solve_conjunction(&dag, &[pred(CmpOp::Le, zero, n), pred(CmpOp::Lt, sum, i0)]);
        assert_eq!(r, SolverResult::Unsat);
    }

    #[test]
    fn test_transitive_inequalities() {
        let mut dag = Dag::new();
        let x = dag.var(0);
        let y = dag.var(1);
        let z = dag.var(2);

        let mut solver = LinearBackend::new();
        // x < y ∧ y < z ∧ z < x
        let r = solver.solve_conjunction(
            &dag,
            &[
                pred(CmpOp::Lt, x, y),
                pred(CmpOp::Lt, y, z),
                pred(CmpOp::Lt, z, x),
            ],
        );
        assert_eq!(r, SolverResult::Unsat);
    }
}
