//! Infeasibility Oracle
//!
//! Filters a batch of states through the SMT backend. For every state
//! whose predicate conjunction is unsatisfiable, the oracle extracts a
//! *minimal* infeasible edge set:
//!
//! 1. deletion-minimize the unsatisfiable predicate core,
//! 2. project the core onto the union of its label edges,
//! 3. deletion-minimize the edge set: removing any further edge leaves a
//!    satisfiable (or unmatched) predicate subset.
//!
//! A minimized set is validated against the rest of the batch: if some
//! satisfiable sibling state traverses every edge of the set, the
//! minimization produced a false witness and is rejected (the full path
//! can be kept under `unminimized_paths`).
//!
//! Batches may be solved in parallel; every worker owns its solver
//! instance and reads the states and the DAG immutably. Result order is
//! restored by per-state slot indexing.

use crate::config::AnalysisConfig;
use crate::features::expression::infrastructure::{has_opaque_atom, Dag};
use crate::features::smt::domain::IpStats;
use crate::features::smt::infrastructure::solvers::{ConstraintSolver, LinearBackend, SolverResult};
use crate::features::state::domain::{DetailedPath, LabelledPredicate, Predicate};
use crate::features::state::infrastructure::state::States;
use crate::shared::EdgeId;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

fn make_solver() -> Box<dyn ConstraintSolver> {
    #[cfg(feature = "z3")]
    {
        Box::new(crate::features::smt::infrastructure::solvers::Z3Backend::new())
    }
    #[cfg(not(feature = "z3"))]
    {
        Box::new(LinearBackend::new())
    }
}

fn solve(dag: &Dag, preds: &[Predicate]) -> SolverResult {
    make_solver().solve_conjunction(dag, preds)
}

/// Predicates a backend can usefully see, per configuration.
fn filtered_predicates(
    state: &crate::features::state::infrastructure::state::State,
    dag: &Dag,
    config: &AnalysisConfig,
) -> Vec<LabelledPredicate> {
    state
        .predicates()
        .filter(|lp| !lp.pred.mentions_top(dag))
        .filter(|lp| {
            config.clamp_predicate_size == 0 || lp.pred.size(dag) <= config.clamp_predicate_size
        })
        .filter(|lp| {
            if config.allow_nonlinear_oprs && !config.smt_check_linear {
                true
            } else {
                !has_opaque_atom(dag, lp.pred.lhs) && !has_opaque_atom(dag, lp.pred.rhs)
            }
        })
        .cloned()
        .collect()
}

/// One per-state solver job: `None` when satisfiable, otherwise the
/// minimized infeasible edge set.
fn seek_infeasible_edges(dag: &Dag, preds: &[LabelledPredicate]) -> Option<BTreeSet<EdgeId>> {
    let all: Vec<Predicate> = preds.iter().map(|lp| lp.pred).collect();
    if all.is_empty() {
        return None;
    }
    if solve(dag, &all) != SolverResult::Unsat {
        return None;
    }

    // deletion-minimize the predicate core
    let mut core: Vec<usize> = (0..preds.len()).collect();
    let mut i = 0;
    while i < core.len() {
        let candidate: Vec<Predicate> = core
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, &k)| preds[k].pred)
            .collect();
        if solve(dag, &candidate) == SolverResult::Unsat {
            core.remove(i);
        } else {
            i += 1;
        }
    }

    // project the core onto its label edges
    let mut edges: BTreeSet<EdgeId> = core
        .iter()
        .flat_map(|&k| preds[k].labels.iter().copied())
        .collect();

    // deletion-minimize the edge set: a predicate stays in the test
    // conjunction only while all its labels are still present
    for e in edges.clone() {
        let remaining: BTreeSet<EdgeId> = edges.iter().copied().filter(|&x| x != e).collect();
        let sub: Vec<Predicate> = preds
            .iter()
            .filter(|lp| lp.labels.iter().all(|l| remaining.contains(l)))
            .map(|lp| lp.pred)
            .collect();
        if solve(dag, &sub) == SolverResult::Unsat {
            edges = remaining;
        }
    }

    Some(edges)
}

/// Run the oracle on the states flowing along one edge: removes the
/// infeasible states from `ss` and returns the accepted infeasible paths.
pub fn ipcheck(
    ss: &mut States,
    dag: &Dag,
    config: &AnalysisConfig,
    stats: &mut IpStats,
) -> Vec<DetailedPath> {
    if config.dry_run || ss.is_empty() {
        return Vec::new();
    }

    let jobs: Vec<Vec<LabelledPredicate>> = ss
        .iter()
        .map(|s| filtered_predicates(s, dag, config))
        .collect();

    let results: Vec<Option<BTreeSet<EdgeId>>> =
        if config.nb_cores > 1 && jobs.len() >= config.nb_cores {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.nb_cores)
                .build();
            match pool {
                Ok(pool) => pool.install(|| {
                    jobs.par_iter()
                        .map(|preds| seek_infeasible_edges(dag, preds))
                        .collect()
                }),
                Err(_) => jobs
                    .iter()
                    .map(|preds| seek_infeasible_edges(dag, preds))
                    .collect(),
            }
        } else {
            jobs.iter()
                .map(|preds| seek_infeasible_edges(dag, preds))
                .collect()
        };

    if config.show_progress {
        let unsat = results.iter().filter(|r| r.is_some()).count();
        info!("oracle: {} state(s) solved, {} unsatisfiable", results.len(), unsat);
    }

    let mut accepted = Vec::new();
    let states = ss.states();
    for (i, result) in results.iter().enumerate() {
        let Some(edges) = result else { continue };
        stats.on_any_infeasible_path();

        // counterexample validation: a SAT sibling traversing every edge
        // of the candidate disproves the witness
        let counterexample = states.iter().enumerate().any(|(j, s)| {
            j != i && results[j].is_none() && s.path.contains_all_edges(edges)
        });

        if !counterexample {
            let path = states[i].path.retain_edges(edges);
            debug!("infeasible path found: {}", path);
            stats.on_minimized_path();
            accepted.push(path);
        } else {
            stats.on_unminimized_path();
            if config.unminimized_paths {
                let mut full = states[i].path.clone();
                full.normalize();
                debug!("keeping unminimized infeasible path: {}", full);
                accepted.push(full);
            } else {
                debug!("dropping infeasible path that could not be minimized");
            }
        }
    }

    // keep the satisfiable states; their remaining constant predicates
    // are tautologies and only slow the next call
    let survivors: Vec<_> = ss
        .states()
        .iter()
        .enumerate()
        .filter(|(i, _)| results[*i].is_none())
        .map(|(_, s)| s.clone())
        .collect();
    *ss = States::from_vec(survivors);
    for s in ss.iter_mut() {
        s.remove_constant_predicates(dag);
        if config.clean_tops {
            s.clean_tops(dag);
        }
    }

    accepted
}
