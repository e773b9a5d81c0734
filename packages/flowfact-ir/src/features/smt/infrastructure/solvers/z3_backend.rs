//! Z3 SMT Solver Backend
//!
//! Full-theory backend for the infeasibility oracle, used when the
//! built-in linear solver is not enough (non-linear arithmetic, precise
//! div/mod reasoning). Only available when compiled with `--features z3`
//! (requires libz3: `apt-get install libz3-dev` / `brew install z3`).

#![cfg(feature = "z3")]

use super::{ConstraintSolver, SolverResult};
use crate::features::expression::domain::{ArithOp, CmpOp, Expr, ExprId};
use crate::features::expression::infrastructure::Dag;
use crate::features::state::domain::Predicate;
use std::collections::HashMap;
use z3::ast::{Ast, Int};
use z3::{Config, Context, Solver};

type Z3Int = Int<'static>;

/// Z3-backed conjunction solver; one instance per worker thread.
pub struct Z3Backend {
    context: Context,
    solver: Solver<'static>,
    vars: HashMap<String, Z3Int>,
}

impl Z3Backend {
    /// Default 5s timeout, matching the oracle's "unknown ⇒ feasible"
    /// recovery.
    pub fn new() -> Self {
        Self::with_timeout(5000)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        let mut cfg = Config::new();
        cfg.set_timeout_msec(timeout_ms);
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        // SAFETY: lifetime extension from 'ctx to 'static; the context is
        // stored alongside and outlives the solver
        let solver_static = unsafe { std::mem::transmute(solver) };
        Self {
            context: ctx,
            solver: solver_static,
            vars: HashMap::new(),
        }
    }

    fn named_var(&mut self, name: String) -> Z3Int {
        if let Some(v) = self.vars.get(&name) {
            return v.clone();
        }
        let v = Int::new_const(&self.context, name.as_str());
        let v: Z3Int = unsafe { std::mem::transmute(v) };
        self.vars.insert(name, v.clone());
        v
    }

    fn int(&self, value: i64) -> Z3Int {
        let v = Int::from_i64(&self.context, value);
        unsafe { std::mem::transmute(v) }
    }

    fn translate(&mut self, dag: &Dag, id: ExprId) -> Z3Int {
        match dag.get(id) {
            Expr::Const(k) => {
                if k.sp_rel {
                    let base = self.named_var("sp0".to_string());
                    let off = self.int(k.value as i64);
                    let sum = Int::add(&self.context, &[&base, &off]);
                    unsafe { std::mem::transmute(sum) }
                } else {
                    self.int(k.value as i64)
                }
            }
            Expr::Var(v) => {
                let name = if v < 0 { format!("t{}", -v) } else { format!("r{}", v) };
                self.named_var(name)
            }
            Expr::Mem { addr, generation } => {
                self.named_var(format!("mem_{}_{}_{}", addr.value, addr.sp_rel, generation))
            }
            Expr::Iter(h) => self.named_var(format!("iter_{}", h.0)),
            Expr::Neg(x) => {
                let x = self.translate(dag, x);
                let zero = self.int(0);
                let neg = Int::sub(&self.context, &[&zero, &x]);
                unsafe { std::mem::transmute(neg) }
            }
            Expr::Arith { op, lhs, rhs } => {
                let a = self.translate(dag, lhs);
                let b = self.translate(dag, rhs);
                let node = match op {
                    ArithOp::Add => Int::add(&self.context, &[&a, &b]),
                    ArithOp::Sub => Int::sub(&self.context, &[&a, &b]),
                    ArithOp::Mul => Int::mul(&self.context, &[&a, &b]),
                    ArithOp::Div => a.div(&b),
                    ArithOp::Mod => a.modulo(&b),
                    // opaque comparison value: an uninterpreted integer
                    // shared by node identity
                    ArithOp::Cmp => return self.named_var(format!("cmp_{}", id.index())),
                };
                unsafe { std::mem::transmute(node) }
            }
            Expr::Top => self.named_var(format!("top_{}", id.index())),
        }
    }
}

impl Default for Z3Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSolver for Z3Backend {
    fn name(&self) -> &'static str {
        "z3"
    }

    fn solve_conjunction(&mut self, dag: &Dag, preds: &[Predicate]) -> SolverResult {
        self.solver.reset();
        self.vars.clear();
        for p in preds {
            let l = self.translate(dag, p.lhs);
            let r = self.translate(dag, p.rhs);
            let formula = match p.op {
                CmpOp::Eq => l._eq(&r),
                CmpOp::Ne => l._eq(&r).not(),
                CmpOp::Lt => l.lt(&r),
                CmpOp::Le => l.le(&r),
                CmpOp::Gt => l.gt(&r),
                CmpOp::Ge => l.ge(&r),
            };
            self.solver.assert(&formula);
        }
        match self.solver.check() {
            z3::SatResult::Sat => SolverResult::Sat,
            z3::SatResult::Unsat => SolverResult::Unsat,
            z3::SatResult::Unknown => SolverResult::Unknown,
        }
    }
}
