//! SMT domain models: oracle statistics.

use serde::{Deserialize, Serialize};

/// Counters of the infeasibility oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpStats {
    /// Unsatisfiable states encountered.
    pub unsat_states: usize,
    /// Minimized infeasible paths accepted.
    pub minimized: usize,
    /// Minimizations invalidated by a counterexample (kept unminimized or
    /// dropped, depending on configuration).
    pub unminimized: usize,
}

impl IpStats {
    pub fn on_any_infeasible_path(&mut self) {
        self.unsat_states += 1;
    }

    pub fn on_minimized_path(&mut self) {
        self.minimized += 1;
    }

    pub fn on_unminimized_path(&mut self) {
        self.unminimized += 1;
    }

    pub fn absorb(&mut self, other: IpStats) {
        self.unsat_states += other.unsat_states;
        self.minimized += other.minimized;
        self.unminimized += other.unminimized;
    }
}
