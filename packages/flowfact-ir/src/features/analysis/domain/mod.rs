//! Analysis domain models: loop statuses and the analysis report.

use crate::features::smt::domain::IpStats;
use crate::features::state::domain::DetailedPath;
use serde::{Deserialize, Serialize};

/// Acceleration status of one loop header.
///
/// A header starts at `Enter` and moves forward only:
/// `Enter → Fix → Accel → Leave`. `Leave` releases the loop-exit edges
/// and turns the oracle back on for the loop body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopStatus {
    /// Iterating on concrete relative states.
    Enter,
    /// Iterating on a prepared (fixpoint-ready) baseline.
    Fix,
    /// Widening applied; the accelerated iterate is being composed.
    Accel,
    /// The loop is resolved; exit edges propagate.
    Leave,
}

impl LoopStatus {
    pub fn next(self) -> LoopStatus {
        match self {
            LoopStatus::Enter => LoopStatus::Fix,
            LoopStatus::Fix => LoopStatus::Accel,
            LoopStatus::Accel | LoopStatus::Leave => LoopStatus::Leave,
        }
    }
}

/// Result of one program analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Minimized infeasible paths, across all analyzed CFGs.
    pub infeasible_paths: Vec<DetailedPath>,
    pub stats: IpStats,
}
