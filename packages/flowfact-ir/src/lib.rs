/*
 * flowfact-ir - Infeasible-Path Analysis Engine
 *
 * Discovers sets of CFG edges that can never be traversed together on any
 * real execution of a binary program, for consumption by WCET estimators
 * (tighter ILP flow facts).
 *
 * Feature-First Architecture:
 * - shared/       : ids and common models
 * - features/     : vertical slices (expression -> cfg -> state -> smt ->
 *                   analysis -> postprocessing)
 * - config/errors : ambient concerns
 *
 * The analysis itself is single-threaded per CFG; only the SMT oracle
 * fans solver jobs out across a work pool.
 */

#![allow(clippy::too_many_arguments)] // analysis plumbing carries context
#![allow(clippy::module_inception)] // feature/mod naming intentional
#![allow(clippy::new_without_default)]

/// Shared ids and small models
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::AnalysisConfig;
pub use errors::{FlowfactError, Result};
pub use features::analysis::{analyze, analyze_with_dominance, AnalysisReport, InfeasiblePathUseCase};
pub use features::cfg::{
    EdgeDominance, GlobalDominance, InitialData, Platform, Program, ProgramBuilder, SemInst,
};
pub use features::expression::{ArithOp, CmpOp, Constant};
pub use features::smt::IpStats;
pub use features::state::{DetailedPath, FlowInfo};
pub use shared::{BlockId, CfgId, EdgeId, VarId};
