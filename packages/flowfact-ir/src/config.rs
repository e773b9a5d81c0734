//! Analysis Configuration
//!
//! Externalized knobs of the analysis, serializable so runs can be
//! reproduced from a config file. Flags consumed by upstream CFG passes
//! (virtualization, slicing, loop reduction) are recorded here for
//! provenance but do not change the core's behavior.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Inline calls upstream (CFG provider concern, recorded only).
    pub virtualize_cfg: bool,
    /// Slice the CFG upstream (CFG provider concern, recorded only).
    pub slice_cfg: bool,
    /// Reduce loops upstream (CFG provider concern, recorded only).
    pub reduce_loops: bool,

    /// Consult the read-only initial memory image on loads.
    pub use_initial_data: bool,

    /// Merge state collections that grow beyond `state_size_limit`.
    pub merge: bool,
    /// Merge the composed collection after a function apply.
    pub merge_after_apply: bool,
    /// Collection size that triggers a merge when `merge` is set.
    pub state_size_limit: usize,

    /// Skip every solver call (the analysis still runs, nothing is found).
    pub dry_run: bool,
    /// Drop non-linear predicates before solving.
    pub smt_check_linear: bool,
    /// Keep opaque arithmetic (div/mod/unresolved products) as solver atoms.
    pub allow_nonlinear_oprs: bool,
    /// Drop predicates whose operand trees exceed this node count (0 = off).
    pub clamp_predicate_size: usize,
    /// Emit progress events from the oracle batches.
    pub show_progress: bool,
    /// Solver worker threads for one oracle batch.
    pub nb_cores: usize,

    /// Shorten result paths with dominance information.
    pub post_processing: bool,

    /// Treat stack-tracking anomalies as fatal instead of warnings.
    pub sp_critical: bool,
    /// Skip the SP-consistency check at merges entirely.
    pub assume_identical_sp: bool,
    /// Drop Top-valued slots and cells after each solver pass.
    pub clean_tops: bool,

    /// Replace widening with a plain Top assignment.
    pub no_widening: bool,
    /// When a minimized path is invalidated by a counterexample, keep the
    /// full unminimized path instead of dropping the result.
    pub unminimized_paths: bool,

    /// Safety bound on loop re-iterations before forcing acceleration.
    pub max_loop_iterations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            virtualize_cfg: false,
            slice_cfg: false,
            reduce_loops: false,
            use_initial_data: false,
            merge: true,
            merge_after_apply: false,
            state_size_limit: 250,
            dry_run: false,
            smt_check_linear: false,
            allow_nonlinear_oprs: true,
            clamp_predicate_size: 0,
            show_progress: false,
            nb_cores: 1,
            post_processing: true,
            sp_critical: false,
            assume_identical_sp: false,
            clean_tops: false,
            no_widening: false,
            unminimized_paths: false,
            max_loop_iterations: 64,
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_state_size_limit(mut self, limit: usize) -> Self {
        self.state_size_limit = limit;
        self
    }

    pub fn with_nb_cores(mut self, nb_cores: usize) -> Self {
        self.nb_cores = nb_cores.max(1);
        self
    }

    pub fn with_post_processing(mut self, enabled: bool) -> Self {
        self.post_processing = enabled;
        self
    }

    pub fn with_initial_data(mut self, enabled: bool) -> Self {
        self.use_initial_data = enabled;
        self
    }

    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn with_unminimized_paths(mut self, enabled: bool) -> Self {
        self.unminimized_paths = enabled;
        self
    }
}
