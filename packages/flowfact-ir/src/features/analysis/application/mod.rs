//! Analysis use case: the façade downstream consumers (flow-fact
//! emitters, CLIs) program against.

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::analysis::domain::AnalysisReport;
use crate::features::analysis::infrastructure::driver;
use crate::features::cfg::domain::{InitialData, Platform, Program};
use crate::features::cfg::infrastructure::dominance::GlobalDominance;

/// Infeasible-path analysis over one program.
pub struct InfeasiblePathUseCase {
    config: AnalysisConfig,
}

impl InfeasiblePathUseCase {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the analysis; dominance for the post-processor is derived from
    /// the program.
    pub fn run(
        &self,
        program: &Program,
        platform: Platform,
        initial: &InitialData,
    ) -> Result<AnalysisReport> {
        driver::analyze(program, platform, initial, &self.config)
    }

    /// Run with an externally provided dominance service.
    pub fn run_with_dominance(
        &self,
        program: &Program,
        platform: Platform,
        initial: &InitialData,
        dominance: &dyn GlobalDominance,
    ) -> Result<AnalysisReport> {
        driver::analyze_with_dominance(program, platform, initial, dominance, &self.config)
    }
}
