//! Analysis Context
//!
//! Explicit bundle of the read-only inputs every component needs: the
//! platform descriptor, the initial memory image and the configuration.
//! Threading this through replaces the process-wide globals the problem
//! traditionally accumulates.

use crate::config::AnalysisConfig;
use crate::features::cfg::domain::{InitialData, Platform};

#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub platform: Platform,
    pub initial: &'a InitialData,
    pub config: &'a AnalysisConfig,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        platform: Platform,
        initial: &'a InitialData,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self { platform, initial, config }
    }
}
