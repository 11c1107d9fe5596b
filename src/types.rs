//! Simulation record types.

use crate::stats::AccumulatorReport;
use serde::{Deserialize, Serialize};

/// Population series of a single trial.
///
/// Entry `i` holds the population at the end of step `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Total number of particles.
    pub total_pop: Vec<usize>,

    /// Number of particles resistant to every tracked drug (treated model only).
    pub resist_pop: Option<Vec<usize>>,
}

/// All trials of a run, with the seed that generated them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub seed: u64,

    pub trials: Vec<Trial>,
}

/// Statistics of the population at a single step across all trials.
#[derive(Debug, Serialize, Deserialize)]
pub struct StepReport {
    pub step: usize,

    pub total_pop: AccumulatorReport,

    pub resist_pop: Option<AccumulatorReport>,
}
