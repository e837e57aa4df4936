//! # Local Planner Executable Parameters
//!
//! This module provide parameters for the executable itself, the algorithm
//! parameters live with their modules.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecParams {

    /// Target period of one cycle of the main loop
    pub cycle_period_s: f64,

    /// Publish the unblocked library paths after each plan
    pub publish_free_paths: bool,

    /// Publish the tail of the track path after each splice
    pub publish_track_path: bool,

    /// Log level for the per-cloud and per-cycle detail of the algorithms, one of `info`, `debug`
    /// or `trace`
    pub algorithm_log_level: String,
}

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.01,
            publish_free_paths: true,
            publish_track_path: true,
            algorithm_log_level: String::from("debug"),
        }
    }
}
