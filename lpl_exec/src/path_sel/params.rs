//! Path selection parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for path selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSelParams {
    /// A path is blocked once this many obstacle points fall in its voxels
    pub point_per_path_thre: u32,

    /// Obstacle points below this height in the track frame are ignored
    pub lower_bound_z_m: f64,

    /// Obstacle points above this height in the track frame are ignored
    pub upper_bound_z_m: f64,

    /// Limit on the relative goal pitch, and on the pitch difference used
    /// for scoring
    pub pitch_diff_limit_deg: f64,

    /// Score lost per degree of pitch difference
    pub pitch_weight: f64,

    /// Limit on the relative goal yaw
    pub yaw_diff_limit_deg: f64,

    /// Score lost per degree of yaw difference
    pub yaw_weight: f64,

    /// Half angle of the depth camera's vertical field of view
    pub sensor_max_pitch_deg: f64,

    /// Half angle of the depth camera's horizontal field of view
    pub sensor_max_yaw_deg: f64,

    /// Paths ending above this elevation are blocked
    pub max_elev_m: f64,

    /// Nominal path scale
    pub path_scale: f64,

    /// Smallest path scale tried
    pub min_path_scale: f64,

    /// Decrement of the path scale between passes
    pub path_scale_step: f64,

    /// Multiply the nominal scale by the forward speed command
    pub path_scale_by_speed: bool,

    /// Distance to the goal at which it is considered reached
    pub stop_dis_m: f64,

    /// Build the free path diagnostic set
    pub compute_free_paths: bool,
}

impl Default for PathSelParams {
    fn default() -> Self {
        Self {
            point_per_path_thre: 2,
            lower_bound_z_m: -1.2,
            upper_bound_z_m: 1.2,
            pitch_diff_limit_deg: 35.0,
            pitch_weight: 0.03,
            yaw_diff_limit_deg: 60.0,
            yaw_weight: 0.015,
            sensor_max_pitch_deg: 25.0,
            sensor_max_yaw_deg: 40.0,
            max_elev_m: 5.0,
            path_scale: 0.5,
            min_path_scale: 0.25,
            path_scale_step: 0.125,
            path_scale_by_speed: true,
            stop_dis_m: 0.5,
            compute_free_paths: true,
        }
    }
}
