//! Perception parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the depth cloud preprocessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerParams {
    /// Latency of the depth camera. The pose used to place a cloud is the
    /// one nearest to the cloud's stamp minus this delay.
    pub depth_cloud_delay_s: f64,

    /// Downward pitch of the depth camera relative to the body
    pub depth_cam_pitch_offset_rad: f64,

    /// Position of the depth camera in the body frame
    pub depth_cam_offset_m: [f64; 3],

    /// Leaf size of the voxel downsampler
    pub scan_voxel_size_m: f64,

    /// Points further than this in front of the camera are dropped
    pub max_range_m: f64,

    /// Retain points close to the vehicle between cycles
    pub keep_surr_cloud: bool,

    /// Horizontal radius around the vehicle of the retained points
    pub keep_hori_dis_m: f64,

    /// Vertical half-height around the vehicle of the retained points
    pub keep_vert_dis_m: f64,

    /// Number of clouds discarded while the camera warms up
    pub system_init_delay: u32,

    /// Number of recent clouds merged for planning
    pub cloud_stack_num: usize,
}

impl Default for PerParams {
    fn default() -> Self {
        Self {
            depth_cloud_delay_s: 0.0,
            depth_cam_pitch_offset_rad: 0.0,
            depth_cam_offset_m: [0.0; 3],
            scan_voxel_size_m: 0.1,
            max_range_m: 4.0,
            keep_surr_cloud: true,
            keep_hori_dis_m: 1.0,
            keep_vert_dis_m: 0.5,
            system_init_delay: 5,
            cloud_stack_num: 1,
        }
    }
}
