//! Localisation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters describing how the tracking camera is mounted on the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocParams {
    /// True if the tracking camera faces backwards, in which case the
    /// horizontal position, roll and pitch it reports are mirrored.
    pub tracking_cam_backward: bool,

    /// Position of the tracking camera in the vehicle body frame
    pub tracking_cam_offset_m: [f64; 3],

    /// Scale applied to all reported positions and velocities
    pub tracking_cam_scale: f64,
}

impl Default for LocParams {
    fn default() -> Self {
        Self {
            tracking_cam_backward: false,
            tracking_cam_offset_m: [0.0; 3],
            tracking_cam_scale: 1.0,
        }
    }
}
