//! Sensor messages: state estimate and depth cloud.

use serde::{Deserialize, Serialize};

/// Vehicle state estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseMsg {
    /// Time of the estimate
    pub time_s: f64,

    /// Position in the world frame
    pub position_m: [f64; 3],

    /// Attitude as a unit quaternion, ordered `[x, y, z, w]`
    pub orientation_q: [f64; 4],

    /// Linear velocity in the estimator's body frame
    #[serde(default)]
    pub lin_vel_ms: Option<[f64; 3]>,

    /// Angular rate in the estimator's body frame
    #[serde(default)]
    pub ang_vel_rads: Option<[f64; 3]>,
}

/// Depth cloud, points given in the camera's optical frame (z forward,
/// x right, y down).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudMsg {
    /// Acquisition time
    pub time_s: f64,

    /// Unordered points
    pub points_m: Vec<[f64; 3]>,
}
