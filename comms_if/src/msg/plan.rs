//! Planner and controller outputs.

use serde::{Deserialize, Serialize};

/// A path in the local track frame. A single point, or none, means hold
/// position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMsg {
    /// Time of the cloud the path was planned from
    pub time_s: f64,
    pub points_m: Vec<[f64; 3]>,
}

/// Points of all unblocked library paths, `[x, y, z, intensity]` in the
/// local track frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreePathsMsg {
    pub time_s: f64,
    pub points: Vec<[f64; 4]>,
}

/// Body-frame command for the flight controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlCmdMsg {
    pub time_s: f64,
    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub vel_z_ms: f64,
    pub yaw_rate_rads: f64,
}

/// Pose of the pursuit track point, which is the reference frame of the
/// next planning cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoseMsg {
    pub time_s: f64,
    pub position_m: [f64; 3],
    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub yaw_rad: f64,

    /// Vehicle velocity in the yaw-aligned body frame
    pub vehicle_vel_ms: [f64; 3],
}

/// Tail of the persistent track path in the world frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPathMsg {
    pub time_s: f64,
    pub points_m: Vec<[f64; 3]>,
}
