//! Operator and mission-level messages.

use serde::{Deserialize, Serialize};

/// Mode requested by the operator's triggers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeSelect {
    /// Direct attitude control from the sticks
    Manual,

    /// Obstacle-avoiding flight toward the stick direction
    Assisted,

    /// Goal-directed flight
    Autonomous,
}

/// Operator joystick state. Axes are in `[-1, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorMsg {
    pub time_s: f64,

    /// Forward stick, positive forward
    pub fwd: f64,

    /// Lateral stick, positive left
    pub left: f64,

    /// Vertical stick, positive up
    pub up: f64,

    /// Yaw stick, positive counter-clockwise
    pub yaw: f64,

    /// Mode requested by the triggers
    pub mode: ModeSelect,

    /// Clear the retained obstacle memory
    #[serde(default)]
    pub clear_cloud: bool,
}

/// A goal point in the world frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalMsg {
    pub time_s: f64,
    pub point: [f64; 3],
}

/// Auto-mode scalar. Negative requests rotate-in-place, otherwise the value
/// is the fraction of maximum speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoModeMsg {
    pub time_s: f64,
    pub value: f64,
}

/// Speed override as a fraction of maximum speed, in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedMsg {
    pub time_s: f64,
    pub value: f64,
}

/// Clear the retained obstacle memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCloudMsg {
    pub time_s: f64,
}
