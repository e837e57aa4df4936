//! # Message module
//!
//! Every message exchanged by the local planner executable is defined here.
//! Messages are serialised as JSON, one message per network frame (or one
//! entry per replay script line). All timestamps are seconds on the clock of
//! the state estimator, which is the clock every input is stamped with.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod operator;
mod plan;
mod sensor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use operator::*;
pub use plan::*;
pub use sensor::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// All inputs accepted by the executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputMsg {
    /// Vehicle pose from the state estimator
    Pose(PoseMsg),

    /// Depth cloud in the depth camera's optical frame
    Cloud(CloudMsg),

    /// New goal point
    Goal(GoalMsg),

    /// Operator joystick state
    Operator(OperatorMsg),

    /// External speed/mode scalar
    AutoMode(AutoModeMsg),

    /// Speed override
    Speed(SpeedMsg),

    /// Request to forget the retained obstacle memory
    ClearCloud(ClearCloudMsg),
}

/// All outputs produced by the executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputMsg {
    /// Chosen path in the track frame
    Path(PathMsg),

    /// Unblocked library paths, for display
    FreePaths(FreePathsMsg),

    /// Attitude/rate command for the flight controller
    Control(ControlCmdMsg),

    /// Pose of the pursuit track point
    TrackPose(TrackPoseMsg),

    /// Tail of the persistent track path, for display
    TrackPath(TrackPathMsg),

    /// Throttled auto-mode scalar
    AutoMode(AutoModeMsg),

    /// Synthetic goal emitted by the waypoint test
    Waypoint(GoalMsg),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum MsgParseError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputMsg {
    /// Parse an input from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, MsgParseError> {
        serde_json::from_str(json_str).map_err(MsgParseError::InvalidJson)
    }

    /// Timestamp of the input.
    pub fn time_s(&self) -> f64 {
        match self {
            InputMsg::Pose(m) => m.time_s,
            InputMsg::Cloud(m) => m.time_s,
            InputMsg::Goal(m) => m.time_s,
            InputMsg::Operator(m) => m.time_s,
            InputMsg::AutoMode(m) => m.time_s,
            InputMsg::Speed(m) => m.time_s,
            InputMsg::ClearCloud(m) => m.time_s,
        }
    }
}

impl OutputMsg {
    /// Serialise the output into a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Short name of the output kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutputMsg::Path(_) => "Path",
            OutputMsg::FreePaths(_) => "FreePaths",
            OutputMsg::Control(_) => "Control",
            OutputMsg::TrackPose(_) => "TrackPose",
            OutputMsg::TrackPath(_) => "TrackPath",
            OutputMsg::AutoMode(_) => "AutoMode",
            OutputMsg::Waypoint(_) => "Waypoint",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_operator() {
        let json = r#"{"Operator": {
            "time_s": 3.5,
            "fwd": 0.5, "left": 0.0, "up": 0.0, "yaw": -0.2,
            "mode": "Autonomous"
        }}"#;

        match InputMsg::from_json(json).unwrap() {
            InputMsg::Operator(op) => {
                assert_eq!(op.time_s, 3.5);
                assert_eq!(op.mode, ModeSelect::Autonomous);
                assert!(!op.clear_cloud);
            },
            _ => panic!("Expected an operator message")
        }
    }

    #[test]
    fn test_parse_pose_without_twist() {
        let json = r#"{"Pose": {
            "time_s": 1.0,
            "position_m": [1.0, 2.0, 3.0],
            "orientation_q": [0.0, 0.0, 0.0, 1.0]
        }}"#;

        let msg = InputMsg::from_json(json).unwrap();
        assert_eq!(msg.time_s(), 1.0);
        match msg {
            InputMsg::Pose(p) => {
                assert!(p.lin_vel_ms.is_none());
                assert!(p.ang_vel_rads.is_none());
            },
            _ => panic!("Expected a pose message")
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(InputMsg::from_json("{\"Cloud\": 3}").is_err());
    }
}
