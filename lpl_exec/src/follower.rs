//! # Path follower
//!
//! The control side of the executable. Runs one control cycle per received
//! pose, splices planned paths into the track path, and turns the operator's
//! inputs into the mode, axes and speed demand the controller runs with.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::{
    AutoModeMsg, ControlCmdMsg, GoalMsg, OperatorMsg, OutputMsg, PathMsg, PoseMsg, SpeedMsg,
    TrackPathMsg, TrackPoseMsg,
};
use log::{debug, info, warn};
use nalgebra::Vector3;
use util::{archive::Archived, module::State};

use crate::{
    loc::{LocError, LocParams, Pose},
    operator::{DesiredSpeed, Mode, OperatorParams, OperatorState},
    traj_ctrl::{CtrlInput, TrajCtrl, TrajCtrlError, TrajCtrlParams, TrajLog, WaypointTest},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of track path points published for display.
pub const TRACK_PATH_DISPLAY_LEN: usize = 500;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the follower is initialised from.
#[derive(Debug, Clone, Default)]
pub struct FollowerParams {
    pub loc: LocParams,
    pub traj_ctrl: TrajCtrlParams,
    pub operator: OperatorParams,
}

pub struct PathFollower {
    loc_params: LocParams,

    /// Number of poses to skip between control cycles
    pose_skip_num: u32,

    /// Delay a speed override must wait after the last joystick input
    joy_to_speed_delay_s: f64,

    ctrl: TrajCtrl,
    operator: OperatorState,
    speed: DesiredSpeed,
    waypoint_test: WaypointTest,
    traj_log: Option<TrajLog>,

    goal_m: Vector3<f64>,
    last_pose: Option<Pose>,

    /// Poses left to skip before the next control cycle
    skip_count: u32,

    /// Poses left to discard before the initial goal is shifted, `None` once
    /// done or if the goal is not shifted
    shift_countdown: Option<u32>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FollowerError {
    #[error("Could not convert the pose: {0}")]
    LocError(#[from] LocError),

    #[error("Trajectory control failed: {0}")]
    TrajCtrlError(#[from] TrajCtrlError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathFollower {
    pub fn new(params: FollowerParams, traj_log: Option<TrajLog>) -> Result<Self, FollowerError> {
        let tp = &params.traj_ctrl;
        let op = &params.operator;

        let speed = DesiredSpeed::new(tp.min_speed_ms, tp.max_speed_ms, op.joy_deadband);
        let waypoint_test = WaypointTest::new(tp.waypoint_test.clone());
        let pose_skip_num = tp.pose_skip_num;
        let joy_to_speed_delay_s = tp.joy_to_speed_delay_s;
        let shift_countdown = if op.shift_goal_at_start {
            Some(op.state_init_delay)
        } else {
            None
        };

        let mut ctrl = TrajCtrl::default();
        ctrl.init(params.traj_ctrl.clone())?;

        Ok(Self {
            loc_params: params.loc,
            pose_skip_num,
            joy_to_speed_delay_s,
            ctrl,
            operator: OperatorState::new(&params.operator),
            speed,
            waypoint_test,
            traj_log,
            goal_m: Vector3::from(params.operator.initial_goal_m),
            last_pose: None,
            skip_count: 0,
            shift_countdown,
        })
    }

    /// Run one control cycle on a pose.
    ///
    /// Produces the control command, the track pose and, when due, the
    /// auto-mode scalar and any synthetic goal. A goal shifted onto the
    /// settled start position is emitted as a synthetic goal too.
    pub fn on_pose(&mut self, msg: &PoseMsg) -> Result<Vec<OutputMsg>, FollowerError> {
        let pose = Pose::from_msg(msg, &self.loc_params)?;
        let t = msg.time_s;
        let mut outputs = Vec::new();

        // Wait for the estimator to settle before shifting the goal
        if let Some(n) = self.shift_countdown {
            if n > 0 {
                self.shift_countdown = Some(n - 1);
                return Ok(outputs);
            }

            self.shift_countdown = None;
            self.goal_m += pose.position_m;
            info!(
                "Goal shifted to ({:.2}, {:.2}, {:.2})",
                self.goal_m.x, self.goal_m.y, self.goal_m.z
            );
            outputs.push(OutputMsg::Waypoint(GoalMsg {
                time_s: t,
                point: to_array(&self.goal_m),
            }));
        }

        if self.skip_count > 0 {
            self.skip_count -= 1;
            return Ok(outputs);
        }
        self.skip_count = self.pose_skip_num;

        self.last_pose = Some(pose);

        let input = CtrlInput {
            time_s: t,
            pose,
            goal_m: self.goal_m,
            mode: self.operator.mode(),
            axes: self.operator.axes(),
            deadband: self.operator.deadband(),
            desired_speed_ms: self.speed.value_ms(),
        };
        let (out, _) = self.ctrl.proc(&input)?;

        // The rotate in place machine may have changed the mode or axes
        if out.mode != input.mode {
            self.operator.set_auto_adjust(out.mode == Mode::AutoAdjust);
        }
        if out.axes != input.axes {
            self.operator.set_axes(out.axes);
        }

        outputs.push(OutputMsg::Control(ControlCmdMsg {
            time_s: t,
            roll_rad: out.cmd.roll_rad,
            pitch_rad: out.cmd.pitch_rad,
            vel_z_ms: out.cmd.vel_z_ms,
            yaw_rate_rads: out.cmd.yaw_rate_rads,
        }));
        outputs.push(OutputMsg::TrackPose(TrackPoseMsg {
            time_s: t,
            position_m: to_array(&out.track_pose.position_m),
            roll_rad: 0.0,
            pitch_rad: out.track_pose.pitch_rad,
            yaw_rad: out.track_pose.yaw_rad,
            vehicle_vel_ms: to_array(&pose.vel_ms),
        }));
        if let Some(value) = out.auto_mode {
            outputs.push(OutputMsg::AutoMode(AutoModeMsg { time_s: t, value }));
        }

        if let Some(goal) = self
            .waypoint_test
            .update(t, &pose, self.operator.mode().is_autonomous())
        {
            self.goal_m = goal;
            outputs.push(OutputMsg::Waypoint(GoalMsg {
                time_s: t,
                point: to_array(&goal),
            }));
        }

        if let Some(log) = self.traj_log.as_mut() {
            log.update(
                t,
                &out.track_pose.position_m,
                out.track_pose.yaw_rad,
                &pose,
            );
            if let Err(e) = log.write() {
                warn!("Could not write the trajectory log: {}", e);
            }
        }

        Ok(outputs)
    }

    /// Splice a planned path into the track path.
    ///
    /// Returns the tail of the track path for display if the path was
    /// accepted.
    pub fn on_path(&mut self, msg: &PathMsg) -> Result<Option<TrackPathMsg>, FollowerError> {
        let path: Vec<Vector3<f64>> = msg.points_m.iter().map(|p| Vector3::from(*p)).collect();

        // When driven directly the new path starts from the vehicle itself
        let pin = if self.operator.mode().bypasses_pursuit() {
            self.last_pose
        } else {
            None
        };

        let report = match self.ctrl.splice_path(&path, msg.time_s, pin.as_ref())? {
            Some(r) => r,
            None => {
                debug!("Path at {:.3} s ignored, no control cycle run yet", msg.time_s);
                return Ok(None);
            }
        };

        debug!(
            "Path at {:.3} s spliced at {}, track path {} long",
            msg.time_s, report.splice_index, report.track_len
        );

        Ok(Some(TrackPathMsg {
            time_s: msg.time_s,
            points_m: self
                .ctrl
                .track_path()
                .tail(TRACK_PATH_DISPLAY_LEN)
                .iter()
                .map(to_array)
                .collect(),
        }))
    }

    pub fn on_operator(&mut self, msg: &OperatorMsg) {
        self.operator.apply(msg);
        self.speed.on_joystick(msg.time_s, msg.fwd);
    }

    pub fn on_auto_mode(&mut self, value: f64) {
        self.operator.apply_auto_mode(value);
    }

    pub fn on_speed(&mut self, msg: &SpeedMsg) {
        if !self
            .speed
            .on_override(msg.time_s, msg.value, self.joy_to_speed_delay_s)
        {
            debug!("Speed override ignored, joystick active");
        }
    }

    pub fn on_goal(&mut self, msg: &GoalMsg) {
        self.set_goal(Vector3::from(msg.point));
    }

    pub fn set_goal(&mut self, goal_m: Vector3<f64>) {
        self.goal_m = goal_m;
    }

    pub fn goal_m(&self) -> Vector3<f64> {
        self.goal_m
    }

    pub fn operator(&self) -> &OperatorState {
        &self.operator
    }

    pub fn desired_speed_ms(&self) -> f64 {
        self.speed.value_ms()
    }

    pub fn ctrl(&self) -> &TrajCtrl {
        &self.ctrl
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn to_array(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::ModeSelect;

    fn follower(operator: OperatorParams, traj_ctrl: TrajCtrlParams) -> PathFollower {
        PathFollower::new(
            FollowerParams {
                operator,
                traj_ctrl,
                ..Default::default()
            },
            None,
        )
        .unwrap()
    }

    fn autonomous() -> OperatorParams {
        OperatorParams {
            autonomy_at_start: true,
            initial_goal_m: [10.0, 0.0, 1.0],
            ..Default::default()
        }
    }

    fn pose_msg(t: f64, position: [f64; 3]) -> PoseMsg {
        PoseMsg {
            time_s: t,
            position_m: position,
            orientation_q: [0.0, 0.0, 0.0, 1.0],
            lin_vel_ms: Some([0.3, 0.0, 0.0]),
            ang_vel_rads: None,
        }
    }

    fn kinds(outputs: &[OutputMsg]) -> Vec<&'static str> {
        outputs.iter().map(|o| o.kind()).collect()
    }

    #[test]
    fn test_control_cycle_outputs() {
        let mut f = follower(autonomous(), TrajCtrlParams::default());

        let out = f.on_pose(&pose_msg(1.0, [0.0, 0.0, 1.0])).unwrap();
        assert_eq!(kinds(&out), vec!["Control", "TrackPose", "AutoMode"]);

        match &out[1] {
            OutputMsg::TrackPose(tp) => {
                assert_eq!(tp.roll_rad, 0.0);
                assert_eq!(tp.vehicle_vel_ms, [0.3, 0.0, 0.0]);
            }
            _ => panic!("Expected a track pose"),
        }

        // A plan for the cycle that just ran is accepted
        let tp = f
            .on_path(&PathMsg {
                time_s: 1.0,
                points_m: (0..10).map(|i| [i as f64 * 0.1, 0.0, 0.0]).collect(),
            })
            .unwrap()
            .unwrap();
        assert_eq!(tp.points_m.len(), 10);
        assert!(f.ctrl().path_found());
    }

    #[test]
    fn test_path_before_pose_ignored() {
        let mut f = follower(autonomous(), TrajCtrlParams::default());
        let tp = f
            .on_path(&PathMsg {
                time_s: 1.0,
                points_m: vec![[0.0; 3], [0.1, 0.0, 0.0]],
            })
            .unwrap();
        assert!(tp.is_none());
    }

    #[test]
    fn test_pose_skip() {
        let params = TrajCtrlParams {
            pose_skip_num: 2,
            ..Default::default()
        };
        let mut f = follower(autonomous(), params);

        let cycles: Vec<bool> = (0..6)
            .map(|i| !f.on_pose(&pose_msg(i as f64, [0.0; 3])).unwrap().is_empty())
            .collect();
        assert_eq!(cycles, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn test_goal_shifted_at_start() {
        let op = OperatorParams {
            shift_goal_at_start: true,
            state_init_delay: 2,
            ..autonomous()
        };
        let mut f = follower(op, TrajCtrlParams::default());

        assert!(f.on_pose(&pose_msg(0.0, [1.0, 1.0, 0.0])).unwrap().is_empty());
        assert!(f.on_pose(&pose_msg(0.1, [1.0, 1.0, 0.0])).unwrap().is_empty());

        let out = f.on_pose(&pose_msg(0.2, [2.0, 3.0, 0.5])).unwrap();
        assert_eq!(out[0].kind(), "Waypoint");
        assert_eq!(f.goal_m(), Vector3::new(12.0, 3.0, 1.5));
    }

    #[test]
    fn test_speed_override_after_joystick() {
        let mut f = follower(OperatorParams::default(), TrajCtrlParams::default());

        f.on_operator(&OperatorMsg {
            time_s: 1.0,
            fwd: 0.8,
            left: 0.0,
            up: 0.0,
            yaw: 0.0,
            mode: ModeSelect::Assisted,
            clear_cloud: false,
        });
        assert_eq!(f.operator().mode(), Mode::Assisted);
        assert!((f.desired_speed_ms() - 1.6).abs() < 1e-12);

        // Too soon after the joystick
        f.on_speed(&SpeedMsg {
            time_s: 2.0,
            value: 0.5,
        });
        assert!((f.desired_speed_ms() - 1.6).abs() < 1e-12);

        f.on_speed(&SpeedMsg {
            time_s: 3.5,
            value: 0.5,
        });
        assert!((f.desired_speed_ms() - 1.0).abs() < 1e-12);
    }
}
