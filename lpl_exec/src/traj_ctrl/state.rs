//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use nalgebra::Vector3;
use serde::Serialize;
use util::{maths::wrap_pi, module::State};

use super::*;
use crate::{
    loc::{Pose, TrackPose},
    operator::{Axes, Mode},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control, owning the track path and the control laws.
#[derive(Debug, Default)]
pub struct TrajCtrl {
    params: Option<TrajCtrlParams>,

    track_path: TrackPathStitcher,
    pursuit: PursuitController,
    rotate: RotateInPlace,

    /// The last spliced path had more than one point
    path_found: bool,

    /// Time the auto-mode scalar was last emitted
    auto_mode_time_s: Option<f64>,
}

/// Input to one control cycle.
#[derive(Debug, Clone, Copy)]
pub struct CtrlInput {
    pub time_s: f64,
    pub pose: Pose,
    pub goal_m: Vector3<f64>,

    pub mode: Mode,
    pub axes: Axes,
    pub deadband: f64,

    pub desired_speed_ms: f64,
}

/// Output of one control cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CtrlOutput {
    pub cmd: ControlCmd,

    /// The pursuit target, which is the frame the next plan is made in
    pub track_pose: TrackPose,

    /// The mode after the rotate in place machine has run
    pub mode: Mode,

    /// The axes after the rotate in place machine has run
    pub axes: Axes,

    /// Auto-mode scalar to emit this cycle
    pub auto_mode: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub pursuit: PursuitReport,
    pub dis_to_goal_m: f64,
    pub dir_to_goal_rad: f64,
    pub rotate_state: Option<RotateState>,
    pub path_found: bool,
    pub manual: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TrajCtrl {
    type InitData = TrajCtrlParams;
    type InitError = TrajCtrlError;

    type InputData = CtrlInput;
    type OutputData = CtrlOutput;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    fn init(&mut self, params: Self::InitData) -> Result<(), Self::InitError> {
        if !(params.max_speed_ms > 0.0 && params.min_speed_ms <= params.max_speed_ms) {
            return Err(TrajCtrlError::InvalidParams(
                "speeds must satisfy 0 < min_speed_ms <= max_speed_ms".into(),
            ));
        }
        if !(params.slow_dis_m > params.stop_dis_m) {
            return Err(TrajCtrlError::InvalidParams(
                "slow_dis_m must be greater than stop_dis_m".into(),
            ));
        }
        if params.stop_rot_yaw2_deg > params.stop_rot_yaw1_deg {
            return Err(TrajCtrlError::InvalidParams(
                "stop_rot_yaw2_deg must not exceed stop_rot_yaw1_deg".into(),
            ));
        }

        *self = Self {
            params: Some(params),
            ..Default::default()
        };

        Ok(())
    }

    fn proc(
        &mut self,
        input: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let params = self.params.as_ref().ok_or(TrajCtrlError::NotInitialised)?;
        let pose = &input.pose;
        let t = input.time_s;

        let mut mode = input.mode;
        let mut axes = input.axes;
        let mut report = StatusReport {
            path_found: self.path_found,
            ..Default::default()
        };

        // ---- ROTATE IN PLACE ----

        let to_goal = input.goal_m - pose.position_m;
        let dis_to_goal = to_goal.x.hypot(to_goal.y);
        let dir_to_goal = wrap_pi(to_goal.y.atan2(to_goal.x) - pose.yaw_rad);
        report.dis_to_goal_m = dis_to_goal;
        report.dir_to_goal_rad = dir_to_goal;

        let was_rotating = self.rotate.is_rotating();
        if let Some(a) = self
            .rotate
            .update(t, dir_to_goal, dis_to_goal, mode.is_autonomous(), params)
        {
            axes = a;
        }
        if mode.is_autonomous() {
            if self.rotate.is_rotating() {
                mode = Mode::AutoAdjust;
            } else if was_rotating {
                mode = Mode::Autonomous;
            }
            report.rotate_state = Some(self.rotate.state());
        }

        let mut auto_mode = None;
        if mode.is_autonomous() {
            let due = self
                .auto_mode_time_s
                .map(|last| t - last > params.auto_mode_interval_s)
                .unwrap_or(true);
            if due {
                auto_mode = Some(if self.rotate.is_rotating() {
                    -1.0
                } else {
                    input.desired_speed_ms / params.max_speed_ms
                });
                self.auto_mode_time_s = Some(t);
            }
        }

        // ---- CONTROL ----

        let track_position;
        let cmd;
        if mode.bypasses_pursuit() {
            cmd = self.pursuit.manual_cmd(pose, &axes, params);
            track_position = pose.position_m;
            report.manual = true;
        } else {
            let pursuit_input = PursuitInput {
                time_s: t,
                pose,
                axes: &axes,
                deadband: input.deadband,
                desired_speed_ms: input.desired_speed_ms,
                dis_to_goal_m: dis_to_goal,
                autonomous: mode.is_autonomous(),
                rotating: self.rotate.is_rotating(),
                path_found: self.path_found,
            };

            let (points, target_index) = self.track_path.points_and_target_mut();
            let (c, r) = self.pursuit.pursuit_cmd(&pursuit_input, points, target_index, params);
            cmd = c;
            report.pursuit = r;
            track_position = points[*target_index];
        }

        let track_yaw = self.pursuit.track_yaw_rad();
        self.track_path.record(t, track_yaw);

        let track_pose = TrackPose {
            position_m: track_position,
            pitch_rad: params.track_pitch_deg.to_radians(),
            yaw_rad: track_yaw,
        };

        debug!(
            "TrajCtrl {:?}: target {} of {}, cmd {:?}",
            mode,
            self.track_path.target_index(),
            self.track_path.points().len(),
            cmd
        );

        Ok((
            CtrlOutput {
                cmd,
                track_pose,
                mode,
                axes,
                auto_mode,
            },
            report,
        ))
    }
}

impl TrajCtrl {
    /// Splice a newly planned path into the track path.
    ///
    /// `pin` is the live vehicle pose, given when the operator is driving
    /// directly so the track path restarts from the vehicle.
    pub fn splice_path(
        &mut self,
        path_m: &[Vector3<f64>],
        time_s: f64,
        pin: Option<&Pose>,
    ) -> Result<Option<SpliceReport>, TrajCtrlError> {
        let params = self.params.as_ref().ok_or(TrajCtrlError::NotInitialised)?;

        let report = self.track_path.splice(
            path_m,
            time_s,
            params.track_pitch_deg.to_radians(),
            pin,
        );

        if let Some(r) = report {
            self.path_found = r.path_found;
        }

        Ok(report)
    }

    pub fn track_path(&self) -> &TrackPathStitcher {
        &self.track_path
    }

    pub fn path_found(&self) -> bool {
        self.path_found
    }

    pub fn params(&self) -> Option<&TrajCtrlParams> {
        self.params.as_ref()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn ctrl() -> TrajCtrl {
        let mut c = TrajCtrl::default();
        c.init(TrajCtrlParams::default()).unwrap();
        c
    }

    fn input(t: f64, pose: Pose, goal: [f64; 3], mode: Mode) -> CtrlInput {
        CtrlInput {
            time_s: t,
            pose,
            goal_m: Vector3::from(goal),
            mode,
            axes: Axes {
                fwd: 1.0,
                ..Default::default()
            },
            deadband: 0.1,
            desired_speed_ms: 1.0,
        }
    }

    fn straight(n: usize) -> Vec<Vector3<f64>> {
        (0..n).map(|i| Vector3::new(i as f64 * 0.05, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_follow_spliced_path() {
        let mut c = ctrl();
        let pose = Pose {
            position_m: Vector3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };

        // Nothing to follow yet, the path is ignored until a target has been
        // recorded
        assert!(c.splice_path(&straight(40), 0.0, None).unwrap().is_none());
        let (out, rpt) = c.proc(&input(0.0, pose, [10.0, 0.0, 1.0], Mode::Autonomous)).unwrap();
        assert!(rpt.pursuit.stopped);
        assert_eq!(out.cmd.pitch_rad, 0.0);

        let splice = c.splice_path(&straight(40), 0.0, None).unwrap().unwrap();
        assert!(splice.path_found);

        let (out, rpt) = c.proc(&input(0.1, pose, [10.0, 0.0, 1.0], Mode::Autonomous)).unwrap();
        assert!(!rpt.pursuit.stopped);
        assert_eq!(c.track_path().target_index(), 4);
        assert!((out.track_pose.position_m - Vector3::new(0.2, 0.0, 1.0)).norm() < 1e-9);
        assert!(out.cmd.pitch_rad > 0.0);

        // First cycle in autonomy emits the auto-mode scalar
        assert_eq!(out.auto_mode, Some(0.5));
    }

    #[test]
    fn test_auto_mode_throttled() {
        let mut c = ctrl();
        let goal = [10.0, 0.0, 0.0];

        let (out, _) = c.proc(&input(1.0, Pose::default(), goal, Mode::Autonomous)).unwrap();
        assert!(out.auto_mode.is_some());

        let (out, _) = c.proc(&input(1.05, Pose::default(), goal, Mode::Autonomous)).unwrap();
        assert!(out.auto_mode.is_none());

        let (out, _) = c.proc(&input(1.1, Pose::default(), goal, Mode::Autonomous)).unwrap();
        assert!(out.auto_mode.is_some());

        // Never outside autonomy
        let (out, _) = c.proc(&input(2.0, Pose::default(), goal, Mode::Assisted)).unwrap();
        assert!(out.auto_mode.is_none());
    }

    #[test]
    fn test_rotate_in_place_switches_mode() {
        let mut c = ctrl();

        // Goal behind the vehicle
        let (out, rpt) = c
            .proc(&input(5.0, Pose::default(), [-10.0, 0.0, 0.0], Mode::Autonomous))
            .unwrap();
        assert_eq!(out.mode, Mode::AutoAdjust);
        assert_eq!(rpt.rotate_state, Some(RotateState::Rotating));
        assert_eq!(out.auto_mode, Some(-1.0));

        // Rotating bypasses pursuit and yaws on the spot
        let (out, rpt) = c
            .proc(&input(5.5, Pose::default(), [-10.0, 0.0, 0.0], out.mode))
            .unwrap();
        assert!(rpt.manual);
        assert_eq!(out.axes.fwd, 0.0);
        assert!(out.cmd.yaw_rate_rads.abs() > 0.0);

        // Facing the goal
        let facing = Pose {
            yaw_rad: std::f64::consts::PI,
            ..Default::default()
        };
        let (out, _) = c.proc(&input(6.0, facing, [-10.0, 0.0, 0.0], out.mode)).unwrap();
        assert_eq!(out.mode, Mode::Autonomous);
        assert_eq!(out.axes.fwd, 1.0);
    }

    #[test]
    fn test_manual_pins_track_to_vehicle() {
        let mut c = ctrl();
        let pose = Pose {
            position_m: Vector3::new(3.0, 4.0, 5.0),
            yaw_rad: 1.0,
            ..Default::default()
        };

        let (out, rpt) = c.proc(&input(1.0, pose, [0.0, 0.0, 0.0], Mode::Manual)).unwrap();
        assert!(rpt.manual);
        assert_eq!(out.track_pose.position_m, pose.position_m);
        assert_eq!(out.track_pose.yaw_rad, 1.0);
    }

    #[test]
    fn test_uninitialised() {
        let mut c = TrajCtrl::default();
        assert!(c
            .proc(&input(0.0, Pose::default(), [0.0; 3], Mode::Manual))
            .is_err());
        assert!(c.splice_path(&straight(3), 0.0, None).is_err());
    }
}
