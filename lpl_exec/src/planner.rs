//! # Local planner
//!
//! The planning side of the executable. Keeps a short history of vehicle
//! poses so that each depth cloud can be placed using the pose it was
//! captured at, turns clouds into obstacle clouds, and runs path selection
//! once per new obstacle cloud in the frame of the latest track pose
//! reported by the follower.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::msg::{CloudMsg, FreePathsMsg, GoalMsg, OperatorMsg, PathMsg, PoseMsg};
use log::{debug, info, trace};
use nalgebra::Vector3;
use util::module::State;

use crate::{
    loc::{LocError, LocParams, Pose, TrackPose},
    operator::{OperatorParams, OperatorState},
    path_lib::PathLibrary,
    path_sel::{self, PathSelError, PathSelParams, PathSelector, SelectionInput},
    per::{CloudInput, CloudPreprocessor, ObstacleCloud, PerError, PerParams},
    time_sync::TimeSyncBuffer,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Capacity of the pose history.
pub const POSE_HISTORY_LEN: usize = 400;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the planner is initialised from.
#[derive(Debug, Clone, Default)]
pub struct PlannerParams {
    pub loc: LocParams,
    pub per: PerParams,
    pub path_sel: PathSelParams,
    pub operator: OperatorParams,
}

pub struct LocalPlanner {
    loc_params: LocParams,

    /// Delay between a depth cloud's stamp and its capture
    cloud_delay_s: f64,

    /// Pitch of the depth camera on the body
    cam_pitch_offset_rad: f64,

    /// Goals are clamped to at most this elevation
    max_elev_m: f64,

    poses: TimeSyncBuffer<Pose>,
    per: CloudPreprocessor,
    path_sel: PathSelector,
    operator: OperatorState,

    goal_m: Vector3<f64>,
    track_pose: TrackPose,

    /// Obstacle cloud waiting for the next planning tick
    pending_cloud: Option<ObstacleCloud>,
}

/// The messages produced by one planning pass.
#[derive(Debug, Clone)]
pub struct Plan {
    pub path: PathMsg,

    /// Present if the selector produced any free paths
    pub free_paths: Option<FreePathsMsg>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Could not convert the pose: {0}")]
    LocError(#[from] LocError),

    #[error("Cloud preprocessing failed: {0}")]
    PerError(#[from] PerError),

    #[error("Path selection failed: {0}")]
    PathSelError(#[from] PathSelError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocalPlanner {
    pub fn new(params: PlannerParams, lib: Arc<PathLibrary>) -> Result<Self, PlannerError> {
        let mut per = CloudPreprocessor::default();
        let cloud_delay_s = params.per.depth_cloud_delay_s;
        let cam_pitch_offset_rad = params.per.depth_cam_pitch_offset_rad;
        per.init(params.per)?;

        let max_elev_m = params.path_sel.max_elev_m;
        let mut path_sel = PathSelector::default();
        path_sel.init((params.path_sel, lib))?;

        let mut goal_m = Vector3::from(params.operator.initial_goal_m);
        goal_m.z = goal_m.z.min(max_elev_m);

        Ok(Self {
            loc_params: params.loc,
            cloud_delay_s,
            cam_pitch_offset_rad,
            max_elev_m,
            poses: TimeSyncBuffer::new(POSE_HISTORY_LEN),
            per,
            path_sel,
            operator: OperatorState::new(&params.operator),
            goal_m,
            track_pose: TrackPose::default(),
            pending_cloud: None,
        })
    }

    /// Record a vehicle pose.
    pub fn on_pose(&mut self, msg: &PoseMsg) -> Result<(), PlannerError> {
        let pose = Pose::from_msg(msg, &self.loc_params)?;
        self.poses.insert(msg.time_s, pose);
        Ok(())
    }

    /// Preprocess a depth cloud, using the pose nearest to its capture time.
    ///
    /// Returns true if an obstacle cloud is now waiting to be planned on.
    /// Clouds arriving before any pose, or during the camera warm-up, are
    /// dropped.
    pub fn on_cloud(&mut self, msg: &CloudMsg) -> Result<bool, PlannerError> {
        let time_s = msg.time_s - self.cloud_delay_s;
        let pose = self.poses.nearest(time_s).map(|s| s.data);

        let input = CloudInput {
            time_s,
            points_m: msg.points_m.clone(),
            pose,
        };

        let (cloud, rpt) = self.per.proc(&input)?;

        if rpt.no_pose {
            trace!("Cloud at {:.3} s dropped, no pose yet", msg.time_s);
        }

        match cloud {
            Some(c) => {
                self.pending_cloud = Some(c);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace the goal, clamping its elevation.
    pub fn on_goal(&mut self, msg: &GoalMsg) {
        self.set_goal(Vector3::from(msg.point));
    }

    pub fn on_operator(&mut self, msg: &OperatorMsg) {
        let update = self.operator.apply(msg);
        if update.clear_cloud {
            self.per.clear_keep();
        }
    }

    /// Apply an auto-mode scalar, either external or from the follower.
    pub fn on_auto_mode(&mut self, value: f64) {
        self.operator.apply_auto_mode(value);
    }

    pub fn on_clear_cloud(&mut self) {
        info!("Clearing retained obstacle points");
        self.per.clear_keep();
    }

    /// Set the frame the next plan is made in.
    pub fn set_track_pose(&mut self, track_pose: TrackPose) {
        self.track_pose = track_pose;
    }

    pub fn set_goal(&mut self, mut goal_m: Vector3<f64>) {
        goal_m.z = goal_m.z.min(self.max_elev_m);
        debug!("Planner goal ({:.2}, {:.2}, {:.2})", goal_m.x, goal_m.y, goal_m.z);
        self.goal_m = goal_m;
    }

    /// Run path selection on the waiting obstacle cloud, if there is one.
    pub fn plan(&mut self) -> Result<Option<Plan>, PlannerError> {
        let cloud = match self.pending_cloud.take() {
            Some(c) => c,
            None => return Ok(None),
        };

        let track = self.track_pose;
        let input = SelectionInput {
            time_s: cloud.time_s,
            cloud_m: cloud
                .points_m
                .iter()
                .map(|p| track.to_track_frame(p))
                .collect(),
            goal_m: self.goal_m,
            track,
            vehicle: cloud.pose,
            sensor_pitch_offset_rad: self.cam_pitch_offset_rad,
            mode: self.operator.mode(),
            axes: self.operator.axes(),
        };

        let (selection, rpt) = self.path_sel.proc(&input)?;

        if rpt.goal_reached {
            trace!("Goal reached, holding");
        }

        let path = PathMsg {
            time_s: selection.time_s,
            points_m: selection.path_m.iter().map(|p| [p.x, p.y, p.z]).collect(),
        };
        let free_paths = if selection.free_paths.is_empty() {
            None
        } else {
            Some(FreePathsMsg {
                time_s: selection.time_s,
                points: selection.free_paths,
            })
        };

        Ok(Some(Plan { path, free_paths }))
    }

    pub fn goal_m(&self) -> Vector3<f64> {
        self.goal_m
    }

    pub fn operator(&self) -> &OperatorState {
        &self.operator
    }

    pub fn track_pose(&self) -> &TrackPose {
        &self.track_pose
    }

    /// Goal relative to the current track pose.
    pub fn relative_goal(&self) -> Option<path_sel::RelativeGoal> {
        self.path_sel
            .params()
            .map(|p| path_sel::relative_goal(p, &self.track_pose, &self.goal_m))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{operator::Mode, path_lib::LibraryDims};
    use comms_if::msg::ModeSelect;

    fn planner() -> LocalPlanner {
        let dims = LibraryDims {
            path_num: 25,
            group_num: 5,
            display_path_stride: 1,
            ..Default::default()
        };
        let lib = Arc::new(PathLibrary::generate_fan(dims).unwrap());

        let params = PlannerParams {
            per: PerParams {
                system_init_delay: 0,
                ..Default::default()
            },
            operator: OperatorParams {
                autonomy_at_start: true,
                initial_goal_m: [10.0, 0.0, 9.0],
                ..Default::default()
            },
            ..Default::default()
        };

        LocalPlanner::new(params, lib).unwrap()
    }

    fn pose_msg(t: f64) -> PoseMsg {
        PoseMsg {
            time_s: t,
            position_m: [0.0, 0.0, 0.0],
            orientation_q: [0.0, 0.0, 0.0, 1.0],
            lin_vel_ms: None,
            ang_vel_rads: None,
        }
    }

    #[test]
    fn test_goal_clamped() {
        let mut p = planner();
        assert_eq!(p.goal_m().z, 5.0);

        p.on_goal(&GoalMsg {
            time_s: 1.0,
            point: [1.0, 2.0, 3.0],
        });
        assert_eq!(p.goal_m(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_cloud_needs_pose() {
        let mut p = planner();
        let cloud = CloudMsg {
            time_s: 1.0,
            points_m: vec![[0.0, 0.0, 2.0]],
        };

        assert!(!p.on_cloud(&cloud).unwrap());
        assert!(p.plan().unwrap().is_none());

        p.on_pose(&pose_msg(1.0)).unwrap();
        assert!(p.on_cloud(&cloud).unwrap());

        // One plan per cloud
        assert!(p.plan().unwrap().is_some());
        assert!(p.plan().unwrap().is_none());
    }

    #[test]
    fn test_plan_straight_ahead() {
        let mut p = planner();
        p.on_pose(&pose_msg(1.0)).unwrap();

        // A single point well to the side, out of the way of the forward
        // group
        p.on_cloud(&CloudMsg {
            time_s: 1.0,
            points_m: vec![[3.0, 0.0, 1.0]],
        })
        .unwrap();
        let plan = p.plan().unwrap().unwrap();

        assert_eq!(plan.path.time_s, 1.0);
        assert!(plan.path.points_m.len() > 1);

        // Forward group, scaled to half size
        let last = plan.path.points_m[plan.path.points_m.len() - 1];
        assert!((last[0] - 0.5).abs() < 1e-6);
        assert!(last[1].abs() < 1e-6);
        assert!(plan.free_paths.is_some());
    }

    #[test]
    fn test_operator_clear_cloud() {
        let mut p = planner();
        assert_eq!(p.operator().mode(), Mode::Autonomous);

        p.on_operator(&OperatorMsg {
            time_s: 1.0,
            fwd: 0.0,
            left: 0.0,
            up: 0.0,
            yaw: 0.0,
            mode: ModeSelect::Manual,
            clear_cloud: true,
        });
        assert_eq!(p.operator().mode(), Mode::Manual);
        assert_eq!(p.per.num_kept(), 0);

        // Auto-mode is ignored outside autonomy
        p.on_auto_mode(-1.0);
        assert_eq!(p.operator().mode(), Mode::Manual);
    }
}
