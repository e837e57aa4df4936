//! # Data Store
//!
//! Owns the planner and the follower and carries data between them. Inputs
//! are routed by [`crate::input_processor`], planning runs on the exec's
//! tick, and everything produced is queued here until the exec publishes it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::{InputMsg, OutputMsg};
use log::warn;
use nalgebra::Vector3;

use crate::{
    follower::PathFollower,
    input_processor,
    loc::TrackPose,
    params::ExecParams,
    planner::LocalPlanner,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    pub planner: LocalPlanner,
    pub follower: PathFollower,

    /// Outputs waiting to be published
    outputs: Vec<OutputMsg>,

    publish_free_paths: bool,
    publish_track_path: bool,

    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// Number of plans made
    pub num_plans: u64,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(planner: LocalPlanner, follower: PathFollower, params: &ExecParams) -> Self {
        Self {
            planner,
            follower,
            outputs: Vec::new(),
            publish_free_paths: params.publish_free_paths,
            publish_track_path: params.publish_track_path,
            num_cycles: 0,
            num_plans: 0,
            num_consec_cycle_overruns: 0,
        }
    }

    /// Handle one input.
    pub fn handle(&mut self, msg: &InputMsg) {
        input_processor::exec(self, msg)
    }

    /// Plan on the latest obstacle cloud, if a new one has arrived, and
    /// splice the plan into the follower's track path.
    pub fn plan_tick(&mut self) {
        let plan = match self.planner.plan() {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                warn!("Error during planning: {}", e);
                return;
            }
        };
        self.num_plans += 1;

        match self.follower.on_path(&plan.path) {
            Ok(Some(track_path)) => {
                if self.publish_track_path {
                    self.outputs.push(OutputMsg::TrackPath(track_path));
                }
            }
            Ok(None) => (),
            Err(e) => warn!("Could not splice the path: {}", e),
        }

        self.outputs.push(OutputMsg::Path(plan.path));
        if let Some(free_paths) = plan.free_paths {
            if self.publish_free_paths {
                self.outputs.push(OutputMsg::FreePaths(free_paths));
            }
        }
    }

    /// Queue outputs from the follower, feeding those the planner depends on
    /// back into it.
    pub(crate) fn push_follower_outputs(&mut self, outputs: Vec<OutputMsg>) {
        for msg in outputs.iter() {
            match msg {
                OutputMsg::TrackPose(tp) => self.planner.set_track_pose(TrackPose::from(tp)),
                OutputMsg::AutoMode(am) => self.planner.on_auto_mode(am.value),
                OutputMsg::Waypoint(goal) => self.planner.set_goal(Vector3::from(goal.point)),
                _ => (),
            }
        }

        self.outputs.extend(outputs);
    }

    /// Take every output queued since the last call.
    pub fn take_outputs(&mut self) -> Vec<OutputMsg> {
        std::mem::take(&mut self.outputs)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        follower::FollowerParams,
        operator::OperatorParams,
        path_lib::{LibraryDims, PathLibrary},
        per::PerParams,
        planner::PlannerParams,
    };
    use comms_if::msg::{CloudMsg, GoalMsg, PoseMsg};
    use std::sync::Arc;

    fn data_store() -> DataStore {
        let dims = LibraryDims {
            path_num: 25,
            group_num: 5,
            display_path_stride: 1,
            ..Default::default()
        };
        let lib = Arc::new(PathLibrary::generate_fan(dims).unwrap());

        let operator = OperatorParams {
            autonomy_at_start: true,
            initial_goal_m: [10.0, 0.0, 1.0],
            ..Default::default()
        };

        let planner = LocalPlanner::new(
            PlannerParams {
                per: PerParams {
                    system_init_delay: 0,
                    ..Default::default()
                },
                operator: operator.clone(),
                ..Default::default()
            },
            lib,
        )
        .unwrap();
        let follower = PathFollower::new(
            FollowerParams {
                operator,
                ..Default::default()
            },
            None,
        )
        .unwrap();

        DataStore::new(planner, follower, &ExecParams::default())
    }

    fn pose(t: f64) -> InputMsg {
        InputMsg::Pose(PoseMsg {
            time_s: t,
            position_m: [0.0, 0.0, 1.0],
            orientation_q: [0.0, 0.0, 0.0, 1.0],
            lin_vel_ms: None,
            ang_vel_rads: None,
        })
    }

    fn kinds(outputs: &[OutputMsg]) -> Vec<&'static str> {
        outputs.iter().map(|o| o.kind()).collect()
    }

    #[test]
    fn test_end_to_end() {
        let mut ds = data_store();

        // First control cycle, holding at the start of the track path
        ds.handle(&pose(0.0));
        let out = ds.take_outputs();
        assert_eq!(kinds(&out), vec!["Control", "TrackPose", "AutoMode"]);
        assert_eq!(ds.planner.track_pose().position_m, Vector3::new(0.0, 0.0, 1.0));

        // Nothing to plan on yet
        ds.plan_tick();
        assert!(ds.take_outputs().is_empty());

        ds.handle(&InputMsg::Cloud(CloudMsg {
            time_s: 0.0,
            points_m: vec![[0.0, 0.0, 3.5]],
        }));
        ds.plan_tick();
        let out = ds.take_outputs();
        assert_eq!(kinds(&out), vec!["TrackPath", "Path", "FreePaths"]);
        assert_eq!(ds.num_plans, 1);

        match &out[1] {
            OutputMsg::Path(p) => {
                assert_eq!(p.time_s, 0.0);
                assert!(p.points_m.len() > 1);
                assert!(p.points_m.iter().all(|q| q[1].abs() < 1e-9));
            }
            _ => panic!("Expected a path"),
        }

        // One plan per cloud
        ds.plan_tick();
        assert!(ds.take_outputs().is_empty());

        // The next control cycle follows the plan forward
        ds.handle(&pose(0.1));
        let out = ds.take_outputs();
        match &out[0] {
            OutputMsg::Control(c) => assert!(c.pitch_rad > 0.0),
            _ => panic!("Expected a control command"),
        }
        assert!(ds.follower.ctrl().path_found());
    }

    #[test]
    fn test_goal_routed_to_both() {
        let mut ds = data_store();

        ds.handle(&InputMsg::Goal(GoalMsg {
            time_s: 0.0,
            point: [1.0, 2.0, 8.0],
        }));

        assert_eq!(ds.follower.goal_m(), Vector3::new(1.0, 2.0, 8.0));
        assert_eq!(ds.planner.goal_m(), Vector3::new(1.0, 2.0, 5.0));
    }
}
