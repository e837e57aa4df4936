//! # Path selection module
//!
//! Chooses one group of the path library to drive along, given the obstacle
//! cloud and the goal, both expressed in the track frame.
//!
//! Each selection runs one or more passes, each at a trial scale applied to
//! the whole library. In each pass obstacle points are looked up in the
//! correspondence grid to count how many points fall on each path. Paths
//! with too many points, or which end outside the sensor's field of view,
//! are blocked. Every remaining path adds a score to its group based on how
//! well its end direction matches the direction of the goal. If no group
//! scores anything the trial scale is reduced and the pass repeated, so the
//! vehicle falls back to shorter paths in cluttered space.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
pub use params::PathSelParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use log::{debug, trace};
use nalgebra::Vector3;
use serde::Serialize;
use util::{
    maths::{clamp_sym, wrap_180},
    module::State,
};

use crate::{
    loc::{Pose, TrackPose},
    operator::{Axes, Mode},
    path_lib::PathLibrary,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Goal distance used when steering by joystick
pub const FAR_GOAL_DIS_M: f64 = 1000.0;

/// Added to the score of every unblocked path so that a group of paths
/// pointing directly away from the goal still counts as free.
const SCORE_EPSILON: f64 = 1e-6;

/// Tolerance on the number of scale passes
const PASS_COUNT_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The path selector.
#[derive(Default)]
pub struct PathSelector {
    params: Option<PathSelParams>,
    lib: Option<Arc<PathLibrary>>,

    /// Number of obstacle points on each path in the current pass
    path_counts: Vec<u32>,

    /// Accumulated score of each group in the current pass
    group_scores: Vec<f64>,
}

/// Input to one selection.
#[derive(Debug, Clone)]
pub struct SelectionInput {
    /// Time of the obstacle cloud
    pub time_s: f64,

    /// Obstacle points in the track frame
    pub cloud_m: Vec<Vector3<f64>>,

    /// The goal in the global frame
    pub goal_m: Vector3<f64>,

    /// The frame the cloud is expressed in
    pub track: TrackPose,

    /// The vehicle pose the cloud was captured at
    pub vehicle: Pose,

    /// Pitch of the depth camera relative to the vehicle body
    pub sensor_pitch_offset_rad: f64,

    pub mode: Mode,
    pub axes: Axes,
}

/// The result of a selection.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    /// Time of the cloud the selection was made from
    pub time_s: f64,

    /// The selected start path in the track frame, scaled and truncated. A
    /// single point at the origin means the vehicle should hold position.
    pub path_m: Vec<Vector3<f64>>,

    /// Index of the selected group
    pub group: Option<usize>,

    /// Trial scale of the last pass
    pub scale: f64,

    /// Display points of every unblocked path in the final pass, as
    /// `[x, y, z, intensity]`
    pub free_paths: Vec<[f64; 4]>,
}

/// The goal as seen from the track point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RelativeGoal {
    /// Forward coordinate in the track frame
    pub x_m: f64,

    /// Horizontal distance in the track frame
    pub dis_m: f64,

    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub num_passes: usize,
    pub selected_group: Option<usize>,
    pub final_scale: f64,
    pub relative_goal: RelativeGoal,

    /// A group was free but the goal has been reached
    pub goal_reached: bool,

    /// Obstacle points which passed the gate in the last pass
    pub num_gated_points: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathSelError {
    #[error("The path selector has not been initialised")]
    NotInitialised,

    #[error("Invalid path selection parameters: {0}")]
    InvalidParams(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for PathSelector {
    type InitData = (PathSelParams, Arc<PathLibrary>);
    type InitError = PathSelError;

    type InputData = SelectionInput;
    type OutputData = Selection;
    type StatusReport = StatusReport;
    type ProcError = PathSelError;

    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let (params, lib) = init_data;

        if !(params.min_path_scale > 0.0) {
            return Err(PathSelError::InvalidParams(
                "min_path_scale must be positive".into(),
            ));
        }
        if !(params.path_scale_step > 0.0) {
            return Err(PathSelError::InvalidParams(
                "path_scale_step must be positive".into(),
            ));
        }
        if params.lower_bound_z_m >= params.upper_bound_z_m {
            return Err(PathSelError::InvalidParams(
                "lower_bound_z_m must be below upper_bound_z_m".into(),
            ));
        }

        self.path_counts = vec![0; lib.path_num()];
        self.group_scores = vec![0.0; lib.group_num()];
        self.params = Some(params);
        self.lib = Some(lib);

        Ok(())
    }

    fn proc(
        &mut self,
        input: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let params = self.params.as_ref().ok_or(PathSelError::NotInitialised)?;
        let lib = self.lib.clone().ok_or(PathSelError::NotInitialised)?;

        let goal = relative_goal(params, &input.track, &input.goal_m);
        let steer = steering_goal(params, &goal, input.mode, &input.axes);

        let nominal_scale = nominal_scale(params, input.mode, input.axes.fwd);
        let num_passes = num_passes(params, nominal_scale);

        let mut report = StatusReport {
            relative_goal: goal,
            final_scale: nominal_scale,
            ..Default::default()
        };
        let mut selection = Selection {
            time_s: input.time_s,
            path_m: vec![Vector3::zeros()],
            group: None,
            scale: nominal_scale,
            free_paths: Vec::new(),
        };

        let goal_behind = goal.x_m < 0.0;
        let thre = params.point_per_path_thre;

        // Vehicle attitude at the time of the cloud, for the sensor cone
        let veh_pitch_deg = input.vehicle.pitch_rad.to_degrees();
        let veh_yaw_deg = input.vehicle.yaw_rad.to_degrees();
        let track_pitch_deg = input.track.pitch_rad.to_degrees();
        let track_yaw_deg = input.track.yaw_rad.to_degrees();
        let cam_pitch_deg = input.sensor_pitch_offset_rad.to_degrees();

        for pass in 0..num_passes {
            let scale = nominal_scale - pass as f64 * params.path_scale_step;
            report.num_passes = pass + 1;
            report.final_scale = scale;
            selection.scale = scale;

            self.path_counts.iter_mut().for_each(|c| *c = 0);
            self.group_scores.iter_mut().for_each(|s| *s = 0.0);

            // Count obstacle points on each path
            let range = (steer.dis_m + params.stop_dis_m) / scale;
            let mut num_gated = 0;
            for point in input.cloud_m.iter() {
                let p = point / scale;

                let in_range = p.x > 0.0 && (p.x.hypot(p.y) <= range || goal_behind);
                let in_band = p.z > params.lower_bound_z_m / scale
                    && p.z < params.upper_bound_z_m / scale;
                if !(in_range && in_band) {
                    continue;
                }
                num_gated += 1;

                if let Some(voxel) = lib.dims().voxel_index(&p) {
                    for path_id in lib.grid().paths_at(voxel) {
                        self.path_counts[*path_id as usize] += 1;
                    }
                }
            }
            report.num_gated_points = num_gated;

            // Block paths outside the sensor's view and score the rest
            for (path_id, m) in lib.metrics().iter().enumerate() {
                let pitch_diff =
                    (m.end_pitch_deg + track_pitch_deg - veh_pitch_deg - cam_pitch_deg).abs();
                let yaw_diff = wrap_180(track_yaw_deg + m.end_yaw_deg - veh_yaw_deg).abs();
                let elev = input.track.position_m.z + m.end_z_m;

                if yaw_diff > params.sensor_max_yaw_deg
                    || pitch_diff > params.sensor_max_pitch_deg
                    || elev > params.max_elev_m
                {
                    self.path_counts[path_id] += thre;
                    continue;
                }

                if self.path_counts[path_id] < thre {
                    let d_pitch = (steer.pitch_deg - m.end_pitch_deg)
                        .abs()
                        .min(params.pitch_diff_limit_deg);
                    let d_yaw = wrap_180(steer.yaw_deg - m.end_yaw_deg).abs();

                    let score = (1.0 - params.pitch_weight * d_pitch).max(0.0)
                        * (1.0 - params.yaw_weight * d_yaw).max(0.0);

                    self.group_scores[m.group_id] += score + SCORE_EPSILON;
                }
            }

            // Strict maximum, the first of equal groups wins
            let mut selected = None;
            let mut max_score = 0.0;
            for (g, score) in self.group_scores.iter().enumerate() {
                if *score > max_score {
                    max_score = *score;
                    selected = Some(g);
                }
            }

            trace!(
                "Pass {} at scale {:.3}: {} gated points, group {:?} scored {:.4}",
                pass,
                scale,
                num_gated,
                selected,
                max_score
            );

            let group = match selected {
                Some(g) => g,
                None => continue,
            };
            report.selected_group = Some(group);

            if steer.dis_m <= params.stop_dis_m && !(goal.x_m > 0.0) {
                report.goal_reached = true;
                break;
            }

            selection.group = Some(group);
            selection.path_m = truncated_start_path(&lib, group, scale, steer.dis_m, goal_behind);

            if params.compute_free_paths && lib.has_display_paths() {
                selection.free_paths = self.free_paths(&lib, scale, range, goal_behind);
            }

            break;
        }

        debug!(
            "Selected group {:?} at scale {:.3} after {} passes ({} path points)",
            selection.group,
            selection.scale,
            report.num_passes,
            selection.path_m.len()
        );

        Ok((selection, report))
    }
}

impl PathSelector {
    pub fn params(&self) -> Option<&PathSelParams> {
        self.params.as_ref()
    }

    /// Display points of every path left unblocked by the last pass.
    fn free_paths(
        &self,
        lib: &PathLibrary,
        scale: f64,
        range: f64,
        goal_behind: bool,
    ) -> Vec<[f64; 4]> {
        let thre = self.params.as_ref().map(|p| p.point_per_path_thre).unwrap_or(0);

        self.path_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count < thre)
            .flat_map(|(path_id, _)| lib.display_path(path_id).iter())
            .filter(|p| p[0].hypot(p[1]) <= range || goal_behind)
            .map(|p| [p[0] * scale, p[1] * scale, p[2] * scale, p[3]])
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the goal relative to the track point, clamping the bearing into
/// the configured limits.
pub fn relative_goal(
    params: &PathSelParams,
    track: &TrackPose,
    goal_m: &Vector3<f64>,
) -> RelativeGoal {
    let g = track.to_track_frame(goal_m);
    let dis_m = g.x.hypot(g.y);

    RelativeGoal {
        x_m: g.x,
        dis_m,
        pitch_deg: clamp_sym(-g.z.atan2(dis_m).to_degrees(), params.pitch_diff_limit_deg),
        yaw_deg: clamp_sym(g.y.atan2(g.x).to_degrees(), params.yaw_diff_limit_deg),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The goal the selection steers to. Outside of autonomous goal seeking this
/// is a far away point in the direction of the joystick.
fn steering_goal(params: &PathSelParams, goal: &RelativeGoal, mode: Mode, axes: &Axes) -> RelativeGoal {
    match mode {
        Mode::Autonomous => *goal,
        Mode::Manual | Mode::Assisted | Mode::AutoAdjust => RelativeGoal {
            x_m: goal.x_m,
            dis_m: FAR_GOAL_DIS_M,
            pitch_deg: -axes.up * params.pitch_diff_limit_deg,
            yaw_deg: axes.left * params.yaw_diff_limit_deg,
        },
    }
}

fn nominal_scale(params: &PathSelParams, mode: Mode, fwd: f64) -> f64 {
    let scale = if mode.bypasses_pursuit() {
        params.min_path_scale
    } else if params.path_scale_by_speed {
        params.path_scale * fwd
    } else {
        params.path_scale
    };

    scale.max(params.min_path_scale)
}

fn num_passes(params: &PathSelParams, nominal_scale: f64) -> usize {
    ((nominal_scale - params.min_path_scale) / params.path_scale_step + PASS_COUNT_EPSILON)
        .floor()
        .max(0.0) as usize
        + 1
}

/// The start path of a group at the given scale, cut at the goal unless the
/// goal is behind.
fn truncated_start_path(
    lib: &PathLibrary,
    group: usize,
    scale: f64,
    goal_dis_m: f64,
    goal_behind: bool,
) -> Vec<Vector3<f64>> {
    let limit = goal_dis_m / scale;

    lib.start_path(group)
        .iter()
        .take_while(|p| p.x.hypot(p.y) <= limit || goal_behind)
        .map(|p| p * scale)
        .collect()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::path_lib::LibraryDims;
    use approx::assert_relative_eq;

    /// Five groups fanned at -60, -30, 0, 30 and 60 degrees, five paths
    /// each. Group 2 points straight ahead.
    fn lib() -> Arc<PathLibrary> {
        let dims = LibraryDims {
            path_num: 25,
            group_num: 5,
            display_path_stride: 1,
            ..Default::default()
        };
        Arc::new(PathLibrary::generate_fan(dims).unwrap())
    }

    fn selector(lib: Arc<PathLibrary>) -> PathSelector {
        selector_with(PathSelParams::default(), lib)
    }

    fn selector_with(params: PathSelParams, lib: Arc<PathLibrary>) -> PathSelector {
        let mut sel = PathSelector::default();
        sel.init((params, lib)).unwrap();
        sel
    }

    fn input(goal: [f64; 3], cloud: Vec<Vector3<f64>>) -> SelectionInput {
        SelectionInput {
            time_s: 3.0,
            cloud_m: cloud,
            goal_m: Vector3::from(goal),
            track: TrackPose::default(),
            vehicle: Pose::default(),
            sensor_pitch_offset_rad: 0.0,
            mode: Mode::Autonomous,
            axes: Axes {
                fwd: 1.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_goal_ahead_empty_cloud() {
        let lib = lib();
        let mut sel = selector(lib.clone());

        let (out, rpt) = sel.proc(&input([10.0, 0.0, 0.0], vec![])).unwrap();

        assert_eq!(out.group, Some(2));
        assert_eq!(rpt.num_passes, 1);
        assert_relative_eq!(out.scale, 0.5);
        assert_eq!(out.time_s, 3.0);

        // Goal is far beyond the start path, nothing is cut
        let start = lib.start_path(2);
        assert_eq!(out.path_m.len(), start.len());
        for (p, s) in out.path_m.iter().zip(start.iter()) {
            assert!((p - s * 0.5).norm() < 1e-12);
        }

        assert!(!out.free_paths.is_empty());
    }

    #[test]
    fn test_truncated_at_goal() {
        let mut sel = selector(lib());

        // The start path is sampled every 0.05 m, at scale 0.5 samples
        // within 0.31 m of the vehicle are those up to 0.6 m unscaled
        let (out, _) = sel.proc(&input([0.31, 0.0, 0.0], vec![])).unwrap();
        assert_eq!(out.group, Some(2));
        assert_eq!(out.path_m.len(), 13);
        assert!(out.path_m.iter().all(|p| p.x <= 0.31));
    }

    #[test]
    fn test_blocked_forward_group() {
        let lib = lib();
        let mut sel = selector(lib.clone());

        // Three points where all forward paths leave their shared start path
        let junction = lib.start_path(2)[lib.start_path(2).len() - 1] * 0.5;
        let thre = PathSelParams::default().point_per_path_thre as usize;
        let cloud = vec![junction; thre + 1];

        let (out, rpt) = sel.proc(&input([10.0, 0.0, 0.0], cloud)).unwrap();

        assert!(out.group.is_some());
        assert_ne!(out.group, Some(2));
        assert_eq!(rpt.num_passes, 1);
        assert_eq!(rpt.num_gated_points, thre + 1);
    }

    #[test]
    fn test_goal_behind_not_truncated() {
        let lib = lib();
        let params = PathSelParams {
            stop_dis_m: 0.1,
            ..Default::default()
        };
        let mut sel = selector_with(params, lib.clone());

        // Were the goal ahead the path would be cut at 0.3 m
        let (out, rpt) = sel.proc(&input([-0.3, 0.0, 0.0], vec![])).unwrap();

        assert!(rpt.relative_goal.x_m < 0.0);
        assert!(!rpt.goal_reached);
        assert_relative_eq!(rpt.relative_goal.yaw_deg, 60.0);

        // The 60 degree group is outside the sensor, so the 30 degree one is
        // the best remaining choice
        let group = out.group.unwrap();
        assert_eq!(group, 3);
        assert_eq!(out.path_m.len(), lib.start_path(group).len());
    }

    #[test]
    fn test_sensor_cone_respected() {
        let lib = lib();
        let mut sel = selector(lib.clone());
        let params = PathSelParams::default();

        // Vehicle has yawed 50 degrees left of the track, the forward group is
        // no longer visible to the camera
        let mut inp = input([10.0, 0.0, 0.0], vec![]);
        inp.vehicle.yaw_rad = 50f64.to_radians();

        let (out, _) = sel.proc(&inp).unwrap();
        let group = out.group.unwrap();
        assert!(group == 3 || group == 4, "group {}", group);

        // At least one path of the group is inside the camera's view
        assert!(lib
            .metrics()
            .iter()
            .filter(|m| m.group_id == group)
            .any(|m| wrap_180(m.end_yaw_deg - 50.0).abs() <= params.sensor_max_yaw_deg));
    }

    #[test]
    fn test_scale_fallback_exhausted() {
        let mut sel = selector(lib());

        // Vehicle pitched far down, every path is outside the camera's view
        let mut inp = input([10.0, 0.0, 0.0], vec![]);
        inp.vehicle.pitch_rad = 60f64.to_radians();

        let (out, rpt) = sel.proc(&inp).unwrap();

        // 0.5 down to 0.25 in 0.125 steps
        assert_eq!(rpt.num_passes, 3);
        assert_relative_eq!(rpt.final_scale, 0.25);
        assert_eq!(out.group, None);
        assert_eq!(out.path_m, vec![Vector3::zeros()]);
        assert!(out.free_paths.is_empty());
    }

    #[test]
    fn test_goal_reached_holds() {
        let mut sel = selector(lib());

        let (out, rpt) = sel.proc(&input([-0.1, 0.0, 0.0], vec![])).unwrap();

        assert!(rpt.goal_reached);
        assert!(rpt.selected_group.is_some());
        assert_eq!(out.group, None);
        assert_eq!(out.path_m, vec![Vector3::zeros()]);
    }

    #[test]
    fn test_manual_steers_by_joystick() {
        let mut sel = selector(lib());

        let mut inp = input([10.0, 0.0, 0.0], vec![]);
        inp.mode = Mode::Manual;
        inp.axes = Axes {
            fwd: 1.0,
            left: 1.0,
            ..Default::default()
        };

        let (out, rpt) = sel.proc(&inp).unwrap();

        assert_relative_eq!(out.scale, 0.25);
        assert_eq!(rpt.num_passes, 1);
        // Full left is 60 degrees, beyond the camera, so the 30 degree group
        assert_eq!(out.group, Some(3));
    }

    #[test]
    fn test_scale_by_speed() {
        let params = PathSelParams::default();
        assert_relative_eq!(nominal_scale(&params, Mode::Autonomous, 1.0), 0.5);
        assert_relative_eq!(nominal_scale(&params, Mode::Autonomous, 0.1), 0.25);
        assert_relative_eq!(nominal_scale(&params, Mode::AutoAdjust, 1.0), 0.25);

        assert_eq!(num_passes(&params, 0.5), 3);
        assert_eq!(num_passes(&params, 0.25), 1);
        assert_eq!(num_passes(&params, 0.3), 1);
    }

    #[test]
    fn test_relative_goal_clamped() {
        let params = PathSelParams::default();
        let track = TrackPose {
            position_m: Vector3::new(1.0, 1.0, 0.0),
            yaw_rad: std::f64::consts::FRAC_PI_2,
            ..Default::default()
        };

        // Goal 2 m ahead of a track facing +y, and 10 m up
        let g = relative_goal(&params, &track, &Vector3::new(1.0, 3.0, 10.0));
        assert_relative_eq!(g.x_m, 2.0, epsilon = 1e-9);
        assert_relative_eq!(g.dis_m, 2.0, epsilon = 1e-9);
        assert_relative_eq!(g.yaw_deg, 0.0, epsilon = 1e-9);
        assert_relative_eq!(g.pitch_deg, -35.0);
    }

    #[test]
    fn test_uninitialised() {
        let mut sel = PathSelector::default();
        assert!(sel.proc(&input([1.0, 0.0, 0.0], vec![])).is_err());
    }
}
