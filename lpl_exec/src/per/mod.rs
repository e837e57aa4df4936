//! # Perception module
//!
//! Converts depth clouds from the depth camera into the obstacle cloud used
//! by path selection. Each incoming cloud is:
//!
//!  1. cropped to the camera's useful range,
//!  2. voxel downsampled,
//!  3. placed into the global frame using the camera extrinsics and the
//!     vehicle pose at the time the cloud was captured,
//!  4. merged with the points retained close to the vehicle in previous
//!     cycles (the camera cannot see directly underneath or beside the
//!     vehicle, so without these the planner would forget obstacles it is
//!     passing),
//!  5. pushed onto a short stack of recent clouds, which is merged and
//!     downsampled again to give the obstacle cloud.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod voxel;

pub use params::PerParams;
pub use voxel::voxel_downsample;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;

use log::{debug, trace};
use nalgebra::{Rotation3, Vector3};
use util::module::State;

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Depth cloud preprocessor.
#[derive(Debug, Default)]
pub struct CloudPreprocessor {
    params: Option<PerParams>,

    /// Clouds still to be discarded while the camera warms up
    init_countdown: u32,

    /// Points near the vehicle to carry into the next cycle
    keep: Vec<Vector3<f64>>,

    /// Downsampled keep set from the previous cycle
    keep_dwz: Vec<Vector3<f64>>,

    /// Recent downsampled clouds in the global frame
    stack: VecDeque<Vec<Vector3<f64>>>,
}

/// Input to the preprocessor.
#[derive(Debug, Clone, Default)]
pub struct CloudInput {
    /// Time the cloud was captured, already corrected for the camera delay
    pub time_s: f64,

    /// Points in the depth camera's optical frame (z forward, x right, y
    /// down)
    pub points_m: Vec<[f64; 3]>,

    /// The vehicle pose nearest to `time_s`, if any pose has been received
    pub pose: Option<Pose>,
}

/// An obstacle cloud ready for planning.
#[derive(Debug, Clone)]
pub struct ObstacleCloud {
    /// Capture time of the newest cloud in the stack
    pub time_s: f64,

    /// Pose of the vehicle when the newest cloud was captured
    pub pose: Pose,

    /// Merged, downsampled points in the global frame
    pub points_m: Vec<Vector3<f64>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReport {
    /// The cloud was discarded as part of the warm-up
    pub warming_up: bool,

    /// The cloud was discarded because no pose is known yet
    pub no_pose: bool,

    pub num_raw_points: usize,
    pub num_cropped_points: usize,
    pub num_kept_points: usize,
    pub num_obstacle_points: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PerError {
    #[error("The preprocessor has not been initialised")]
    NotInitialised,

    #[error("Scan voxel size must be positive, got {0}")]
    InvalidVoxelSize(f64),

    #[error("At least one cloud must be stacked")]
    InvalidStackNum,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for CloudPreprocessor {
    type InitData = PerParams;
    type InitError = PerError;

    type InputData = CloudInput;
    type OutputData = Option<ObstacleCloud>;
    type StatusReport = StatusReport;
    type ProcError = PerError;

    fn init(&mut self, params: Self::InitData) -> Result<(), Self::InitError> {
        if !(params.scan_voxel_size_m > 0.0) {
            return Err(PerError::InvalidVoxelSize(params.scan_voxel_size_m));
        }
        if params.cloud_stack_num == 0 {
            return Err(PerError::InvalidStackNum);
        }

        self.init_countdown = params.system_init_delay;
        self.keep.clear();
        self.keep_dwz.clear();
        self.stack = VecDeque::with_capacity(params.cloud_stack_num);
        self.params = Some(params);

        Ok(())
    }

    fn proc(
        &mut self,
        input: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let params = self.params.clone().ok_or(PerError::NotInitialised)?;
        let mut report = StatusReport {
            num_raw_points: input.points_m.len(),
            ..Default::default()
        };

        if self.init_countdown > 0 {
            self.init_countdown -= 1;
            report.warming_up = true;
            trace!("Depth camera warming up, {} clouds left", self.init_countdown);
            return Ok((None, report));
        }

        let pose = match input.pose {
            Some(p) => p,
            None => {
                report.no_pose = true;
                return Ok((None, report));
            }
        };

        // Crop on optical depth
        let cropped: Vec<Vector3<f64>> = input
            .points_m
            .iter()
            .filter(|p| p[2] < params.max_range_m)
            .map(|p| Vector3::from(*p))
            .collect();
        report.num_cropped_points = cropped.len();

        let mut cloud = voxel_downsample(&cropped, params.scan_voxel_size_m);

        // Optical to body, then body to global
        let cam_rot = Rotation3::from_euler_angles(0.0, params.depth_cam_pitch_offset_rad, 0.0);
        let cam_offset = Vector3::from(params.depth_cam_offset_m);
        let attitude = Rotation3::from_euler_angles(pose.roll_rad, pose.pitch_rad, pose.yaw_rad);

        for p in cloud.iter_mut() {
            let body = cam_rot * Vector3::new(p.z, -p.x, -p.y) + cam_offset;
            *p = attitude * body + pose.position_m;
        }

        if params.keep_surr_cloud {
            self.update_keep(&mut cloud, &pose.position_m, &params);
            report.num_kept_points = self.keep.len();
        }

        // Stack and merge
        if self.stack.len() >= params.cloud_stack_num {
            self.stack.pop_front();
        }
        self.stack.push_back(cloud);

        let merged: Vec<Vector3<f64>> = self.stack.iter().flatten().copied().collect();
        let points_m = voxel_downsample(&merged, params.scan_voxel_size_m);
        report.num_obstacle_points = points_m.len();

        debug!(
            "Cloud at {:.3} s: {} raw, {} cropped, {} kept, {} obstacle points",
            input.time_s,
            report.num_raw_points,
            report.num_cropped_points,
            report.num_kept_points,
            report.num_obstacle_points
        );

        Ok((
            Some(ObstacleCloud {
                time_s: input.time_s,
                pose,
                points_m,
            }),
            report,
        ))
    }
}

impl CloudPreprocessor {
    /// Forget all points retained around the vehicle.
    pub fn clear_keep(&mut self) {
        debug!("Clearing {} retained points", self.keep.len());
        self.keep.clear();
        self.keep_dwz.clear();
    }

    /// Number of points currently retained around the vehicle.
    pub fn num_kept(&self) -> usize {
        self.keep.len()
    }

    /// Add this cycle's nearby points to the keep set, merge last cycle's
    /// retained points into the cloud, then re-filter the keep set.
    fn update_keep(
        &mut self,
        cloud: &mut Vec<Vector3<f64>>,
        vehicle_m: &Vector3<f64>,
        params: &PerParams,
    ) {
        let is_near = |p: &Vector3<f64>| {
            let d = p - vehicle_m;
            d.x.hypot(d.y) < params.keep_hori_dis_m && d.z.abs() < params.keep_vert_dis_m
        };

        self.keep.extend(cloud.iter().filter(|p| is_near(*p)).copied());

        cloud.extend(self.keep_dwz.iter().copied());

        self.keep_dwz = voxel_downsample(&self.keep, params.scan_voxel_size_m);
        self.keep = self.keep_dwz.iter().filter(|p| is_near(*p)).copied().collect();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
