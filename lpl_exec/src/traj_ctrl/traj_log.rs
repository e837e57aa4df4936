//! Trajectory log
//!
//! Archives the desired trajectory (the pursuit target) and the executed
//! trajectory (the vehicle) as two CSV files, one row each time both have
//! moved far enough since the last row.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::Path;

use nalgebra::Vector3;
use serde::Serialize;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    session::Session,
};

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

pub const DESIRED_TRAJ_FILE: &str = "traj_desired.csv";
pub const EXECUTED_TRAJ_FILE: &str = "traj_executed.csv";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct TrajLog {
    interval_m: f64,

    desired_arch: Archiver,
    executed_arch: Archiver,

    last_track_m: Vector3<f64>,
    last_vehicle_m: Vector3<f64>,

    pending: Option<(DesiredRow, ExecutedRow)>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DesiredRow {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
    pub yaw_rad: f64,
    pub time_s: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExecutedRow {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub yaw_rad: f64,
    pub time_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajLog {
    /// Create the log in the session's archive directory.
    pub fn from_session(session: &Session, interval_m: f64) -> Result<Self, ArchiveError> {
        Self::from_dir(&session.arch_root, interval_m)
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P, interval_m: f64) -> Result<Self, ArchiveError> {
        Ok(Self {
            interval_m,
            desired_arch: Archiver::from_path(&dir, DESIRED_TRAJ_FILE)?,
            executed_arch: Archiver::from_path(&dir, EXECUTED_TRAJ_FILE)?,
            last_track_m: Vector3::zeros(),
            last_vehicle_m: Vector3::zeros(),
            pending: None,
        })
    }

    /// Queue a pair of rows if both the track point and the vehicle have
    /// moved more than the interval since the last queued pair.
    pub fn update(&mut self, time_s: f64, track_m: &Vector3<f64>, track_yaw_rad: f64, pose: &Pose) {
        let track_moved = (track_m - self.last_track_m).norm() > self.interval_m;
        let vehicle_moved = (pose.position_m - self.last_vehicle_m).norm() > self.interval_m;

        if !(track_moved && vehicle_moved) {
            return;
        }

        self.last_track_m = *track_m;
        self.last_vehicle_m = pose.position_m;

        self.pending = Some((
            DesiredRow {
                x_m: track_m.x,
                y_m: track_m.y,
                z_m: track_m.z,
                yaw_rad: track_yaw_rad,
                time_s,
            },
            ExecutedRow {
                x_m: pose.position_m.x,
                y_m: pose.position_m.y,
                z_m: pose.position_m.z,
                roll_rad: pose.roll_rad,
                pitch_rad: pose.pitch_rad,
                yaw_rad: pose.yaw_rad,
                time_s,
            },
        ));
    }
}

impl Archived for TrajLog {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if let Some((desired, executed)) = self.pending.take() {
            self.desired_arch.serialise(desired)?;
            self.executed_arch.serialise(executed)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
