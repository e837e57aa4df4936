//! # Trajectory control module
//!
//! Trajectory control keeps the vehicle on the track path, the persistent
//! trajectory built by splicing together the paths chosen by path selection.
//!
//! Each control cycle runs on a new pose:
//!
//!  1. In autonomy the rotate in place machine checks whether the goal is
//!     too far off the heading to be reached by any library path, and if so
//!     takes over the operator's axes to yaw on the spot.
//!  2. When the operator is flying directly (or the vehicle is rotating) the
//!     command comes straight from the axes and the track point is pinned to
//!     the vehicle.
//!  3. Otherwise the pursuit law picks a target on the track path at the
//!     look-ahead distance and computes tilt, vertical velocity and yaw rate
//!     commands from the path geometry and the tracking errors.
//!  4. The target index and heading are recorded against the pose time, so
//!     that a plan made from a cloud captured at that time can later be
//!     spliced in at the right place.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;
pub mod rotate;
pub mod state;
pub mod track_path;
pub mod traj_log;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use controllers::*;
pub use params::{TrajCtrlParams, WaypointTestParams};
pub use rotate::*;
pub use state::*;
pub use track_path::*;
pub use traj_log::TrajLog;
pub use waypoint_test::WaypointTest;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Trajectory control has not been initialised")]
    NotInitialised,

    #[error("Invalid trajectory control parameters: {0}")]
    InvalidParams(String),
}
