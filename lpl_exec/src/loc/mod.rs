//! # Localisation module
//!
//! The vehicle's pose comes from an external state estimator, usually a
//! tracking camera which is not mounted at the vehicle's centre. This module
//! converts incoming pose messages into the [`Pose`] used by the rest of the
//! executable, correcting for the camera's scale, orientation and lever arm.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
pub use params::LocParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::{PoseMsg, TrackPoseMsg};
use nalgebra::{Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose of the vehicle body in the global frame.
#[derive(Debug, Copy, Clone, Serialize, Default, PartialEq)]
pub struct Pose {
    /// Position of the body origin in the global frame
    pub position_m: Vector3<f64>,

    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub yaw_rad: f64,

    /// Linear velocity of the body origin, expressed in the yaw-aligned
    /// (levelled) body frame. Zero if the estimator didn't provide one.
    pub vel_ms: Vector3<f64>,
}

/// The pose of the pursuit track point, which is the reference frame the
/// planner works in.
#[derive(Debug, Copy, Clone, Serialize, Default, PartialEq)]
pub struct TrackPose {
    pub position_m: Vector3<f64>,
    pub pitch_rad: f64,
    pub yaw_rad: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("Pose orientation is not a valid quaternion: {0:?}")]
    InvalidQuaternion([f64; 4]),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Build a corrected pose from a state estimator message.
    ///
    /// The correction is:
    ///  1. Scale the position and velocity.
    ///  2. If the camera is mounted backwards mirror the horizontal axes,
    ///     roll and pitch.
    ///  3. Remove the lever arm of the camera offset, rotated by the current
    ///     attitude, from the position.
    ///  4. Remove the rotational component (`w x r`) from the velocity and
    ///     rotate it into the levelled body frame.
    pub fn from_msg(msg: &PoseMsg, params: &LocParams) -> Result<Self, LocError> {
        let q = msg.orientation_q;
        let quat = Quaternion::new(q[3], q[0], q[1], q[2]);

        if !quat.coords.iter().all(|c| c.is_finite()) || quat.norm() < 1e-9 {
            return Err(LocError::InvalidQuaternion(q));
        }

        let (mut roll, mut pitch, yaw) = UnitQuaternion::from_quaternion(quat).euler_angles();

        let scale = params.tracking_cam_scale;
        let mut position = Vector3::from(msg.position_m) * scale;
        let mut vel = msg.lin_vel_ms
            .map(|v| Vector3::from(v) * scale)
            .unwrap_or_else(Vector3::zeros);
        let mut ang_vel = msg.ang_vel_rads
            .map(Vector3::from)
            .unwrap_or_else(Vector3::zeros);

        if params.tracking_cam_backward {
            roll = -roll;
            pitch = -pitch;
            position.x = -position.x;
            position.y = -position.y;
            vel.x = -vel.x;
            vel.y = -vel.y;
            ang_vel.x = -ang_vel.x;
            ang_vel.y = -ang_vel.y;
        }

        // Lever arm
        let offset = Vector3::from(params.tracking_cam_offset_m);
        let attitude = Rotation3::from_euler_angles(roll, pitch, yaw);
        position -= attitude * offset - offset;

        // Velocity of the body origin rather than the camera
        vel -= ang_vel.cross(&offset);
        let level = Rotation3::from_euler_angles(roll, pitch, 0.0);

        Ok(Self {
            position_m: position,
            roll_rad: roll,
            pitch_rad: pitch,
            yaw_rad: yaw,
            vel_ms: level * vel,
        })
    }

    /// Horizontal speed of the vehicle.
    pub fn speed_xy_ms(&self) -> f64 {
        self.vel_ms.x.hypot(self.vel_ms.y)
    }
}

impl TrackPose {
    /// Express a global point in the track frame: translate by the track
    /// position, rotate by the negative track yaw, then by the track pitch.
    pub fn to_track_frame(&self, point_m: &Vector3<f64>) -> Vector3<f64> {
        let (sin_y, cos_y) = self.yaw_rad.sin_cos();
        let (sin_p, cos_p) = self.pitch_rad.sin_cos();

        let d = point_m - self.position_m;
        let x1 = d.x * cos_y + d.y * sin_y;
        let y1 = -d.x * sin_y + d.y * cos_y;

        Vector3::new(
            x1 * cos_p - d.z * sin_p,
            y1,
            x1 * sin_p + d.z * cos_p,
        )
    }

    /// Express a track frame point in the global frame. The inverse of
    /// [`TrackPose::to_track_frame`].
    pub fn to_global_frame(&self, point_m: &Vector3<f64>) -> Vector3<f64> {
        let (sin_y, cos_y) = self.yaw_rad.sin_cos();
        let (sin_p, cos_p) = self.pitch_rad.sin_cos();

        let x2 = cos_p * point_m.x + sin_p * point_m.z;
        let z2 = -sin_p * point_m.x + cos_p * point_m.z;

        Vector3::new(
            cos_y * x2 - sin_y * point_m.y + self.position_m.x,
            sin_y * x2 + cos_y * point_m.y + self.position_m.y,
            z2 + self.position_m.z,
        )
    }
}

impl From<&TrackPoseMsg> for TrackPose {
    fn from(msg: &TrackPoseMsg) -> Self {
        Self {
            position_m: Vector3::from(msg.position_m),
            pitch_rad: msg.pitch_rad,
            yaw_rad: msg.yaw_rad,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
