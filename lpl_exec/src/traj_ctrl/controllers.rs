//! # Trajectory controllers module
//!
//! The pursuit law which tracks the track path, and the direct law used when
//! the operator flies the vehicle.
//!
//! The pursuit target is the first point of the track path at about the
//! look-ahead distance from the vehicle. The curvature and slope of the path
//! at the target feed forward into the yaw rate, vertical velocity and tilt
//! commands, and the position, heading and velocity errors are fed back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::Serialize;
use util::maths::{clamp_sym, wrap_pi};

use super::TrajCtrlParams;
use crate::{loc::Pose, operator::Axes};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Below this curvature, slope, segment length or error the quantity is
/// treated as zero.
const SMALL: f64 = 0.001;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A body frame command for the flight controller.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ControlCmd {
    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub vel_z_ms: f64,
    pub yaw_rate_rads: f64,
}

/// State of the pursuit law carried between cycles.
#[derive(Debug, Clone, Default)]
pub struct PursuitController {
    /// Forward axis with a falling deadband applied
    joy_fwd_latch: f64,

    /// Last time the curvature exceeded the slow turn threshold
    slow_turn_time_s: Option<f64>,

    /// Heading of the track path at the target
    track_yaw_rad: f64,
}

/// Inputs to one pursuit step.
#[derive(Debug, Clone, Copy)]
pub struct PursuitInput<'a> {
    pub time_s: f64,
    pub pose: &'a Pose,
    pub axes: &'a Axes,

    /// Axis deadband of the operator
    pub deadband: f64,

    pub desired_speed_ms: f64,
    pub dis_to_goal_m: f64,
    pub autonomous: bool,
    pub rotating: bool,

    /// The last splice had more than one point
    pub path_found: bool,
}

/// Monitoring quantities of one pursuit step.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PursuitReport {
    pub target_index: usize,
    pub look_ahead_m: f64,
    pub curvature: f64,
    pub slope: f64,
    pub speed_dem_ms: f64,
    pub heading_err_rad: f64,

    /// The pursuit law commanded a full stop
    pub stopped: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PursuitController {
    /// Heading of the track path at the current target.
    pub fn track_yaw_rad(&self) -> f64 {
        self.track_yaw_rad
    }

    /// Direct command from the joystick axes. The track heading follows the
    /// vehicle.
    pub fn manual_cmd(&mut self, pose: &Pose, axes: &Axes, params: &TrajCtrlParams) -> ControlCmd {
        self.track_yaw_rad = pose.yaw_rad;

        let max_tilt = params.max_roll_pitch_deg.to_radians();
        let speed_xy = params.man_speed_xy_ms;
        let pos_term = params.pos_gain * params.look_ahead_scale * speed_xy;

        let roll = -params.stop_vel_gain * (speed_xy * axes.left - pose.vel_ms.y)
            - pos_term * axes.left;
        let pitch = params.stop_vel_gain * (speed_xy * axes.fwd - pose.vel_ms.x)
            + pos_term * axes.fwd;

        ControlCmd {
            roll_rad: clamp_sym(roll, max_tilt),
            pitch_rad: clamp_sym(pitch, max_tilt),
            vel_z_ms: params.man_speed_z_ms * axes.up,
            yaw_rate_rads: params.man_yaw_rate_dps.to_radians() * axes.yaw,
        }
    }

    /// One step of the pursuit law.
    ///
    /// The target index only ever moves forward along `path`.
    pub fn pursuit_cmd(
        &mut self,
        input: &PursuitInput,
        path: &[Vector3<f64>],
        target_index: &mut usize,
        params: &TrajCtrlParams,
    ) -> (ControlCmd, PursuitReport) {
        let pose = input.pose;
        let veh = pose.position_m;
        let max_speed = params.max_speed_ms;
        let min_speed = params.min_speed_ms;

        // ---- EFFECTIVE SPEED ----

        let fwd = input.axes.fwd;
        if self.joy_fwd_latch < fwd {
            self.joy_fwd_latch = fwd;
        } else if self.joy_fwd_latch > fwd + input.deadband {
            self.joy_fwd_latch = fwd + input.deadband;
        }
        if fwd <= input.deadband {
            self.joy_fwd_latch = 0.0;
        }
        let joy_speed = if self.joy_fwd_latch < min_speed / max_speed {
            0.0
        } else {
            self.joy_fwd_latch
        };

        // ---- TARGET ----

        let mut look_ahead = if input.autonomous {
            params.look_ahead_scale * input.desired_speed_ms
        } else {
            params.look_ahead_scale * max_speed * joy_speed
        };
        look_ahead = if look_ahead <= 0.0 {
            0.0
        } else {
            look_ahead.max(params.min_look_ahead_m)
        };

        let hori_dis = |p: &Vector3<f64>| (p.x - veh.x).hypot(p.y - veh.y);

        if path.is_empty() {
            return (ControlCmd::default(), PursuitReport::default());
        }
        *target_index = (*target_index).min(path.len() - 1);
        while *target_index + 1 < path.len() {
            let d = hori_dis(&path[*target_index]);
            let d_next = hori_dis(&path[*target_index + 1]);

            if (d_next - look_ahead).abs() <= (d - look_ahead).abs() || d_next <= d {
                *target_index += 1;
            } else {
                break;
            }
        }
        let i = *target_index;
        let target = path[i];

        // ---- PATH GEOMETRY ----

        let mut curv = 0.0;
        let mut slope = 0.0;
        let mut seg_dz = 0.0;
        if i > 0 {
            let seg = target - path[i - 1];
            self.track_yaw_rad = seg.y.atan2(seg.x);
            seg_dz = seg.z;

            // Curvature and slope are per unit of horizontal distance
            let seg_len = seg.x.hypot(seg.y);
            if seg_len > SMALL && i + 1 < path.len() {
                let next = path[i + 1] - target;
                let next_yaw = next.y.atan2(next.x);
                curv = wrap_pi(next_yaw - self.track_yaw_rad) / seg_len;
                slope = seg.z / seg_len;
            }
        }

        let dir_to_path = wrap_pi(self.track_yaw_rad - pose.yaw_rad);
        let (sin_dir, cos_dir) = dir_to_path.sin_cos();
        let vel_path = pose.vel_ms.x * cos_dir + pose.vel_ms.y * sin_dir;

        // ---- SPEED DEMAND ----

        let mut speed = vel_path + params.smooth_incr_speed_ms;
        let mut yaw_rate_path = curv * vel_path;
        let mut vel_z_path = slope * vel_path;

        let mut slow_turn_rate = 1.0;
        if curv.abs() > params.min_slow_turn_curv {
            self.slow_turn_time_s = Some(input.time_s);
        }
        let in_slow_turn = self
            .slow_turn_time_s
            .map(|t| input.time_s < t + params.min_slow_turn_interval_s)
            .unwrap_or(false);
        if curv.abs() > params.min_slow_turn_curv || in_slow_turn {
            slow_turn_rate = params.slow_turn_rate;
        }

        let speed_cap = if input.autonomous {
            slow_turn_rate * input.desired_speed_ms
        } else {
            slow_turn_rate * max_speed * joy_speed
        };
        speed = speed.min(speed_cap).max(min_speed);

        let goal_seeking = input.autonomous && !input.rotating;

        let mut vel_gain = params.vel_gain;
        let mut pos_gain = params.pos_gain;
        let mut yaw_boost = params.yaw_boost;
        let mut pos_z_boost = params.pos_z_boost;

        let stopped = joy_speed == 0.0
            || !input.path_found
            || (input.dis_to_goal_m < params.stop_dis_m && goal_seeking);

        if stopped {
            speed = 0.0;
            vel_gain = params.stop_vel_gain;
            pos_gain = params.stop_pos_gain;
            yaw_rate_path = 0.0;
            vel_z_path = 0.0;
            yaw_boost = 1.0;
            pos_z_boost = 1.0;
        } else if input.dis_to_goal_m < params.slow_dis_m && goal_seeking {
            let ramp = (max_speed * (input.dis_to_goal_m - params.stop_dis_m)
                + min_speed * (params.slow_dis_m - input.dis_to_goal_m))
                / (params.slow_dis_m - params.stop_dis_m);
            speed = speed.min(ramp);
        }

        if curv.abs() < SMALL {
            yaw_rate_path = 0.0;
            yaw_boost = 1.0;
        }
        if seg_dz.abs() < SMALL {
            vel_z_path = 0.0;
            pos_z_boost = 1.0;
        }

        // ---- POSITION ERROR ----

        let (sin_yaw, cos_yaw) = pose.yaw_rad.sin_cos();
        let d = target - veh;
        let mut err_x = cos_yaw * d.x + sin_yaw * d.y;
        let mut err_y = -sin_yaw * d.x + cos_yaw * d.y;
        let err_z = d.z;

        // The velocity term's direction uses the unclamped length
        let err_xy = err_x.hypot(err_y);
        let err_limit = look_ahead + params.stop_dis_m;
        if err_xy > err_limit {
            err_x *= err_limit / err_xy;
            err_y *= err_limit / err_xy;
        }

        // ---- COMMANDS ----

        let max_tilt = params.max_roll_pitch_deg.to_radians();
        let mut cmd = ControlCmd::default();

        if err_xy > SMALL {
            let centripetal = params.acc_gain * curv * speed * speed;

            let roll = -centripetal * cos_dir
                - vel_gain * (speed * err_y / err_xy - pose.vel_ms.y)
                - pos_gain * err_y;
            let pitch = -centripetal * sin_dir
                + vel_gain * (speed * err_x / err_xy - pose.vel_ms.x)
                + pos_gain * err_x;

            cmd.roll_rad = clamp_sym(roll, max_tilt);
            cmd.pitch_rad = clamp_sym(pitch, max_tilt);
        }

        let yaw_fb = clamp_sym(
            params.yaw_gain * dir_to_path,
            params.max_rate_by_yaw_dps.to_radians(),
        );
        cmd.yaw_rate_rads = clamp_sym(
            params.yaw_rate_scale * yaw_rate_path + yaw_boost * yaw_fb,
            params.max_yaw_rate_dps.to_radians(),
        );

        let vel_z_fb = clamp_sym(params.pos_z_gain * err_z, params.max_vel_by_pos_z_ms);
        cmd.vel_z_ms = clamp_sym(
            params.vel_z_scale * vel_z_path + pos_z_boost * vel_z_fb,
            params.max_vel_z_ms,
        );

        let report = PursuitReport {
            target_index: i,
            look_ahead_m: look_ahead,
            curvature: curv,
            slope,
            speed_dem_ms: speed,
            heading_err_rad: dir_to_path,
            stopped,
        };

        (cmd, report)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
