//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajCtrlParams {
    /// Number of poses skipped between processed poses
    pub pose_skip_num: u32,

    /// Pitch of the track frame
    pub track_pitch_deg: f64,

    // ---- SPEED ----
    /// Look-ahead distance per unit of speed
    pub look_ahead_scale: f64,

    /// Minimum look-ahead distance while moving
    pub min_look_ahead_m: f64,

    pub min_speed_ms: f64,
    pub max_speed_ms: f64,

    /// Added to the current along-path speed to give the speed demand
    pub smooth_incr_speed_ms: f64,

    /// Fraction of the speed kept on tight turns
    pub slow_turn_rate: f64,

    /// Curvature above which a turn is slowed
    pub min_slow_turn_curv: f64,

    /// Time a turn stays slowed after the curvature drops
    pub min_slow_turn_interval_s: f64,

    /// Distance from the goal at which the vehicle starts slowing down
    pub slow_dis_m: f64,

    /// Distance from the goal at which the vehicle stops
    pub stop_dis_m: f64,

    /// Time after the last joystick message before a speed override is
    /// honoured
    pub joy_to_speed_delay_s: f64,

    // ---- TILT ----
    /// Feed forward gain on the centripetal acceleration
    pub acc_gain: f64,

    /// Velocity error gain
    pub vel_gain: f64,

    /// Position error gain
    pub pos_gain: f64,

    /// Velocity error gain when stopping
    pub stop_vel_gain: f64,

    /// Position error gain when stopping
    pub stop_pos_gain: f64,

    pub max_roll_pitch_deg: f64,

    // ---- YAW ----
    /// Feed forward gain from curvature times speed to yaw rate
    pub yaw_rate_scale: f64,

    /// Heading error gain
    pub yaw_gain: f64,

    /// Heading feedback multiplier on curved path sections
    pub yaw_boost: f64,

    /// Limit on the heading feedback
    pub max_rate_by_yaw_dps: f64,

    /// Limit on the yaw rate command
    pub max_yaw_rate_dps: f64,

    // ---- VERTICAL ----
    /// Feed forward gain from slope times speed to vertical velocity
    pub vel_z_scale: f64,

    /// Height error gain
    pub pos_z_gain: f64,

    /// Height feedback multiplier on sloped path sections
    pub pos_z_boost: f64,

    /// Limit on the height feedback
    pub max_vel_by_pos_z_ms: f64,

    /// Limit on the vertical velocity command
    pub max_vel_z_ms: f64,

    // ---- MANUAL ----
    pub man_speed_xy_ms: f64,
    pub man_speed_z_ms: f64,
    pub man_yaw_rate_dps: f64,

    // ---- ROTATE IN PLACE ----
    /// Rotate in place to face the goal when it is far off the heading
    pub rotate_in_place: bool,

    /// No rotation is started closer than this to the goal
    pub stop_rot_dis_m: f64,

    /// Heading error above which a rotation starts
    pub stop_rot_yaw1_deg: f64,

    /// Heading error below which a rotation ends
    pub stop_rot_yaw2_deg: f64,

    /// Time after starting a rotation before it may end
    pub stop_rot_delay_s: f64,

    /// Minimum time between the starts of two rotations
    pub min_stop_rot_interval_s: f64,

    /// Minimum period of the auto-mode scalar output
    pub auto_mode_interval_s: f64,

    // ---- LOGGING ----
    /// Archive the desired and executed trajectories
    pub save_trajectory: bool,

    /// Distance both the track point and the vehicle must move between
    /// archived rows
    pub save_traj_interval_m: f64,

    pub waypoint_test: WaypointTestParams,
}

/// Parameters of the waypoint test, which flies a zig-zag of synthetic goals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointTestParams {
    pub enabled: bool,

    /// Number of goals to emit
    pub num: u32,

    pub interval_s: f64,

    /// Heading offset of the side goals
    pub yaw_deg: f64,

    /// Height offset of the side goals
    pub z_m: f64,

    /// Distance of each goal from the vehicle
    pub dis_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrajCtrlParams {
    fn default() -> Self {
        Self {
            pose_skip_num: 0,
            track_pitch_deg: 0.0,
            look_ahead_scale: 0.2,
            min_look_ahead_m: 0.2,
            min_speed_ms: 0.5,
            max_speed_ms: 2.0,
            smooth_incr_speed_ms: 0.75,
            slow_turn_rate: 0.75,
            min_slow_turn_curv: 0.9,
            min_slow_turn_interval_s: 1.0,
            slow_dis_m: 2.0,
            stop_dis_m: 0.5,
            joy_to_speed_delay_s: 2.0,
            acc_gain: 0.05,
            vel_gain: 0.4,
            pos_gain: 0.05,
            stop_vel_gain: 0.2,
            stop_pos_gain: 0.2,
            max_roll_pitch_deg: 30.0,
            yaw_rate_scale: 1.0,
            yaw_gain: 2.0,
            yaw_boost: 2.0,
            max_rate_by_yaw_dps: 60.0,
            max_yaw_rate_dps: 90.0,
            vel_z_scale: 1.0,
            pos_z_gain: 1.5,
            pos_z_boost: 2.0,
            max_vel_by_pos_z_ms: 0.5,
            max_vel_z_ms: 1.0,
            man_speed_xy_ms: 2.0,
            man_speed_z_ms: 1.0,
            man_yaw_rate_dps: 60.0,
            rotate_in_place: true,
            stop_rot_dis_m: 1.0,
            stop_rot_yaw1_deg: 90.0,
            stop_rot_yaw2_deg: 10.0,
            stop_rot_delay_s: 0.0,
            min_stop_rot_interval_s: 1.0,
            auto_mode_interval_s: 0.0667,
            save_trajectory: false,
            save_traj_interval_m: 0.1,
            waypoint_test: WaypointTestParams::default(),
        }
    }
}

impl Default for WaypointTestParams {
    fn default() -> Self {
        Self {
            enabled: false,
            num: 6,
            interval_s: 1.0,
            yaw_deg: 45.0,
            z_m: 2.0,
            dis_m: 10.0,
        }
    }
}
