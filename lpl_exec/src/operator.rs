//! # Operator state
//!
//! Tracks the operator's joystick axes and the selected driving mode. Both
//! the planner and the follower keep their own copy, fed from the same
//! operator messages, so that each side can be driven on its own (and so
//! the follower can override the axes while rotating in place).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::{ModeSelect, OperatorMsg};
use log::info;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Operator and start-up parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorParams {
    /// Axis magnitudes below this are treated as zero
    pub joy_deadband: f64,

    /// Start in autonomous mode instead of manual
    pub autonomy_at_start: bool,

    /// Goal used until the first goal message arrives
    pub initial_goal_m: [f64; 3],

    /// If true the initial goal is relative to the pose reported once the
    /// estimator has settled, see `state_init_delay`.
    pub shift_goal_at_start: bool,

    /// Number of poses discarded at start up when shifting the goal
    pub state_init_delay: u32,
}

/// The four joystick axes, each in `[-1, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Axes {
    pub fwd: f64,
    pub left: f64,
    pub up: f64,
    pub yaw: f64,
}

/// Current mode and axes of the operator.
#[derive(Debug, Clone)]
pub struct OperatorState {
    deadband: f64,
    mode: Mode,
    axes: Axes,

    /// Time of the last operator message, if there has been one
    last_msg_time_s: Option<f64>,
}

/// The follower's speed demand.
///
/// Normally follows the forward axis with a falling deadband. A speed
/// override is only honoured once the joystick has been quiet for a while.
#[derive(Debug, Clone)]
pub struct DesiredSpeed {
    value_ms: f64,
    min_ms: f64,
    max_ms: f64,
    deadband: f64,

    /// Time of the last joystick update, if there has been one
    last_joy_time_s: Option<f64>,
}

/// What changed as a result of an operator message.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct OperatorUpdate {
    pub entered_autonomy: bool,
    pub left_autonomy: bool,
    pub clear_cloud: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Driving mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// The operator flies the vehicle directly
    Manual,

    /// The vehicle follows the planned path, steered and paced by the
    /// joystick
    Assisted,

    /// The vehicle drives to the goal
    Autonomous,

    /// Autonomous, but rotating in place to face the goal
    AutoAdjust,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for OperatorParams {
    fn default() -> Self {
        Self {
            joy_deadband: 0.1,
            autonomy_at_start: false,
            initial_goal_m: [0.0, 0.0, 1.0],
            shift_goal_at_start: false,
            state_init_delay: 100,
        }
    }
}

impl Mode {
    /// True in both autonomous modes.
    pub fn is_autonomous(&self) -> bool {
        matches!(self, Mode::Autonomous | Mode::AutoAdjust)
    }

    /// True in the modes where the vehicle is commanded directly rather
    /// than by tracking the path.
    pub fn bypasses_pursuit(&self) -> bool {
        matches!(self, Mode::Manual | Mode::AutoAdjust)
    }
}

impl OperatorState {
    pub fn new(params: &OperatorParams) -> Self {
        let (mode, axes) = if params.autonomy_at_start {
            (Mode::Autonomous, Axes { fwd: 1.0, ..Default::default() })
        } else {
            (Mode::Manual, Axes::default())
        };

        Self {
            deadband: params.joy_deadband,
            mode,
            axes,
            last_msg_time_s: None,
        }
    }

    /// Apply an operator message.
    ///
    /// Axes are only taken from the message when the operator is not
    /// requesting autonomy, so an autonomous run keeps its own axes while the
    /// operator holds the trigger. Entering autonomy sets the axes to full
    /// forward and nothing else.
    pub fn apply(&mut self, msg: &OperatorMsg) -> OperatorUpdate {
        let mut update = OperatorUpdate {
            clear_cloud: msg.clear_cloud,
            ..Default::default()
        };

        self.last_msg_time_s = Some(msg.time_s);

        if msg.mode != ModeSelect::Autonomous {
            self.axes = Axes {
                fwd: self.deadbanded(msg.fwd),
                left: self.deadbanded(msg.left),
                up: self.deadbanded(msg.up),
                yaw: self.deadbanded(msg.yaw),
            };
        }

        let was_autonomous = self.mode.is_autonomous();

        match msg.mode {
            ModeSelect::Manual => self.mode = Mode::Manual,
            ModeSelect::Assisted => self.mode = Mode::Assisted,
            ModeSelect::Autonomous => {
                if !was_autonomous {
                    self.axes = Axes { fwd: 1.0, ..Default::default() };
                    self.mode = Mode::Autonomous;
                }
            }
        }

        if !was_autonomous && self.mode.is_autonomous() {
            info!("Autonomy engaged");
            update.entered_autonomy = true;
        }
        if was_autonomous && !self.mode.is_autonomous() {
            info!("Autonomy disengaged, now in {:?}", self.mode);
            update.left_autonomy = true;
        }

        update
    }

    /// Apply the external auto-mode scalar.
    ///
    /// Only honoured in autonomy: a value below -0.5 requests rotating in
    /// place, and the forward axis becomes the value clamped into `[0, 1]`.
    /// Returns true if the value was applied.
    pub fn apply_auto_mode(&mut self, value: f64) -> bool {
        if !self.mode.is_autonomous() {
            return false;
        }

        self.set_auto_adjust(value < -0.5);
        self.axes.fwd = value.max(0.0).min(1.0);

        true
    }

    /// Enter or leave the rotate-in-place sub mode. Ignored outside of
    /// autonomy.
    pub fn set_auto_adjust(&mut self, adjust: bool) {
        if !self.mode.is_autonomous() {
            return;
        }

        self.mode = if adjust {
            Mode::AutoAdjust
        } else {
            Mode::Autonomous
        };
    }

    /// Replace the axes, used by the rotate-in-place manoeuvre.
    pub fn set_axes(&mut self, axes: Axes) {
        self.axes = axes;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn axes(&self) -> Axes {
        self.axes
    }

    pub fn deadband(&self) -> f64 {
        self.deadband
    }

    pub fn last_msg_time_s(&self) -> Option<f64> {
        self.last_msg_time_s
    }

    /// Zero an axis value inside the deadband.
    pub fn deadbanded(&self, value: f64) -> f64 {
        if value.abs() < self.deadband {
            0.0
        } else {
            value
        }
    }
}

impl DesiredSpeed {
    pub fn new(min_ms: f64, max_ms: f64, deadband: f64) -> Self {
        Self {
            value_ms: min_ms,
            min_ms,
            max_ms,
            deadband,
            last_joy_time_s: None,
        }
    }

    /// Update from the raw forward axis of an operator message.
    pub fn on_joystick(&mut self, time_s: f64, fwd: f64) {
        self.last_joy_time_s = Some(time_s);

        let js = if fwd.abs() < self.deadband { 0.0 } else { fwd };

        if self.value_ms < self.max_ms * js {
            self.value_ms = self.max_ms * js;
        } else if self.value_ms > self.max_ms * (js + self.deadband) {
            self.value_ms = self.max_ms * (js + self.deadband);
        }

        if self.value_ms < self.min_ms || js <= self.deadband {
            self.value_ms = self.min_ms;
        } else if self.value_ms > self.max_ms {
            self.value_ms = self.max_ms;
        }
    }

    /// Apply a speed override, a fraction of the maximum speed. Returns true
    /// if it was honoured.
    pub fn on_override(&mut self, time_s: f64, value: f64, joy_delay_s: f64) -> bool {
        let joy_quiet = match self.last_joy_time_s {
            Some(t) => time_s - t > joy_delay_s,
            None => true,
        };

        if joy_quiet {
            self.value_ms = (self.max_ms * value).max(self.min_ms).min(self.max_ms);
        }

        joy_quiet
    }

    pub fn value_ms(&self) -> f64 {
        self.value_ms
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn op_msg(mode: ModeSelect, fwd: f64, left: f64) -> OperatorMsg {
        OperatorMsg {
            time_s: 1.0,
            fwd,
            left,
            up: 0.05,
            yaw: -0.5,
            mode,
            clear_cloud: false,
        }
    }

    #[test]
    fn test_deadband() {
        let mut op = OperatorState::new(&OperatorParams::default());
        op.apply(&op_msg(ModeSelect::Manual, 0.5, -0.09));

        let axes = op.axes();
        assert_eq!(axes.fwd, 0.5);
        assert_eq!(axes.left, 0.0);
        assert_eq!(axes.up, 0.0);
        assert_eq!(axes.yaw, -0.5);
        assert_eq!(op.mode(), Mode::Manual);
        assert_eq!(op.last_msg_time_s(), Some(1.0));
    }

    #[test]
    fn test_autonomy_transitions() {
        let mut op = OperatorState::new(&OperatorParams::default());
        op.apply(&op_msg(ModeSelect::Assisted, 0.3, 0.7));
        assert_eq!(op.mode(), Mode::Assisted);

        // Entering autonomy overrides the axes
        let update = op.apply(&op_msg(ModeSelect::Autonomous, 0.3, 0.7));
        assert!(update.entered_autonomy);
        assert_eq!(op.mode(), Mode::Autonomous);
        assert_eq!(op.axes(), Axes { fwd: 1.0, ..Default::default() });

        // Staying in autonomy doesn't touch the axes
        op.apply_auto_mode(0.4);
        let update = op.apply(&op_msg(ModeSelect::Autonomous, 0.9, 0.9));
        assert!(!update.entered_autonomy);
        assert_eq!(op.axes().fwd, 0.4);

        let update = op.apply(&op_msg(ModeSelect::Manual, 0.2, 0.0));
        assert!(update.left_autonomy);
        assert_eq!(op.mode(), Mode::Manual);
        assert_eq!(op.axes().fwd, 0.2);
    }

    #[test]
    fn test_auto_mode_scalar() {
        let mut op = OperatorState::new(&OperatorParams::default());

        // Ignored outside autonomy
        assert!(!op.apply_auto_mode(-1.0));
        assert_eq!(op.mode(), Mode::Manual);

        let mut op = OperatorState::new(&OperatorParams {
            autonomy_at_start: true,
            ..Default::default()
        });
        assert_eq!(op.axes().fwd, 1.0);

        assert!(op.apply_auto_mode(-1.0));
        assert_eq!(op.mode(), Mode::AutoAdjust);
        assert_eq!(op.axes().fwd, 0.0);

        assert!(op.apply_auto_mode(1.5));
        assert_eq!(op.mode(), Mode::Autonomous);
        assert_eq!(op.axes().fwd, 1.0);
    }

    #[test]
    fn test_desired_speed() {
        let mut speed = DesiredSpeed::new(0.5, 2.0, 0.1);
        assert_eq!(speed.value_ms(), 0.5);

        speed.on_joystick(1.0, 0.8);
        assert!((speed.value_ms() - 1.6).abs() < 1e-12);

        // Easing off a little inside the deadband keeps the speed
        speed.on_joystick(1.1, 0.75);
        assert!((speed.value_ms() - 1.6).abs() < 1e-12);

        // Easing off further drops it to the stick plus the deadband
        speed.on_joystick(1.2, 0.5);
        assert!((speed.value_ms() - 1.2).abs() < 1e-12);

        // Released stick
        speed.on_joystick(1.3, 0.0);
        assert_eq!(speed.value_ms(), 0.5);
    }

    #[test]
    fn test_speed_override() {
        let mut speed = DesiredSpeed::new(0.5, 2.0, 0.1);

        // No joystick yet, honoured and clamped
        assert!(speed.on_override(0.5, 0.9, 2.0));
        assert!((speed.value_ms() - 1.8).abs() < 1e-12);
        assert!(speed.on_override(0.6, 0.1, 2.0));
        assert_eq!(speed.value_ms(), 0.5);

        // Too soon after the joystick
        speed.on_joystick(1.0, 0.0);
        assert!(!speed.on_override(2.5, 1.0, 2.0));
        assert_eq!(speed.value_ms(), 0.5);

        assert!(speed.on_override(3.5, 1.0, 2.0));
        assert_eq!(speed.value_ms(), 2.0);
    }

    #[test]
    fn test_mode_predicates() {
        assert!(Mode::AutoAdjust.is_autonomous());
        assert!(!Mode::Assisted.is_autonomous());
        assert!(Mode::Manual.bypasses_pursuit());
        assert!(Mode::AutoAdjust.bypasses_pursuit());
        assert!(!Mode::Autonomous.bypasses_pursuit());
    }
}
