//! Rotate in place manoeuvre
//!
//! When the goal is far off the vehicle's heading there is no library path
//! that reaches it, so in autonomy the vehicle stops and yaws to face the
//! goal before tracking resumes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;

use super::TrajCtrlParams;
use crate::operator::Axes;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RotateInPlace {
    state: RotateState,

    /// Time the last rotation started
    entry_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum RotateState {
    Tracking,
    Rotating,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RotateState {
    fn default() -> Self {
        RotateState::Tracking
    }
}

impl RotateInPlace {
    /// Update the machine.
    ///
    /// `dir_to_goal_rad` is the bearing of the goal relative to the vehicle
    /// heading, already wrapped into (-pi, pi]. Returns the axes the operator
    /// state must take, if the machine overrides them this cycle.
    pub fn update(
        &mut self,
        time_s: f64,
        dir_to_goal_rad: f64,
        dis_to_goal_m: f64,
        autonomous: bool,
        params: &TrajCtrlParams,
    ) -> Option<Axes> {
        if !autonomous || !params.rotate_in_place {
            self.state = RotateState::Tracking;
            return None;
        }

        let mut axes = None;

        let interval_elapsed = match self.entry_time_s {
            Some(t) => time_s > t + params.min_stop_rot_interval_s,
            None => true,
        };

        if self.state == RotateState::Tracking
            && interval_elapsed
            && dis_to_goal_m > params.stop_rot_dis_m
            && dir_to_goal_rad.abs() > params.stop_rot_yaw1_deg.to_radians()
        {
            info!(
                "Goal is {:.1} deg off the heading, rotating in place",
                dir_to_goal_rad.to_degrees()
            );
            self.state = RotateState::Rotating;
            self.entry_time_s = Some(time_s);
            axes = Some(Axes::default());
        }

        let delay_elapsed = self
            .entry_time_s
            .map(|t| time_s > t + params.stop_rot_delay_s)
            .unwrap_or(false);

        if self.state == RotateState::Rotating && delay_elapsed {
            if dir_to_goal_rad.abs() > params.stop_rot_yaw2_deg.to_radians() {
                axes = Some(Axes {
                    yaw: dir_to_goal_rad.signum(),
                    ..Default::default()
                });
            } else {
                info!("Facing the goal, rotation complete");
                self.state = RotateState::Tracking;
                axes = Some(Axes {
                    fwd: 1.0,
                    ..Default::default()
                });
            }
        }

        axes
    }

    pub fn state(&self) -> RotateState {
        self.state
    }

    pub fn is_rotating(&self) -> bool {
        self.state == RotateState::Rotating
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn deg(d: f64) -> f64 {
        d.to_radians()
    }

    #[test]
    fn test_hysteresis() {
        let params = TrajCtrlParams {
            stop_rot_delay_s: 0.5,
            ..Default::default()
        };
        let mut rot = RotateInPlace::default();

        // Below the entry threshold nothing happens
        assert_eq!(rot.update(1.0, deg(80.0), 5.0, true, &params), None);
        assert!(!rot.is_rotating());

        // Entry zeroes the axes
        assert_eq!(
            rot.update(2.0, deg(100.0), 5.0, true, &params),
            Some(Axes::default())
        );
        assert!(rot.is_rotating());

        // Before the delay has passed the entry axes are kept
        assert_eq!(rot.update(2.2, deg(5.0), 5.0, true, &params), None);
        assert!(rot.is_rotating());

        // Between the thresholds the rotation continues, towards the goal
        let axes = rot.update(3.0, deg(-50.0), 5.0, true, &params).unwrap();
        assert_eq!(axes.yaw, -1.0);
        assert_eq!(axes.fwd, 0.0);
        assert!(rot.is_rotating());

        let axes = rot.update(3.1, deg(11.0), 5.0, true, &params).unwrap();
        assert_eq!(axes.yaw, 1.0);

        // Crossing back over the entry threshold is not a new entry, the
        // rotation simply carries on
        let axes = rot.update(3.15, deg(120.0), 5.0, true, &params).unwrap();
        assert_eq!(axes.yaw, 1.0);
        assert_eq!(axes.fwd, 0.0);
        assert!(rot.is_rotating());

        let axes = rot.update(3.18, deg(50.0), 5.0, true, &params).unwrap();
        assert_eq!(axes.yaw, 1.0);
        assert!(rot.is_rotating());

        // Under the exit threshold tracking resumes at full speed
        let axes = rot.update(3.2, deg(9.0), 5.0, true, &params).unwrap();
        assert_eq!(axes.fwd, 1.0);
        assert_eq!(rot.state(), RotateState::Tracking);
    }

    #[test]
    fn test_entry_gates() {
        let params = TrajCtrlParams::default();
        let mut rot = RotateInPlace::default();

        // Too close to the goal
        assert_eq!(rot.update(5.0, deg(170.0), 0.5, true, &params), None);

        // Not autonomous
        assert_eq!(rot.update(5.0, deg(170.0), 5.0, false, &params), None);

        // Enter, finish, then try again straight away
        assert!(rot.update(5.0, deg(170.0), 5.0, true, &params).is_some());
        rot.update(5.1, deg(0.0), 5.0, true, &params);
        assert!(!rot.is_rotating());
        assert_eq!(rot.update(5.5, deg(170.0), 5.0, true, &params), None);

        // After the minimum interval it may start again
        assert!(rot.update(6.5, deg(170.0), 5.0, true, &params).is_some());
        assert!(rot.is_rotating());
    }

    #[test]
    fn test_leaving_autonomy_resets() {
        let params = TrajCtrlParams::default();
        let mut rot = RotateInPlace::default();

        rot.update(1.0, deg(120.0), 5.0, true, &params);
        assert!(rot.is_rotating());

        rot.update(1.1, deg(120.0), 5.0, false, &params);
        assert!(!rot.is_rotating());
    }
}
