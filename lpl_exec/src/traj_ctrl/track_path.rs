//! # Track path
//!
//! The track path is the persistent trajectory the pursuit controller
//! follows. Each new plan from the path selector is spliced into it at the
//! point the controller had reached when the plan's cloud was captured, so a
//! late plan never drags the vehicle back to where it used to be.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::Vector3;
use serde::Serialize;

use crate::{
    loc::{Pose, TrackPose},
    time_sync::TimeSyncBuffer,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of points behind the current target a plan may be anchored
/// before it is reported as stale.
pub const RECONCILE_WINDOW: usize = 100;

/// Capacity of the target index history.
pub const INDEX_HISTORY_LEN: usize = 200;

/// Distance behind a pinned point the previous point is placed at.
const PIN_BACKSTEP_M: f64 = 0.1;

/// The start of a new track path.
const INITIAL_POINT_M: [f64; 3] = [0.0, 0.0, 1.0];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The state of the controller at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndexSample {
    /// Index of the target point in the track path
    pub index: usize,

    /// Heading of the track path at the target
    pub yaw_rad: f64,
}

/// A persistent track path and the history needed to splice into it.
#[derive(Debug, Clone)]
pub struct TrackPathStitcher {
    points: Vec<Vector3<f64>>,

    /// Index of the pursuit target
    target_index: usize,

    history: TimeSyncBuffer<IndexSample>,
}

/// The outcome of a splice.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SpliceReport {
    /// Index in the track path where the new path was anchored
    pub splice_index: usize,

    /// Index recovered from the history
    pub recorded_index: usize,

    /// Number of points the splice index lags the current target by
    pub lag: usize,

    /// The new path had more than one point
    pub path_found: bool,

    /// Length of the track path after the splice
    pub track_len: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrackPathStitcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackPathStitcher {
    pub fn new() -> Self {
        Self {
            points: vec![Vector3::from(INITIAL_POINT_M)],
            target_index: 0,
            history: TimeSyncBuffer::new(INDEX_HISTORY_LEN),
        }
    }

    /// Record the controller's target at the given time.
    pub fn record(&mut self, time_s: f64, yaw_rad: f64) {
        self.history.insert(
            time_s,
            IndexSample {
                index: self.target_index,
                yaw_rad,
            },
        );
    }

    /// Splice a new path, given in the track frame the controller had at
    /// `time_s`, into the track path.
    ///
    /// Points of the track path before the splice index are never changed.
    /// The splice index is the target index recorded nearest to `time_s`,
    /// which is where the track frame the plan was made in sat. The new
    /// path's first point coincides with the track point at the splice
    /// index, its other points replace everything after it. A splice more
    /// than [`RECONCILE_WINDOW`] points behind the current target is still
    /// made there, but logged.
    ///
    /// If `pin` is given the splice point is moved onto that pose first, so
    /// that the new path starts from where the vehicle actually is.
    ///
    /// Returns `None` if nothing has been recorded yet, in which case the
    /// path is ignored.
    pub fn splice(
        &mut self,
        path_m: &[Vector3<f64>],
        time_s: f64,
        track_pitch_rad: f64,
        pin: Option<&Pose>,
    ) -> Option<SpliceReport> {
        let path_found = path_m.len() > 1;
        let path_len = path_m.len().max(1);

        let recorded = *self.history.nearest(time_s).map(|s| &s.data)?;

        let splice_index = recorded.index.min(self.points.len() - 1);
        let lag = self.target_index.saturating_sub(splice_index);
        if lag > RECONCILE_WINDOW {
            debug!(
                "Plan at {:.3} s anchored {} points behind the target",
                time_s, lag
            );
        }

        // Only the points from the splice index on are rewritten
        self.points.truncate(splice_index + 1);
        self.points.resize(splice_index + path_len, Vector3::zeros());

        let mut yaw_rad = recorded.yaw_rad;
        if let Some(pose) = pin {
            self.points[splice_index] = pose.position_m;
            if splice_index > 0 {
                self.points[splice_index - 1] = pose.position_m
                    - PIN_BACKSTEP_M * Vector3::new(pose.yaw_rad.cos(), pose.yaw_rad.sin(), 0.0);
            }
            yaw_rad = pose.yaw_rad;
        }

        let frame = TrackPose {
            position_m: self.points[splice_index],
            pitch_rad: track_pitch_rad,
            yaw_rad,
        };
        for (i, p) in path_m.iter().enumerate().skip(1) {
            self.points[splice_index + i] = frame.to_global_frame(p);
        }

        if self.target_index >= self.points.len() {
            self.target_index = self.points.len() - 1;
        }

        trace!(
            "Spliced {} points at {} (recorded {}), track path now {} long",
            path_len,
            splice_index,
            recorded.index,
            self.points.len()
        );

        Some(SpliceReport {
            splice_index,
            recorded_index: recorded.index,
            lag,
            path_found,
            track_len: self.points.len(),
        })
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    /// Mutable access to the target index, for the pursuit law to advance.
    pub fn target_index_mut(&mut self) -> &mut usize {
        &mut self.target_index
    }

    /// The points together with mutable access to the target index.
    pub fn points_and_target_mut(&mut self) -> (&[Vector3<f64>], &mut usize) {
        (&self.points, &mut self.target_index)
    }

    /// The last `n` points of the track path.
    pub fn tail(&self, n: usize) -> &[Vector3<f64>] {
        &self.points[self.points.len().saturating_sub(n)..]
    }

    /// True if the controller has recorded at least one target.
    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_vec_eq(a: Vector3<f64>, b: Vector3<f64>) {
        assert!((a - b).norm() < 1e-9, "{:?} != {:?}", a, b);
    }

    fn straight(n: usize, step: f64) -> Vec<Vector3<f64>> {
        (0..n).map(|i| Vector3::new(i as f64 * step, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_ignored_without_history() {
        let mut tp = TrackPathStitcher::new();
        assert!(tp.splice(&straight(5, 0.1), 1.0, 0.0, None).is_none());
        assert_eq!(tp.points().len(), 1);
    }

    #[test]
    fn test_first_splice() {
        let mut tp = TrackPathStitcher::new();
        tp.record(1.0, FRAC_PI_2);

        let rpt = tp.splice(&straight(5, 0.1), 1.0, 0.0, None).unwrap();
        assert!(rpt.path_found);
        assert_eq!(rpt.splice_index, 0);
        assert_eq!(tp.points().len(), 5);

        // Anchored on the initial point, heading along +y
        assert_vec_eq(tp.points()[0], Vector3::new(0.0, 0.0, 1.0));
        assert_vec_eq(tp.points()[4], Vector3::new(0.0, 0.4, 1.0));
    }

    #[test]
    fn test_splice_preserves_prefix() {
        let mut tp = TrackPathStitcher::new();
        tp.record(0.0, 0.0);
        tp.splice(&straight(20, 0.1), 0.0, 0.0, None).unwrap();

        // The controller reaches point 8 by t = 1, then a plan computed at
        // t = 1 arrives
        *tp.target_index_mut() = 8;
        tp.record(1.0, 0.0);
        tp.record(2.0, 0.0);

        let before: Vec<_> = tp.points()[..8].to_vec();
        let rpt = tp.splice(&straight(4, 0.5), 1.0, 0.0, None).unwrap();

        assert_eq!(rpt.recorded_index, 8);
        assert_eq!(rpt.splice_index, 8);
        assert_eq!(tp.points().len(), 8 + 4);
        assert_eq!(&tp.points()[..8], before.as_slice());
        assert_vec_eq(tp.points()[11], Vector3::new(0.8 + 1.5, 0.0, 1.0));
    }

    #[test]
    fn test_stale_plan_anchored_where_planned() {
        let mut tp = TrackPathStitcher::new();
        tp.record(0.0, 0.0);
        tp.splice(&straight(300, 0.01), 0.0, 0.0, None).unwrap();

        // Recorded index 0, but the controller is now at 250, well outside
        // the window
        *tp.target_index_mut() = 250;
        let rpt = tp.splice(&straight(3, 0.1), 0.0, 0.0, None).unwrap();

        assert_eq!(rpt.recorded_index, 0);
        assert_eq!(rpt.splice_index, 0);
        assert_eq!(rpt.lag, 250);
        assert!(rpt.lag > RECONCILE_WINDOW);
        assert_eq!(tp.points().len(), 3);

        // Placed in the frame of the track point the plan was made from
        assert_vec_eq(tp.points()[0], Vector3::new(0.0, 0.0, 1.0));
        assert_vec_eq(tp.points()[1], Vector3::new(0.1, 0.0, 1.0));
        assert_vec_eq(tp.points()[2], Vector3::new(0.2, 0.0, 1.0));

        // The target is beyond the new end of the path
        assert_eq!(tp.target_index(), 2);
    }

    #[test]
    fn test_single_point_path() {
        let mut tp = TrackPathStitcher::new();
        tp.record(0.0, 0.0);
        tp.splice(&straight(10, 0.1), 0.0, 0.0, None).unwrap();
        *tp.target_index_mut() = 3;
        tp.record(1.0, 0.0);

        let rpt = tp.splice(&[Vector3::zeros()], 1.0, 0.0, None).unwrap();
        assert!(!rpt.path_found);
        assert_eq!(tp.points().len(), 4);

        let rpt = tp.splice(&[], 1.0, 0.0, None).unwrap();
        assert!(!rpt.path_found);
        assert_eq!(tp.points().len(), 4);
    }

    #[test]
    fn test_pinned_splice() {
        let mut tp = TrackPathStitcher::new();
        tp.record(0.0, 0.0);
        tp.splice(&straight(10, 0.1), 0.0, 0.0, None).unwrap();
        *tp.target_index_mut() = 5;
        tp.record(1.0, 0.0);

        let pose = Pose {
            position_m: Vector3::new(3.0, 2.0, 1.5),
            yaw_rad: FRAC_PI_2,
            ..Default::default()
        };
        tp.splice(&straight(3, 0.2), 1.0, 0.0, Some(&pose)).unwrap();

        let p = tp.points();
        assert_vec_eq(p[4], Vector3::new(3.0, 1.9, 1.5));
        assert_vec_eq(p[5], pose.position_m);
        assert_vec_eq(p[7], Vector3::new(3.0, 2.4, 1.5));
    }

    #[test]
    fn test_pitched_splice() {
        let mut tp = TrackPathStitcher::new();
        tp.record(0.0, 0.0);

        // Pitched nose down by 90 degrees, forward becomes down
        tp.splice(&straight(2, 1.0), 0.0, FRAC_PI_2, None).unwrap();
        assert_vec_eq(tp.points()[1], Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_tail() {
        let mut tp = TrackPathStitcher::new();
        tp.record(0.0, 0.0);
        tp.splice(&straight(600, 0.01), 0.0, 0.0, None).unwrap();

        assert_eq!(tp.tail(500).len(), 500);
        assert_vec_eq(tp.tail(500)[499], tp.points()[599]);
        assert_eq!(tp.tail(1000).len(), 600);
    }
}
