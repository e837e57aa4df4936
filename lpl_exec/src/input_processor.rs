//! # Input processor module
//!
//! The input processor routes inputs coming from any source to the planner
//! and the follower.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};

// Internal
use comms_if::msg::InputMsg;
use crate::data_store::DataStore;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute an input.
///
/// Mutates the datastore, queueing any outputs the input produced.
pub(crate) fn exec(ds: &mut DataStore, msg: &InputMsg) {

    // Handle different inputs
    match msg {
        InputMsg::Pose(m) => {
            if let Err(e) = ds.planner.on_pose(m) {
                warn!("Planner could not use the pose at {:.3} s: {}", m.time_s, e);
            }

            match ds.follower.on_pose(m) {
                Ok(outputs) => ds.push_follower_outputs(outputs),
                Err(e) => warn!("Error during control at {:.3} s: {}", m.time_s, e)
            }
        },
        InputMsg::Cloud(m) => {
            match ds.planner.on_cloud(m) {
                Ok(true) => trace!("Obstacle cloud at {:.3} s ready", m.time_s),
                Ok(false) => (),
                Err(e) => warn!("Could not process the cloud at {:.3} s: {}", m.time_s, e)
            }
        },
        InputMsg::Goal(m) => {
            debug!("Recieved goal {:?}", m.point);
            ds.planner.on_goal(m);
            ds.follower.on_goal(m);
        },
        InputMsg::Operator(m) => {
            ds.planner.on_operator(m);
            ds.follower.on_operator(m);
        },
        InputMsg::AutoMode(m) => {
            ds.planner.on_auto_mode(m.value);
            ds.follower.on_auto_mode(m.value);
        },
        InputMsg::Speed(m) => {
            ds.follower.on_speed(m);
        },
        InputMsg::ClearCloud(_) => {
            ds.planner.on_clear_cloud();
        }
    }

}
