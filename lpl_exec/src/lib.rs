//! # Local planner library.
//!
//! This library allows the binaries and benchmarks in the workspace to access the planner and
//! follower algorithms defined inside the exec crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Data store - owns the planner and follower and carries data between them
pub mod data_store;

/// Path follower - the control side, one control cycle per pose
pub mod follower;

/// Input client - recieves inputs from the network
pub mod input_client;

/// Input processor - routes inputs to the planner and follower
pub mod input_processor;

/// Localisation module - converts state estimates into vehicle poses
pub mod loc;

/// Operator module - joystick axes, driving mode and speed demand
pub mod operator;

/// Output server - publishes outputs to the network
pub mod output_server;

/// Executable parameters
pub mod params;

/// Path library - the precomputed candidate paths and their correspondence grid
pub mod path_lib;

/// Path selection module - picks the best unblocked group of paths
pub mod path_sel;

/// Perception module - turns depth clouds into obstacle clouds
pub mod per;

/// Local planner - the planning side, one plan per obstacle cloud
pub mod planner;

/// Time synchronisation - ring buffers of timestamped samples
pub mod time_sync;

/// Trajectory control module - keeps the vehicle on the track path
pub mod traj_ctrl;
