//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the
//! message definitions exchanged with the estimator, depth sensor, operator
//! and flight controller, and the networking layer they travel over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Input and output message definitions
pub mod msg;

/// Network module
pub mod net;
