//! # Navigation library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items
//! defined inside the navigation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Camera client - requests and recieves images from the camera server
pub mod cam_client;

/// Diagnostics server - publishes per-cycle diagnostics and images
pub mod diag_server;

/// Feature extraction - the interface to the crop row detector and its replay implementation
pub mod feature;

/// Navigation control module - the mode and camera state machine
pub mod nav_ctrl;

/// Navigation loop - gates incoming frames on the active camera and routes cycle outputs
pub mod nav_loop;

/// Executable parameters
pub mod params;

/// Velocity client - publishes velocity commands to the robot base
pub mod vel_client;

/// Visual servoing control module - camera model and control law
pub mod vs_ctrl;
