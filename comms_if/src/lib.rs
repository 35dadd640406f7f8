//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the navigation software: the types passed
//! between the camera server, the navigation executable, the base controller, and any
//! diagnostics viewer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and data definitions for equipment (cameras, base velocity, diagnostics)
pub mod eqpt;

/// Network module
pub mod net;
