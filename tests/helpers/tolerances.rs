//! Tolerance constants for timing tests.
//!
//! Times are f64 seconds. Pick the loosest level the assertion can stand.

/// Rounding through closed-form warp segments and clock anchors.
pub const TIME_EPSILON: f64 = 1e-9;

/// Bisection inside tempo curves.
pub const CURVE_EPSILON: f64 = 1e-6;

/// One millisecond; coarse checks on scheduled click times.
pub const MS: f64 = 1e-3;
