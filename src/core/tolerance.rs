//! Geometric tolerances shared by all predicates.

/// Planar epsilon in meters. Rings are simple within this tolerance.
pub const EPS_PLANE: f64 = 1e-6;

/// Positional epsilon in meters for degenerate-direction checks.
pub const EPS_POS: f64 = 1e-9;

/// Weld tolerance for vertex quantization during triangulation.
pub const EPS_WELD: f64 = 1e-6;
