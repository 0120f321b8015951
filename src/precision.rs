//! Precision constants for numerical comparisons.
//!
//! These values are shared by the evaluator, the fitter and the
//! reparameterization pass. Changing them shifts the trade-off between
//! robustness near singular configurations and accuracy elsewhere.

/// Angle below which closed-form group maps switch to their second order
/// Taylor expansions.
/// Value: 1.0e-5
pub const SMALL_ANGLE: f64 = 1.0e-5;

/// Threshold below which a velocity or acceleration component is treated as
/// zero during reparameterization. Avoids division by near-zero components.
/// Value: 1.0e-8
pub const DERIVATIVE_EPS: f64 = 1.0e-8;

/// Entries of assembled constraint matrices with magnitude below this value
/// are dropped before factorization.
/// Value: 1.0e-9
pub const PRUNE: f64 = 1.0e-9;

/// Diagonal regularization added to the quadratic cost of a smoothing fit.
/// Keeps the KKT system non-singular when the cost is only semi-definite.
/// Value: 1.0e-6
pub const KKT_REGULARIZATION: f64 = 1.0e-6;

/// Determinant magnitude below which a Jacobian of the exponential is treated
/// as singular.
/// Value: 1.0e-10
pub const SINGULAR_DET: f64 = 1.0e-10;

/// Relative size of a series term at which power series of `ad` are truncated.
/// Value: 1.0e-15
pub const SERIES: f64 = 1.0e-15;

/// Maximum number of terms evaluated in a power series of `ad`.
pub const SERIES_MAX_TERMS: usize = 40;
