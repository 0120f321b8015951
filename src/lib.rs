//! liecurve: piecewise polynomial curves on Lie groups
//!
//! Curves whose values live on a Lie group, fitting of such curves to
//! sampled data, and time reparameterization under velocity and acceleration
//! bounds.

pub mod basis;
pub mod bspline;
pub mod cspline;
pub mod curve;
pub mod fit;
pub mod lie;
pub mod optim;
pub mod precision;
pub mod reparam;

// Re-exports for convenience
pub use bspline::BSpline;
pub use cspline::{cspline_eval, cspline_eval_diff};
pub use curve::{Curve, Segment, Trajectory};
pub use fit::{fit_bspline, fit_spline, fit_spline_1d, fit_spline_cubic, BoundaryCondition, SplineSpec};
pub use lie::{LieGroup, Rn, Tangent, TangentMap, SE2, SO2, SO3};
pub use optim::{minimize, LeastSquaresProblem, MinimizeOptions, MinimizeSummary, Termination};
pub use reparam::{reparameterize, KinematicBounds, ReparamOptions};

/// Tolerance for comparisons of group elements
pub const TOLERANCE: f64 = 1e-6;

/// Result type for curve operations
pub type Result<T> = std::result::Result<T, CurveError>;

#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid spline spec: {0}")]
    InvalidSpec(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Not monotonic: {0}")]
    NotMonotonic(String),

    #[error("Singular system: {0}")]
    SingularSystem(String),
}
