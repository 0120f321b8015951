//! Time reparameterization under velocity and acceleration bounds
//!
//! Given a path `x(s)`, [`reparameterize`] computes a monotone time warp
//! `s(t)` such that `x(s(t))` has body velocity `x'(s)·ṡ` and body
//! acceleration `x'(s)·s̈ + x''(s)·ṡ²` inside component-wise bounds.
//!
//! The path parameter is sampled on a uniform grid. A backward pass computes
//! the largest squared speed `ṡ²` at every grid point from which the end of
//! the path can still be reached within the bounds; a forward pass then
//! accelerates as hard as allowed below that envelope. Each grid cell becomes
//! one quadratic segment of the output.

use serde::{Deserialize, Serialize};

use crate::curve::{Curve, Trajectory};
use crate::lie::{LieGroup, Rn, Tangent};
use crate::precision::DERIVATIVE_EPS;
use crate::{CurveError, Result};

/// Component-wise limits on body velocity and acceleration.
///
/// Every minimum must be negative and every maximum positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicBounds {
    pub vel_min: Tangent,
    pub vel_max: Tangent,
    pub acc_min: Tangent,
    pub acc_max: Tangent,
}

impl KinematicBounds {
    /// Bounds `[-vel, vel]` and `[-acc, acc]`.
    pub fn symmetric(vel: Tangent, acc: Tangent) -> Self {
        KinematicBounds {
            vel_min: -&vel,
            vel_max: vel,
            acc_min: -&acc,
            acc_max: acc,
        }
    }

    fn validate(&self, dof: usize) -> Result<()> {
        let all = [&self.vel_min, &self.vel_max, &self.acc_min, &self.acc_max];
        if all.iter().any(|b| b.len() != dof) {
            return Err(CurveError::InvalidArgument(format!(
                "bounds must have dimension {}",
                dof
            )));
        }
        if self.vel_min.max() >= 0.0 || self.acc_min.max() >= 0.0 {
            return Err(CurveError::InvalidArgument("lower bounds must be negative".into()));
        }
        if self.vel_max.min() <= 0.0 || self.acc_max.min() <= 0.0 {
            return Err(CurveError::InvalidArgument("upper bounds must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReparamOptions {
    /// Requested `ṡ` at the start.
    pub start_vel: f64,
    /// Requested `ṡ` at the end; infinity leaves it free.
    pub end_vel: f64,
    /// Number of grid cells.
    pub grid_size: usize,
}

impl Default for ReparamOptions {
    fn default() -> Self {
        ReparamOptions {
            start_vel: 1.0,
            end_vel: f64::INFINITY,
            grid_size: 100,
        }
    }
}

/// Acceleration interval `[lower, upper]` available along the path at squared
/// speed `v2`, given path derivatives `vel` and `acc`.
///
/// The bound on component `j` is `acc_min_j ≤ vel_j·a + acc_j·v2 ≤ acc_max_j`.
fn acceleration_limits(bounds: &KinematicBounds, vel: &Tangent, acc: &Tangent, v2: f64) -> (f64, f64) {
    let mut lower = f64::NEG_INFINITY;
    let mut upper = f64::INFINITY;
    for j in 0..vel.len() {
        let hi = (bounds.acc_max[j] - acc[j] * v2).max(0.0);
        let lo = (bounds.acc_min[j] - acc[j] * v2).min(0.0);
        if vel[j] > DERIVATIVE_EPS {
            lower = lower.max(lo / vel[j]);
            upper = upper.min(hi / vel[j]);
        } else if vel[j] < -DERIVATIVE_EPS {
            lower = lower.max(hi / vel[j]);
            upper = upper.min(lo / vel[j]);
        }
    }
    (lower, upper)
}

/// Largest squared speed at which velocity bounds and zero path acceleration
/// are feasible.
fn speed_limit(bounds: &KinematicBounds, vel: &Tangent, acc: &Tangent) -> f64 {
    let mut v2 = f64::INFINITY;
    for j in 0..vel.len() {
        if vel[j] > DERIVATIVE_EPS {
            v2 = v2.min((bounds.vel_max[j] / vel[j]).powi(2));
        } else if vel[j] < -DERIVATIVE_EPS {
            v2 = v2.min((bounds.vel_min[j] / vel[j]).powi(2));
        }
        if acc[j] > DERIVATIVE_EPS {
            v2 = v2.min(bounds.acc_max[j] / acc[j]);
        } else if acc[j] < -DERIVATIVE_EPS {
            v2 = v2.min(bounds.acc_min[j] / acc[j]);
        }
    }
    v2
}

/// Time warp `s(t)` over `[0, t_end]` with `s(0) = path.t_min()` and
/// `s(t_end) = path.t_max()`.
///
/// The result is a scalar curve of degree 2 with one segment per grid cell.
/// Boundary speeds that cannot be reached within the bounds are lowered
/// silently.
///
/// # Errors
/// [`CurveError::InvalidArgument`] for bounds of the wrong dimension or sign,
/// negative boundary speeds, an empty grid or an empty path.
pub fn reparameterize<P: Trajectory>(
    path: &P,
    bounds: &KinematicBounds,
    opts: &ReparamOptions,
) -> Result<Curve<Rn>> {
    let s0 = path.t_min();
    let sf = path.t_max();
    if !(sf > s0) {
        return Err(CurveError::InvalidArgument(format!(
            "path domain [{}, {}] is empty",
            s0, sf
        )));
    }
    if opts.grid_size == 0 {
        return Err(CurveError::InvalidArgument("grid needs at least one cell".into()));
    }
    if !(opts.start_vel >= 0.0) || !(opts.end_vel >= 0.0) {
        return Err(CurveError::InvalidArgument("boundary speeds must be non-negative".into()));
    }
    let dof = path.eval(s0).dof();
    bounds.validate(dof)?;

    let n = opts.grid_size;
    let ds = (sf - s0) / n as f64;
    let mut vel = Tangent::zeros(dof);
    let mut acc = Tangent::zeros(dof);

    // backward pass: reachable squared speed envelope
    let mut v2max = vec![0.0; n + 1];
    v2max[n] = opts.end_vel * opts.end_vel;
    for i in (0..=n).rev() {
        path.eval_with(s0 + ds * i as f64, Some(&mut vel), Some(&mut acc));
        if i < n {
            let (lower, _) = acceleration_limits(bounds, &vel, &acc, v2max[i + 1]);
            // hardest braking that still ends below the envelope at i + 1
            v2max[i] = v2max[i + 1] - 2.0 * ds * lower;
        }
        v2max[i] = v2max[i].min(speed_limit(bounds, &vel, &acc));
    }

    log::debug!(
        "reparameterizing [{}, {}] on {} cells, peak speed {:.3}",
        s0,
        sf,
        n,
        v2max.iter().cloned().fold(0.0, f64::max).sqrt()
    );

    // forward pass: accelerate as hard as allowed below the envelope
    let mut out = Curve::starting_at(0.0, Rn::scalar(s0));
    let mut v2 = (opts.start_vel * opts.start_vel).min(v2max[0]);
    for i in 0..n {
        path.eval_with(s0 + ds * i as f64, Some(&mut vel), Some(&mut acc));
        let vi = v2.max(DERIVATIVE_EPS).sqrt();
        let (_, upper) = acceleration_limits(bounds, &vel, &acc, v2);
        let mut ai = upper.min((v2max[i + 1] - v2) / (2.0 * ds));
        if !ai.is_finite() {
            ai = 0.0;
        }

        let mut dt = if ai.abs() < DERIVATIVE_EPS {
            ds / vi
        } else {
            (-vi + (vi * vi + 2.0 * ds * ai).max(DERIVATIVE_EPS).sqrt()) / ai
        };
        if !(dt > 0.0) || !dt.is_finite() {
            // braking from the speed floor
            dt = ds / vi;
            ai = 0.0;
        }

        // s(u) = s_i + B̃₁(u)·c₁ + B̃₂(u)·c₂ with ṡ(0) = vi
        let c1 = dt * vi / 2.0;
        let seg_ds = if i + 1 == n { sf - out.end().x() } else { ds };
        let incs = vec![Tangent::from_element(1, c1), Tangent::from_element(1, seg_ds - c1)];
        log::trace!("cell {}: speed {:.4}, acceleration {:.4}, duration {:.4}", i, vi, ai, dt);
        out.push_segment(dt, incs)?;

        v2 = (vi * vi + 2.0 * ai * ds).max(DERIVATIVE_EPS);
    }

    log::debug!("reparameterized duration {:.4}", out.t_max());
    Ok(out)
}
