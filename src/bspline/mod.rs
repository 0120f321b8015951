//! Uniform cumulative B-splines on Lie groups
//!
//! Control points are spaced `dt` apart; the segment starting at
//! `t0 + i·dt` is driven by control points `i..=i+K`. The curve is `C^{K-1}`
//! but does not pass through its control points.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::basis::{cached_cumulative_basis, PolynomialBasis};
use crate::cspline::cspline_eval;
use crate::curve::Trajectory;
use crate::lie::{LieGroup, Tangent, TangentMap};
use crate::{CurveError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSpline<G> {
    t0: f64,
    dt: f64,
    degree: usize,
    ctrl_pts: Vec<G>,
}

impl<G: LieGroup> BSpline<G> {
    /// # Errors
    /// [`CurveError::InvalidArgument`] for a non-positive knot distance or a
    /// zero degree, [`CurveError::InsufficientData`] with fewer than
    /// `degree + 1` control points.
    pub fn new(t0: f64, dt: f64, degree: usize, ctrl_pts: Vec<G>) -> Result<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(CurveError::InvalidArgument(format!(
                "knot distance must be positive, got {}",
                dt
            )));
        }
        if degree == 0 {
            return Err(CurveError::InvalidArgument("B-spline degree must be at least 1".into()));
        }
        if ctrl_pts.len() < degree + 1 {
            return Err(CurveError::InsufficientData(format!(
                "degree {} B-spline needs {} control points, got {}",
                degree,
                degree + 1,
                ctrl_pts.len()
            )));
        }
        Ok(BSpline {
            t0,
            dt,
            degree,
            ctrl_pts,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn ctrl_pts(&self) -> &[G] {
        &self.ctrl_pts
    }

    pub fn t_min(&self) -> f64 {
        self.t0
    }

    pub fn t_max(&self) -> f64 {
        self.t0 + (self.ctrl_pts.len() - self.degree) as f64 * self.dt
    }

    /// Segment index and normalized parameter of time `t`.
    pub(crate) fn locate(&self, t: f64) -> (usize, f64) {
        let last = self.ctrl_pts.len() - self.degree - 1;
        let t = t.clamp(self.t_min(), self.t_max());
        let i = (((t - self.t0) / self.dt).floor().max(0.0) as usize).min(last);
        let u = ((t - self.t0 - i as f64 * self.dt) / self.dt).clamp(0.0, 1.0);
        (i, u)
    }

    pub(crate) fn basis(&self) -> Cow<'static, DMatrix<f64>> {
        cached_cumulative_basis(PolynomialBasis::Bspline, self.degree)
    }

    pub fn eval(&self, t: f64) -> G {
        self.eval_with(t, None, None)
    }

    /// Value at `t` (clamped to the domain) with optional body velocity and
    /// acceleration.
    pub fn eval_with(&self, t: f64, vel: Option<&mut Tangent>, acc: Option<&mut Tangent>) -> G {
        let (i, u) = self.locate(t);
        let pts = &self.ctrl_pts[i..=i + self.degree];
        let mut vel = vel;
        let mut acc = acc;
        let g = cspline_eval(pts, &self.basis(), u, vel.as_deref_mut(), acc.as_deref_mut(), None);
        if let Some(v) = vel {
            *v /= self.dt;
        }
        if let Some(a) = acc {
            *a /= self.dt * self.dt;
        }
        g
    }

    /// Value at `t` and its Jacobian with respect to the `K + 1` control
    /// points starting at the returned index.
    pub fn eval_jacobian(&self, t: f64) -> (G, usize, TangentMap) {
        let (i, u) = self.locate(t);
        let dof = self.ctrl_pts[0].dof();
        let mut jac = TangentMap::zeros(dof, (self.degree + 1) * dof);
        let pts = &self.ctrl_pts[i..=i + self.degree];
        let g = cspline_eval(pts, &self.basis(), u, None, None, Some(&mut jac));
        (g, i, jac)
    }
}

impl<G: LieGroup> Trajectory for BSpline<G> {
    type Group = G;

    fn t_min(&self) -> f64 {
        BSpline::t_min(self)
    }

    fn t_max(&self) -> f64 {
        BSpline::t_max(self)
    }

    fn eval_with(&self, t: f64, vel: Option<&mut Tangent>, acc: Option<&mut Tangent>) -> G {
        BSpline::eval_with(self, t, vel, acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lie::{Rn, SO3};

    #[test]
    fn test_domain() {
        let pts = vec![SO3::identity(3); 6];
        let b = BSpline::new(1.0, 0.5, 3, pts).unwrap();
        assert_eq!(b.t_min(), 1.0);
        assert_eq!(b.t_max(), 2.5);
        assert_eq!(b.locate(2.5), (2, 1.0));
        assert_eq!(b.locate(0.0), (0, 0.0));
        assert_eq!(b.locate(1.75).0, 1);
    }

    #[test]
    fn test_linear_data_is_reproduced() {
        // uniform B-splines reproduce linear functions
        let pts: Vec<Rn> = (0..8).map(|i| Rn::scalar(i as f64)).collect();
        let b = BSpline::new(0.0, 1.0, 3, pts).unwrap();
        let mut vel = Tangent::zeros(1);
        let mut acc = Tangent::zeros(1);
        let g = b.eval_with(2.3, Some(&mut vel), Some(&mut acc));
        assert!((g.x() - 3.3).abs() < 1e-12);
        assert!((vel[0] - 1.0).abs() < 1e-12);
        assert!(acc[0].abs() < 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(21);
        let pts: Vec<SO3> = (0..6).map(|_| SO3::random(&mut rng, 3)).collect();
        let b = BSpline::new(0.0, 0.5, 3, pts.clone()).unwrap();
        let t = 0.9;
        let (g, first, jac) = b.eval_jacobian(t);
        assert_eq!(first, 1);

        let h = 1e-6;
        for p in 0..4 {
            for c in 0..3 {
                let mut pert = pts.clone();
                let mut e = Tangent::zeros(3);
                e[c] = h;
                pert[first + p] = pert[first + p].rplus(&e);
                let gp = BSpline::new(0.0, 0.5, 3, pert).unwrap().eval(t);
                let fd = gp.rminus(&g) / h;
                for r in 0..3 {
                    assert!((fd[r] - jac[(r, p * 3 + c)]).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_too_few_points() {
        let pts = vec![SO3::identity(3); 3];
        assert!(matches!(
            BSpline::new(0.0, 1.0, 3, pts),
            Err(CurveError::InsufficientData(_))
        ));
    }
}
