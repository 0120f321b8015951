//! Least squares fit of a uniform B-spline to scattered samples.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::basis::{cumulative_basis, PolynomialBasis};
use crate::bspline::BSpline;
use crate::cspline::cspline_eval;
use crate::lie::{LieGroup, TangentMap};
use crate::optim::{minimize, LeastSquaresProblem, MinimizeOptions};
use crate::{CurveError, Result};

/// Sum of squared residuals `spline(t_i) ⊖ g_i` over the control points.
struct BSplineObjective<'a, G> {
    ts: &'a [f64],
    gs: &'a [G],
    t0: f64,
    dt: f64,
    degree: usize,
    num_pts: usize,
    bcum: DMatrix<f64>,
}

impl<G: LieGroup> BSplineObjective<'_, G> {
    /// Index of the first control point of the segment containing `t`, and
    /// the normalized parameter in that segment.
    fn locate(&self, t: f64) -> (usize, f64) {
        let last = self.num_pts - self.degree - 1;
        let i = (((t - self.t0) / self.dt).floor().max(0.0) as usize).min(last);
        let u = ((t - self.t0 - i as f64 * self.dt) / self.dt).clamp(0.0, 1.0);
        (i, u)
    }
}

impl<G: LieGroup> LeastSquaresProblem<G> for BSplineObjective<'_, G> {
    fn residuals(&self, x: &[G]) -> DVector<f64> {
        let dof = self.gs[0].dof();
        let mut out = DVector::zeros(dof * self.ts.len());
        for (i, (t, g)) in self.ts.iter().zip(self.gs).enumerate() {
            let (istar, u) = self.locate(*t);
            let val = cspline_eval(&x[istar..=istar + self.degree], &self.bcum, u, None, None, None);
            out.rows_mut(i * dof, dof).copy_from(&val.rminus(g));
        }
        out
    }

    fn jacobian(&self, x: &[G]) -> CscMatrix<f64> {
        let dof = self.gs[0].dof();
        let width = (self.degree + 1) * dof;
        let mut coo = CooMatrix::new(dof * self.ts.len(), dof * self.num_pts);
        for (i, (t, g)) in self.ts.iter().zip(self.gs).enumerate() {
            let (istar, u) = self.locate(*t);
            let mut d_val_pts = TangentMap::zeros(dof, width);
            let val = cspline_eval(
                &x[istar..=istar + self.degree],
                &self.bcum,
                u,
                None,
                None,
                Some(&mut d_val_pts),
            );
            let d_res_pts = G::dr_expinv(&val.rminus(g)) * d_val_pts;
            for r in 0..dof {
                for c in 0..width {
                    coo.push(i * dof + r, istar * dof + c, d_res_pts[(r, c)]);
                }
            }
        }
        CscMatrix::from(&coo)
    }
}

/// Fit a degree `degree` B-spline with knot distance `dt` to samples `gs`
/// taken at times `ts`.
///
/// The spline starts at `ts[0]` and covers the last sample. The fit runs a
/// few Levenberg-Marquardt iterations with loose tolerances.
pub fn fit_bspline<G: LieGroup>(ts: &[f64], gs: &[G], dt: f64, degree: usize) -> Result<BSpline<G>> {
    let n = ts.len().min(gs.len());
    if n < 2 {
        return Err(CurveError::InsufficientData(format!(
            "need at least two samples, got {}",
            n
        )));
    }
    if ts[..n].windows(2).any(|w| !(w[1] > w[0])) {
        return Err(CurveError::NotMonotonic("sample times must be strictly increasing".into()));
    }
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(CurveError::InvalidArgument(format!(
            "knot distance must be positive, got {}",
            dt
        )));
    }
    if degree == 0 {
        return Err(CurveError::InvalidArgument("B-spline degree must be at least 1".into()));
    }

    let (ts, gs) = (&ts[..n], &gs[..n]);
    let (t0, t1) = (ts[0], ts[n - 1]);
    let num_pts = degree + ((t1 - t0 + dt) / dt).floor() as usize;
    let objective = BSplineObjective {
        ts,
        gs,
        t0,
        dt,
        degree,
        num_pts,
        bcum: cumulative_basis(PolynomialBasis::Bspline, degree),
    };

    // initial guess: sample nearest to where each control point acts
    let mut ctrl_pts = Vec::with_capacity(num_pts);
    let mut j = 0;
    for i in 0..num_pts {
        let target = t0 + (i as f64 - (degree as f64 - 1.0) / 2.0) * dt;
        while j + 1 < n && (target - ts[j + 1]).abs() < (target - ts[j]).abs() {
            j += 1;
        }
        ctrl_pts.push(gs[j].clone());
    }

    let opts = MinimizeOptions {
        ptol: 1e-3,
        ftol: 1e-3,
        max_iter: 10,
        verbose: false,
    };
    let summary = minimize(&objective, &mut ctrl_pts, &opts);
    log::debug!(
        "fitted {} control points to {} samples: cost {:.3e} -> {:.3e}",
        num_pts,
        n,
        summary.initial_cost,
        summary.final_cost
    );

    BSpline::new(t0, dt, degree, ctrl_pts)
}
