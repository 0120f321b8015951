//! Cumulative spline evaluation
//!
//! A cumulative spline of degree `K` on a Lie group is
//!
//! ```text
//! g(u) = g_0 · ∏_{j=1..K} exp(B̃_j(u) · v_j),   v_j = log(g_{j-1}⁻¹ · g_j)
//! ```
//!
//! where `B̃_j` are cumulative basis functions (see [`crate::basis`]). The
//! functions here evaluate one segment on the normalized parameter `u ∈ [0, 1]`
//! together with its body velocity, body acceleration and the Jacobian with
//! respect to the `K + 1` control points.

use crate::basis::monomial_derivatives;
use crate::lie::{LieGroup, Tangent, TangentMap};

/// Evaluate `∏_{j=1..K} exp(B̃_j(u) · v_j)` from increments `v_1..v_K`.
///
/// * `vel`, `acc` - receive the right-trivialized first and second derivative
///   with respect to `u`
/// * `jac` - receives the `dof × (K+1)·dof` Jacobian with respect to the
///   control points that generated the increments
///
/// # Panics
/// If `bcum` is not `(K+1)×(K+1)` or `increments` is empty.
pub fn cspline_eval_diff<G: LieGroup>(
    increments: &[Tangent],
    bcum: &nalgebra::DMatrix<f64>,
    u: f64,
    vel: Option<&mut Tangent>,
    acc: Option<&mut Tangent>,
    jac: Option<&mut TangentMap>,
) -> G {
    let k = increments.len();
    assert!(k >= 1, "cumulative spline needs at least one increment");
    assert_eq!(bcum.nrows(), k + 1, "basis matrix has wrong number of rows");
    assert_eq!(bcum.ncols(), k + 1, "basis matrix has wrong number of columns");

    let dof = increments[0].len();
    // w[(d, j)] = d^d/du^d B̃_j(u)
    let w = monomial_derivatives(u, k, 2) * bcum;

    let want_vel = vel.is_some() || acc.is_some();
    let want_acc = acc.is_some();
    let mut g = G::identity(dof);
    let mut v = Tangent::zeros(dof);
    let mut a = Tangent::zeros(dof);

    for (j, vj) in increments.iter().enumerate().map(|(i, x)| (i + 1, x)) {
        let step = G::exp(&(vj * w[(0, j)]));
        g = g.compose(&step);
        if want_vel {
            let ad_inv = step.inverse().adjoint();
            v = &ad_inv * &v + vj * w[(1, j)];
            if want_acc {
                a = &ad_inv * &a + G::ad(&v) * vj * w[(1, j)] + vj * w[(2, j)];
            }
        }
    }

    if let Some(out) = vel {
        *out = v;
    }
    if let Some(out) = acc {
        *out = a;
    }

    if let Some(out) = jac {
        *out = TangentMap::zeros(dof, (k + 1) * dof);
        // inverse of the partial product exp(s_{j+1}) ··· exp(s_K)
        let mut z2inv = G::identity(dof);
        for j in (0..=k).rev() {
            if j != k {
                let vjp = &increments[j];
                let bt = w[(0, j + 1)];
                let sjp = vjp * bt;
                let block = z2inv.adjoint() * G::dr_exp(&sjp) * G::dl_expinv(vjp) * bt;
                let mut view = out.view_mut((0, j * dof), (dof, dof));
                view -= block;
                z2inv = z2inv.compose(&G::exp(&(-sjp)));
            }
            let bt = w[(0, j)];
            let block = if j != 0 {
                let vj = &increments[j - 1];
                z2inv.adjoint() * G::dr_exp(&(vj * bt)) * G::dr_expinv(vj) * bt
            } else {
                z2inv.adjoint() * bt
            };
            let mut view = out.view_mut((0, j * dof), (dof, dof));
            view += block;
        }
    }

    g
}

/// Evaluate a cumulative spline segment from its `K + 1` control points.
///
/// Derivative and Jacobian outputs are as in [`cspline_eval_diff`].
pub fn cspline_eval<G: LieGroup>(
    points: &[G],
    bcum: &nalgebra::DMatrix<f64>,
    u: f64,
    vel: Option<&mut Tangent>,
    acc: Option<&mut Tangent>,
    jac: Option<&mut TangentMap>,
) -> G {
    assert!(points.len() >= 2, "cumulative spline needs at least two control points");
    let increments: Vec<Tangent> = points.windows(2).map(|p| p[1].rminus(&p[0])).collect();
    points[0].compose(&cspline_eval_diff::<G>(&increments, bcum, u, vel, acc, jac))
}
