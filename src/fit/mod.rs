//! Spline fitting
//!
//! [`fit_spline`] interpolates samples `g_0 … g_N` at times `t_0 < … < t_N`
//! with a piecewise Bernstein polynomial. Each tangent coordinate of the
//! increments `log(g_i⁻¹ g_{i+1})` is fitted on its own as a constrained 1-D
//! problem ([`fit_spline_1d`]): every segment starts at 0 and ends at the
//! increment, interior breakpoints are `C^continuity` in time, and boundary
//! conditions pin time derivatives at both ends. When a smoothing order is
//! given the integral of that squared derivative is minimized subject to the
//! constraints; otherwise the constraints determine the solution.
//!
//! All coordinates share one sparse factorization of the constraint system.
//! The coordinate-wise solution is exact for commutative groups only. Above
//! degree two the middle increment of every segment is recomputed so that
//! the product of exponentials reproduces `g_i⁻¹ g_{i+1}` exactly.

mod bspline;

pub use bspline::fit_bspline;

use faer::linalg::solvers::Solve;
use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::basis::{monomial_derivatives, monomial_integral, polynomial_basis, PolynomialBasis};
use crate::curve::Curve;
use crate::lie::{LieGroup, Tangent};
use crate::precision::{KKT_REGULARIZATION, PRUNE};
use crate::{CurveError, Result};

/// Prescribed time derivative at one end of a fitted curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    /// Derivative order, at least 1.
    pub order: usize,
    pub value: Tangent,
}

impl BoundaryCondition {
    pub fn new(order: usize, value: Tangent) -> Self {
        BoundaryCondition { order, value }
    }

    pub fn zero(order: usize, dof: usize) -> Self {
        BoundaryCondition::new(order, Tangent::zeros(dof))
    }
}

/// Shape of a fitted spline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineSpec {
    /// Polynomial degree `K` of every segment.
    pub degree: usize,
    /// Derivative order whose squared integral is minimized, `None` for pure
    /// interpolation.
    pub opt_deg: Option<usize>,
    /// Number of derivatives kept continuous at interior breakpoints.
    pub continuity: usize,
    pub left: Vec<BoundaryCondition>,
    pub right: Vec<BoundaryCondition>,
}

impl SplineSpec {
    /// Degree `K` with `C^{K-1}` breakpoints and free ends.
    ///
    /// Only `K = 1` determines a unique interpolant; higher degrees need a
    /// smoothing order in `opt_deg`.
    pub fn no_constraints(degree: usize) -> Self {
        SplineSpec {
            degree,
            opt_deg: None,
            continuity: degree.saturating_sub(1),
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    pub fn piecewise_linear() -> Self {
        SplineSpec::no_constraints(1)
    }

    /// `C²` cubic with the `p1`:th derivative zero at the start and the
    /// `p2`:th derivative zero at the end.
    ///
    /// `fixed_der_cubic(2, 2, dof)` is the natural cubic spline.
    pub fn fixed_der_cubic(p1: usize, p2: usize, dof: usize) -> Self {
        SplineSpec {
            degree: 3,
            opt_deg: None,
            continuity: 2,
            left: vec![BoundaryCondition::zero(p1, dof)],
            right: vec![BoundaryCondition::zero(p2, dof)],
        }
    }

    /// Degree `K` minimizing the `opt_deg`:th derivative, `C^continuity` at
    /// interior breakpoints and derivatives `1..continuity` zero at both ends.
    pub fn min_derivative(degree: usize, opt_deg: usize, continuity: usize, dof: usize) -> Self {
        let ends: Vec<BoundaryCondition> = (1..continuity)
            .map(|order| BoundaryCondition::zero(order, dof))
            .collect();
        SplineSpec {
            degree,
            opt_deg: Some(opt_deg),
            continuity,
            left: ends.clone(),
            right: ends,
        }
    }

    /// Highest derivative order appearing in a constraint.
    pub fn max_deriv(&self) -> usize {
        self.left
            .iter()
            .chain(&self.right)
            .map(|bc| bc.order)
            .fold(self.continuity, usize::max)
    }

    fn validate(&self, dof: usize) -> Result<()> {
        if self.degree == 0 {
            return Err(CurveError::InvalidSpec("degree must be at least 1".into()));
        }
        for bc in self.left.iter().chain(&self.right) {
            if bc.order == 0 {
                return Err(CurveError::InvalidSpec(
                    "boundary conditions act on derivatives of order 1 or more".into(),
                ));
            }
            if bc.value.len() != dof {
                return Err(CurveError::InvalidSpec(format!(
                    "boundary value of dimension {} for data of dimension {}",
                    bc.value.len(),
                    dof
                )));
            }
        }
        if self.max_deriv() > self.degree {
            return Err(CurveError::InvalidSpec(format!(
                "degree {} cannot carry constraints on derivative {}",
                self.degree,
                self.max_deriv()
            )));
        }
        if let Some(o) = self.opt_deg {
            if o > self.degree {
                return Err(CurveError::InvalidSpec(format!(
                    "degree {} has no derivative of order {} to minimize",
                    self.degree, o
                )));
            }
        }
        Ok(())
    }
}

fn push_pruned(entries: &mut Vec<Triplet<usize, usize, f64>>, row: usize, col: usize, value: f64) {
    if value.abs() > PRUNE {
        entries.push(Triplet::new(row, col, value));
    }
}

/// Solve the sparse square system given by `entries` for every column of `rhs`.
///
/// One LU factorization is shared by all right hand sides.
fn solve_sparse(size: usize, entries: &[Triplet<usize, usize, f64>], rhs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let singular = |what: &str| CurveError::SingularSystem(format!("spline constraint system: {}", what));
    let mat = SparseColMat::<usize, f64>::try_new_from_triplets(size, size, entries)
        .map_err(|e| singular(&format!("{:?}", e)))?;
    let lu = mat.sp_lu().map_err(|e| singular(&format!("{:?}", e)))?;

    let b = Mat::from_fn(size, rhs.ncols(), |i, j| rhs[(i, j)]);
    let x = lu.solve(&b);
    let out = DMatrix::from_fn(size, rhs.ncols(), |i, j| x[(i, j)]);
    if out.iter().all(|v| v.is_finite()) {
        Ok(out)
    } else {
        Err(singular("factorization is singular"))
    }
}

/// Bernstein coefficients of every column of `dxs` (one row per segment).
///
/// Boundary values of `spec` have one entry per column of `dxs`. The result
/// has `(K+1)·N` rows, segment by segment, and one column per column of `dxs`.
fn fit_coefficients(dts: &[f64], dxs: &DMatrix<f64>, spec: &SplineSpec) -> Result<DMatrix<f64>> {
    let n = dts.len().min(dxs.nrows());
    if n == 0 {
        return Err(CurveError::InsufficientData("need at least one segment".into()));
    }
    if let Some(dt) = dts[..n].iter().find(|dt| !(**dt > 0.0) || !dt.is_finite()) {
        return Err(CurveError::NotMonotonic(format!(
            "segment durations must be positive, got {}",
            dt
        )));
    }
    let dims = dxs.ncols();
    spec.validate(dims)?;

    let k = spec.degree;
    let d = spec.max_deriv();
    let basis = polynomial_basis(PolynomialBasis::Bernstein, k);
    // row i: i:th derivative of the basis polynomials at u = 0 (resp. 1)
    let u0 = monomial_derivatives(0.0, k, d) * &basis;
    let u1 = monomial_derivatives(1.0, k, d) * &basis;

    let n_coef = (k + 1) * n;
    let n_eq = spec.left.len() + 2 * n + (n - 1) * spec.continuity + spec.right.len();
    match spec.opt_deg {
        None if n_eq != n_coef => {
            return Err(CurveError::InvalidSpec(format!(
                "{} constraints do not determine {} coefficients",
                n_eq, n_coef
            )))
        }
        Some(_) if n_eq > n_coef => {
            return Err(CurveError::InvalidSpec(format!(
                "{} constraints exceed {} coefficients",
                n_eq, n_coef
            )))
        }
        _ => {}
    }
    log::debug!(
        "fitting {} segments of degree {}: {} coefficients, {} constraints, {} coordinates",
        n,
        k,
        n_coef,
        n_eq,
        dims
    );

    // constraint rows are placed after the cost block of the KKT system; a
    // pure interpolation has no cost block
    let offset = if spec.opt_deg.is_some() { n_coef } else { 0 };
    let size = offset + n_eq;
    let mut entries = Vec::with_capacity(size * 2 * (k + 1));
    let constraint = |entries: &mut Vec<Triplet<usize, usize, f64>>, row: usize, col: usize, value: f64| {
        push_pruned(entries, offset + row, col, value);
        if offset > 0 {
            push_pruned(entries, col, offset + row, value);
        }
    };
    let mut b = DMatrix::zeros(size, dims);
    let mut m = 0;

    for bc in &spec.left {
        let fac = dts[0].powi(-(bc.order as i32));
        for j in 0..=k {
            constraint(&mut entries, m, j, u0[(bc.order, j)] * fac);
        }
        b.row_mut(offset + m).copy_from(&bc.value.transpose());
        m += 1;
    }

    for i in 0..n {
        for j in 0..=k {
            constraint(&mut entries, m, i * (k + 1) + j, u0[(0, j)]);
        }
        m += 1;
        for j in 0..=k {
            constraint(&mut entries, m, i * (k + 1) + j, u1[(0, j)]);
        }
        b.row_mut(offset + m).copy_from(&dxs.row(i));
        m += 1;
    }

    for (i, pair) in dts[..n].windows(2).enumerate() {
        for order in 1..=spec.continuity {
            let fac1 = pair[0].powi(-(order as i32));
            let fac2 = pair[1].powi(-(order as i32));
            for j in 0..=k {
                constraint(&mut entries, m, i * (k + 1) + j, u1[(order, j)] * fac1);
                constraint(&mut entries, m, (i + 1) * (k + 1) + j, -u0[(order, j)] * fac2);
            }
            m += 1;
        }
    }

    for bc in &spec.right {
        let fac = dts[n - 1].powi(-(bc.order as i32));
        for j in 0..=k {
            constraint(&mut entries, m, (n - 1) * (k + 1) + j, u1[(bc.order, j)] * fac);
        }
        b.row_mut(offset + m).copy_from(&bc.value.transpose());
        m += 1;
    }
    debug_assert_eq!(m, n_eq);

    if let Some(opt_deg) = spec.opt_deg {
        // min ½ xᵀQx s.t. Ax = b through [Q Aᵀ; A 0] [x; λ] = [0; b]. On a
        // segment of duration T, ∫ |p^(o)(t)|² dt = T^(1-2o) ∫ |p^(o)(u)|² du.
        let cost = basis.transpose() * monomial_integral(k, opt_deg) * &basis;
        for (i, dt) in dts[..n].iter().enumerate() {
            let fac = dt.powi(1 - 2 * opt_deg as i32);
            for ki in 0..=k {
                for kj in 0..=k {
                    let reg = if ki == kj { KKT_REGULARIZATION } else { 0.0 };
                    push_pruned(&mut entries, i * (k + 1) + ki, i * (k + 1) + kj, fac * cost[(ki, kj)] + reg);
                }
            }
        }
    }

    let sol = solve_sparse(size, &entries, &b)?;
    Ok(sol.rows(0, n_coef).clone_owned())
}

/// Fit one coordinate over segments of durations `dts` with end values `dxs`.
///
/// Returns the `(K+1)·N` Bernstein coefficients, segment by segment. Boundary
/// values of `spec` must be one dimensional.
pub fn fit_spline_1d(dts: &[f64], dxs: &[f64], spec: &SplineSpec) -> Result<DVector<f64>> {
    let n = dts.len().min(dxs.len());
    let data = DMatrix::from_column_slice(n, 1, &dxs[..n]);
    let coefs = fit_coefficients(&dts[..n], &data, spec)?;
    Ok(coefs.column(0).clone_owned())
}

/// Interpolating spline through `gs` at times `ts`.
///
/// Uses the first `min(ts.len(), gs.len())` samples. The result starts at
/// `ts[0]` with value `gs[0]`.
///
/// # Errors
/// * [`CurveError::InsufficientData`] with fewer than two samples
/// * [`CurveError::NotMonotonic`] unless times strictly increase
/// * [`CurveError::InvalidSpec`] if `spec` does not fit the degree or data
/// * [`CurveError::SingularSystem`] if the constraints are not solvable
pub fn fit_spline<G: LieGroup>(ts: &[f64], gs: &[G], spec: &SplineSpec) -> Result<Curve<G>> {
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
    let dof = gs[0].dof();
    spec.validate(dof)?;

    let k = spec.degree;
    let dts: Vec<f64> = ts[..n].windows(2).map(|w| w[1] - w[0]).collect();
    let mut dgs = DMatrix::zeros(n - 1, dof);
    for (i, w) in gs[..n].windows(2).enumerate() {
        dgs.row_mut(i).copy_from(&w[1].rminus(&w[0]).transpose());
    }

    let coefs = fit_coefficients(&dts, &dgs, spec)?;

    let mut curve = Curve::starting_at(ts[0], gs[0].clone());
    for (i, dt) in dts.iter().enumerate() {
        let base = i * (k + 1);
        // cumulative form: v_j = x_j - x_{j-1}
        let mut incs: Vec<Tangent> = (0..k)
            .map(|j| (coefs.row(base + j + 1) - coefs.row(base + j)).transpose())
            .collect();

        // for degree 2 the middle increment alone sets the end velocity
        if k > 2 {
            let mid = k / 2;
            let mut midval = gs[i].inverse().compose(&gs[i + 1]);
            for v in &incs[..mid] {
                midval = G::exp(&(-v)).compose(&midval);
            }
            for v in incs[mid + 1..].iter().rev() {
                midval = midval.compose(&G::exp(&(-v)));
            }
            incs[mid] = midval.log();
        }

        curve.push_segment(*dt, incs)?;
    }
    Ok(curve)
}

/// Natural cubic spline through `gs` at times `ts`.
pub fn fit_spline_cubic<G: LieGroup>(ts: &[f64], gs: &[G]) -> Result<Curve<G>> {
    let dof = gs
        .first()
        .map(|g| g.dof())
        .ok_or_else(|| CurveError::InsufficientData("no samples".into()))?;
    fit_spline(ts, gs, &SplineSpec::fixed_der_cubic(2, 2, dof))
}
