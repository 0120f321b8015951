//! Polynomial bases on the unit interval
//!
//! Polynomials of degree `K` are represented by coefficients in a basis; a
//! basis matrix `B` of size `(K+1)×(K+1)` maps basis coefficients to monomial
//! coefficients, so that `p(u) = [1 u u² … u^K] · B · x`.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Polynomial families used by splines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolynomialBasis {
    /// Bernstein polynomials (Bézier curves).
    Bernstein,
    /// Blending functions of a uniform B-spline.
    Bspline,
}

fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, i| acc * i as f64)
}

/// Basis matrix of degree `degree`.
///
/// Entry `(m, i)` is the coefficient of `u^m` in the `i`:th basis polynomial.
pub fn polynomial_basis(basis: PolynomialBasis, degree: usize) -> DMatrix<f64> {
    let k = degree;
    match basis {
        PolynomialBasis::Bernstein => DMatrix::from_fn(k + 1, k + 1, |m, i| {
            if m < i {
                0.0
            } else {
                let sign = if (m - i) % 2 == 0 { 1.0 } else { -1.0 };
                sign * binomial(k, i) * binomial(k - i, m - i)
            }
        }),
        PolynomialBasis::Bspline => {
            let scale = 1.0 / factorial(k);
            DMatrix::from_fn(k + 1, k + 1, |m, j| {
                let sum: f64 = (j..=k)
                    .map(|s| {
                        let sign = if (s - j) % 2 == 0 { 1.0 } else { -1.0 };
                        // 0^0 = 1
                        sign * binomial(k + 1, s - j) * ((k - s) as f64).powi((k - m) as i32)
                    })
                    .sum();
                scale * binomial(k, m) * sum
            })
        }
    }
}

/// Cumulative basis matrix: column `j` holds `B̃_j = Σ_{i ≥ j} B_i`.
///
/// For a partition of unity `B̃_0 ≡ 1`.
pub fn cumulative_basis(basis: PolynomialBasis, degree: usize) -> DMatrix<f64> {
    let mut m = polynomial_basis(basis, degree);
    for j in (0..degree).rev() {
        let next = m.column(j + 1).clone_owned();
        let mut col = m.column_mut(j);
        col += next;
    }
    m
}

/// Highest degree kept by [`cached_cumulative_basis`].
pub const MAX_CACHED_DEGREE: usize = 10;

/// [`cumulative_basis`] computed once per family and degree.
///
/// Degrees above [`MAX_CACHED_DEGREE`] are built on every call.
pub fn cached_cumulative_basis(basis: PolynomialBasis, degree: usize) -> Cow<'static, DMatrix<f64>> {
    static BERNSTEIN: OnceLock<Vec<DMatrix<f64>>> = OnceLock::new();
    static BSPLINE: OnceLock<Vec<DMatrix<f64>>> = OnceLock::new();

    if degree > MAX_CACHED_DEGREE {
        return Cow::Owned(cumulative_basis(basis, degree));
    }
    let table = match basis {
        PolynomialBasis::Bernstein => &BERNSTEIN,
        PolynomialBasis::Bspline => &BSPLINE,
    };
    let table = table.get_or_init(|| (0..=MAX_CACHED_DEGREE).map(|k| cumulative_basis(basis, k)).collect());
    Cow::Borrowed(&table[degree])
}

/// Derivatives of the monomial vector `[1 u … u^K]`.
///
/// Row `d` of the `(max_deriv+1)×(K+1)` result is `d^d/du^d [1 u … u^K]`.
pub fn monomial_derivatives(u: f64, degree: usize, max_deriv: usize) -> DMatrix<f64> {
    DMatrix::from_fn(max_deriv + 1, degree + 1, |d, m| {
        if m < d {
            0.0
        } else {
            let falling = ((m - d + 1)..=m).fold(1.0, |acc, f| acc * f as f64);
            falling * u.powi((m - d) as i32)
        }
    })
}

/// `deriv`:th derivative at `u` of the polynomial with basis coefficients
/// `coefs`.
pub fn evaluate_polynomial(basis: PolynomialBasis, coefs: &[f64], u: f64, deriv: usize) -> f64 {
    assert!(!coefs.is_empty(), "polynomial needs at least one coefficient");
    let degree = coefs.len() - 1;
    let b = polynomial_basis(basis, degree);
    let row = monomial_derivatives(u, degree, deriv).row(deriv).clone_owned();
    (row * b * nalgebra::DVector::from_column_slice(coefs))[(0, 0)]
}

/// Gram matrix of the `order`:th derivative of the monomials on `[0, 1]`.
///
/// Entry `(m, n)` is `∫₀¹ (u^m)^{(order)} (u^n)^{(order)} du`.
pub fn monomial_integral(degree: usize, order: usize) -> DMatrix<f64> {
    let coef = |m: usize| -> f64 {
        if m < order {
            0.0
        } else {
            ((m - order + 1)..=m).fold(1.0, |acc, f| acc * f as f64)
        }
    };
    DMatrix::from_fn(degree + 1, degree + 1, |m, n| {
        if m < order || n < order {
            0.0
        } else {
            coef(m) * coef(n) / (m + n + 1 - 2 * order) as f64
        }
    })
}
