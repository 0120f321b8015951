//! Lie group capability set
//!
//! Curves, the fitter and the optimizer are generic over [`LieGroup`]. A group
//! provides the elementary operations (identity, inverse, composition, exp/log)
//! together with the linear maps needed to propagate derivatives through
//! compositions: the group Adjoint, the algebra adjoint and the right Jacobian
//! of the exponential.
//!
//! Tangent vectors are [`DVector<f64>`] so that groups of runtime dimension
//! ([`Rn`]) and fixed dimension ([`SO2`], [`SO3`], [`SE2`]) share one code path.
//!
//! # Conventions
//!
//! - Perturbations act on the right: `g ⊕ a = g · exp(a)`.
//! - `a ⊖ b = log(b⁻¹ · a)`.
//! - `dr_exp(a)` is the right Jacobian `J_r(a)` with
//!   `exp(a + δ) ≈ exp(a) · exp(J_r(a) δ)`.

mod rn;
mod se2;
mod so2;
mod so3;

pub use rn::Rn;
pub use se2::SE2;
pub use so2::SO2;
pub use so3::SO3;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use std::fmt;

use crate::precision::{SERIES, SERIES_MAX_TERMS, SINGULAR_DET};

/// Element of the Lie algebra in coordinates.
pub type Tangent = DVector<f64>;

/// Linear map on the tangent space.
pub type TangentMap = DMatrix<f64>;

/// Operations a group must provide to carry curves.
///
/// Implementors only have to supply the closed forms of the group; Jacobians
/// of the exponential fall back on power series of [`LieGroup::ad`] unless a
/// closed form is given.
pub trait LieGroup: Clone + fmt::Debug {
    /// Tangent dimension when it is fixed by the type, `None` for groups sized
    /// at runtime.
    const DOF: Option<usize>;

    /// Group identity. `dof` is only consulted by groups sized at runtime.
    fn identity(dof: usize) -> Self;

    /// Random element. `dof` is only consulted by groups sized at runtime.
    fn random<R: Rng>(rng: &mut R, dof: usize) -> Self;

    /// Tangent dimension of this element.
    fn dof(&self) -> usize;

    fn inverse(&self) -> Self;

    /// Group product `self · other`.
    fn compose(&self, other: &Self) -> Self;

    /// Logarithm into the tangent space.
    fn log(&self) -> Tangent;

    /// Exponential of a tangent vector. Groups sized at runtime take their
    /// dimension from `a`.
    fn exp(a: &Tangent) -> Self;

    /// Group Adjoint `Ad_g`.
    fn adjoint(&self) -> TangentMap;

    /// Algebra adjoint `ad_a`, i.e. `ad_a b = [a, b]`.
    fn ad(a: &Tangent) -> TangentMap;

    /// Right Jacobian of the exponential.
    fn dr_exp(a: &Tangent) -> TangentMap {
        // J_r(a) = sum_k (-ad_a)^k / (k + 1)!
        let n = a.len();
        let minus_ad = -Self::ad(a);
        let mut term = TangentMap::identity(n, n);
        let mut sum = term.clone();
        for k in 1..SERIES_MAX_TERMS {
            term = &term * &minus_ad / (k as f64 + 1.0);
            sum += &term;
            if term.norm() < SERIES {
                break;
            }
        }
        sum
    }

    /// Inverse of the right Jacobian of the exponential.
    ///
    /// `J_r(a)` is singular where `exp` stops being a local diffeomorphism,
    /// e.g. at rotation angles `2πk` with `k ≠ 0`. There the identity is
    /// returned, which is only the first order approximation around `a = 0`,
    /// and a warning is logged.
    fn dr_expinv(a: &Tangent) -> TangentMap {
        let n = a.len();
        let jr = Self::dr_exp(a);
        if jr.determinant().abs() > SINGULAR_DET {
            if let Some(inv) = jr.try_inverse() {
                return inv;
            }
        }
        log::warn!(
            "right Jacobian of exp is singular at |a| = {:.6}, falling back to the identity",
            a.norm()
        );
        TangentMap::identity(n, n)
    }

    /// Left Jacobian of the exponential.
    fn dl_exp(a: &Tangent) -> TangentMap {
        Self::exp(a).adjoint() * Self::dr_exp(a)
    }

    /// Inverse of the left Jacobian of the exponential.
    fn dl_expinv(a: &Tangent) -> TangentMap {
        Self::dr_expinv(a) - Self::ad(a)
    }

    /// `self · exp(a)`.
    fn rplus(&self, a: &Tangent) -> Self {
        self.compose(&Self::exp(a))
    }

    /// `log(other⁻¹ · self)`.
    fn rminus(&self, other: &Self) -> Tangent {
        other.inverse().compose(self).log()
    }

    /// True when `self` and `other` differ by less than `tolerance` in the
    /// tangent norm.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.rminus(other).norm() <= tolerance
    }
}

/// Skew-symmetric matrix of a 3-vector.
pub(crate) fn hat3(a: &Tangent) -> TangentMap {
    debug_assert_eq!(a.len(), 3);
    DMatrix::from_row_slice(3, 3, &[0.0, -a[2], a[1], a[2], 0.0, -a[0], -a[1], a[0], 0.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Finite-difference check of `exp(a + δ) ≈ exp(a) · exp(J_r δ)`.
    fn check_dr_exp<G: LieGroup>(a: &Tangent) {
        let n = a.len();
        let jr = G::dr_exp(a);
        let base = G::exp(a);
        let h = 1e-6;
        for k in 0..n {
            let mut ap = a.clone();
            ap[k] += h;
            let fd = G::exp(&ap).rminus(&base) / h;
            for r in 0..n {
                assert!(
                    (fd[r] - jr[(r, k)]).abs() < 1e-4,
                    "dr_exp mismatch at ({}, {}): {} vs {}",
                    r,
                    k,
                    fd[r],
                    jr[(r, k)]
                );
            }
        }
        let prod = G::dr_exp(a) * G::dr_expinv(a);
        assert!((prod - TangentMap::identity(n, n)).norm() < 1e-8);
    }

    /// `g · exp(a) · g⁻¹ = exp(Ad_g a)`.
    fn check_adjoint<G: LieGroup>(g: &G, a: &Tangent) {
        let lhs = g.compose(&G::exp(a)).compose(&g.inverse());
        let rhs = G::exp(&(g.adjoint() * a));
        assert!(lhs.is_approx(&rhs, 1e-9));
    }

    fn check_group<G: LieGroup>(dof: usize) {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let g = G::random(&mut rng, dof);
            let a = G::random(&mut rng, dof).log() * 0.8;

            assert!(g.compose(&g.inverse()).is_approx(&G::identity(dof), 1e-10));
            assert!(G::exp(&g.log()).is_approx(&g, 1e-10));
            check_adjoint(&g, &a);
            check_dr_exp::<G>(&a);

            let dl = G::dl_exp(&a) * G::dl_expinv(&a);
            assert!((dl - TangentMap::identity(dof, dof)).norm() < 1e-8);
        }
    }

    #[test]
    fn test_rn_group_axioms() {
        check_group::<Rn>(4);
    }

    #[test]
    fn test_so2_group_axioms() {
        check_group::<SO2>(1);
    }

    #[test]
    fn test_so3_group_axioms() {
        check_group::<SO3>(3);
    }

    #[test]
    fn test_se2_group_axioms() {
        check_group::<SE2>(3);
    }

    #[test]
    fn test_series_matches_closed_form() {
        // SO3 overrides dr_exp; the provided series must agree with it.
        let a = Tangent::from_vec(vec![0.3, -0.7, 1.1]);
        let series = {
            let minus_ad = -hat3(&a);
            let mut term = TangentMap::identity(3, 3);
            let mut sum = term.clone();
            for k in 1..SERIES_MAX_TERMS {
                term = &term * &minus_ad / (k as f64 + 1.0);
                sum += &term;
            }
            sum
        };
        assert!((series - SO3::dr_exp(&a)).norm() < 1e-12);
    }

    #[test]
    fn test_singular_jacobian_falls_back_to_identity() {
        // SE2 uses the series; its translation block vanishes at a full turn
        let a = Tangent::from_vec(vec![0.5, -0.2, 2.0 * std::f64::consts::PI]);
        assert!(SE2::dr_exp(&a).determinant().abs() < SINGULAR_DET);
        assert_eq!(SE2::dr_expinv(&a), TangentMap::identity(3, 3));

        // slightly off the singularity the true inverse is returned
        let b = Tangent::from_vec(vec![0.5, -0.2, 2.0 * std::f64::consts::PI - 0.1]);
        let prod = SE2::dr_exp(&b) * SE2::dr_expinv(&b);
        assert!((prod - TangentMap::identity(3, 3)).norm() < 1e-8);
    }
}
