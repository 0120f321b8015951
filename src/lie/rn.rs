//! Euclidean space ℝⁿ as an additive Lie group of runtime dimension.

use nalgebra::DVector;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{LieGroup, Tangent, TangentMap};

/// Vector space ℝⁿ under addition.
///
/// The dimension is carried by the value; [`LieGroup::exp`] takes it from the
/// tangent vector. Used for scalar time-warps (n = 1) and for fitting plain
/// vector-valued data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rn(DVector<f64>);

impl Rn {
    pub fn new(coords: DVector<f64>) -> Self {
        Rn(coords)
    }

    /// One-dimensional element.
    pub fn scalar(x: f64) -> Self {
        Rn(DVector::from_element(1, x))
    }

    pub fn from_slice(coords: &[f64]) -> Self {
        Rn(DVector::from_column_slice(coords))
    }

    pub fn coords(&self) -> &DVector<f64> {
        &self.0
    }

    /// First coordinate, the value of a scalar element.
    pub fn x(&self) -> f64 {
        self.0[0]
    }
}

impl LieGroup for Rn {
    const DOF: Option<usize> = None;

    fn identity(dof: usize) -> Self {
        Rn(DVector::zeros(dof))
    }

    fn random<R: Rng>(rng: &mut R, dof: usize) -> Self {
        Rn(DVector::from_fn(dof, |_, _| rng.random_range(-1.0..1.0)))
    }

    fn dof(&self) -> usize {
        self.0.len()
    }

    fn inverse(&self) -> Self {
        Rn(-&self.0)
    }

    fn compose(&self, other: &Self) -> Self {
        Rn(&self.0 + &other.0)
    }

    fn log(&self) -> Tangent {
        self.0.clone()
    }

    fn exp(a: &Tangent) -> Self {
        Rn(a.clone())
    }

    fn adjoint(&self) -> TangentMap {
        TangentMap::identity(self.dof(), self.dof())
    }

    fn ad(a: &Tangent) -> TangentMap {
        TangentMap::zeros(a.len(), a.len())
    }

    fn dr_exp(a: &Tangent) -> TangentMap {
        TangentMap::identity(a.len(), a.len())
    }

    fn dr_expinv(a: &Tangent) -> TangentMap {
        TangentMap::identity(a.len(), a.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rn_is_additive() {
        let a = Rn::from_slice(&[1.0, 2.0]);
        let b = Rn::from_slice(&[0.5, -1.0]);
        assert_eq!(a.compose(&b), Rn::from_slice(&[1.5, 1.0]));
        assert_eq!(a.rminus(&b), DVector::from_column_slice(&[0.5, 3.0]));
        assert_eq!(Rn::identity(3).dof(), 3);
    }
}
