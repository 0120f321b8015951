//! SO(2) - planar rotations.

use nalgebra::UnitComplex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{LieGroup, Tangent, TangentMap};

/// Rotation in the plane, tangent is the rotation angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SO2 {
    rotation: UnitComplex<f64>,
}

impl SO2 {
    pub fn new(angle: f64) -> Self {
        SO2 {
            rotation: UnitComplex::new(angle),
        }
    }

    /// Rotation angle in (-π, π].
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn unit_complex(&self) -> UnitComplex<f64> {
        self.rotation
    }
}

impl LieGroup for SO2 {
    const DOF: Option<usize> = Some(1);

    fn identity(_dof: usize) -> Self {
        SO2 {
            rotation: UnitComplex::identity(),
        }
    }

    fn random<R: Rng>(rng: &mut R, _dof: usize) -> Self {
        SO2::new(rng.random_range(-PI..PI))
    }

    fn dof(&self) -> usize {
        1
    }

    fn inverse(&self) -> Self {
        SO2 {
            rotation: self.rotation.inverse(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO2 {
            rotation: self.rotation * other.rotation,
        }
    }

    fn log(&self) -> Tangent {
        Tangent::from_element(1, self.angle())
    }

    fn exp(a: &Tangent) -> Self {
        assert_eq!(a.len(), 1, "SO2 tangent has one coordinate");
        SO2::new(a[0])
    }

    fn adjoint(&self) -> TangentMap {
        TangentMap::identity(1, 1)
    }

    fn ad(_a: &Tangent) -> TangentMap {
        TangentMap::zeros(1, 1)
    }

    fn dr_exp(_a: &Tangent) -> TangentMap {
        TangentMap::identity(1, 1)
    }

    fn dr_expinv(_a: &Tangent) -> TangentMap {
        TangentMap::identity(1, 1)
    }
}
