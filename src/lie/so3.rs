//! SO(3) - rotations in space.
//!
//! Tangent vectors are rotation vectors (axis times angle). The right Jacobian
//! and its inverse use the usual closed forms.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{hat3, LieGroup, Tangent, TangentMap};
use crate::precision::SMALL_ANGLE;

/// Rotation in space stored as a unit quaternion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SO3 {
    rotation: UnitQuaternion<f64>,
}

impl SO3 {
    pub fn new(rotation: UnitQuaternion<f64>) -> Self {
        SO3 { rotation }
    }

    /// Rotation of `angle` radians about `axis` (need not be normalized).
    pub fn from_axis_angle(axis: Vector3<f64>, angle: f64) -> Self {
        let n = axis.norm();
        if n < f64::EPSILON {
            return SO3::new(UnitQuaternion::identity());
        }
        SO3::new(UnitQuaternion::from_scaled_axis(axis * (angle / n)))
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }
}

impl LieGroup for SO3 {
    const DOF: Option<usize> = Some(3);

    fn identity(_dof: usize) -> Self {
        SO3::new(UnitQuaternion::identity())
    }

    fn random<R: Rng>(rng: &mut R, _dof: usize) -> Self {
        // uniform on the sphere of unit quaternions
        let u1: f64 = rng.random_range(0.0..1.0);
        let u2: f64 = rng.random_range(0.0..1.0);
        let u3: f64 = rng.random_range(0.0..1.0);
        let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
        let q = nalgebra::Quaternion::new(
            b * (2.0 * PI * u3).cos(),
            a * (2.0 * PI * u2).sin(),
            a * (2.0 * PI * u2).cos(),
            b * (2.0 * PI * u3).sin(),
        );
        SO3::new(UnitQuaternion::from_quaternion(q))
    }

    fn dof(&self) -> usize {
        3
    }

    fn inverse(&self) -> Self {
        SO3::new(self.rotation.inverse())
    }

    fn compose(&self, other: &Self) -> Self {
        SO3::new(self.rotation * other.rotation)
    }

    fn log(&self) -> Tangent {
        let v = self.rotation.scaled_axis();
        Tangent::from_column_slice(v.as_slice())
    }

    fn exp(a: &Tangent) -> Self {
        assert_eq!(a.len(), 3, "SO3 tangent has three coordinates");
        SO3::new(UnitQuaternion::from_scaled_axis(Vector3::new(a[0], a[1], a[2])))
    }

    fn adjoint(&self) -> TangentMap {
        TangentMap::from_column_slice(3, 3, self.matrix().as_slice())
    }

    fn ad(a: &Tangent) -> TangentMap {
        hat3(a)
    }

    fn dr_exp(a: &Tangent) -> TangentMap {
        let th2 = a.norm_squared();
        let th = th2.sqrt();
        let w = hat3(a);
        let (c1, c2) = if th < SMALL_ANGLE {
            (0.5 - th2 / 24.0, 1.0 / 6.0 - th2 / 120.0)
        } else {
            ((1.0 - th.cos()) / th2, (th - th.sin()) / (th2 * th))
        };
        TangentMap::identity(3, 3) - &w * c1 + &w * &w * c2
    }

    fn dr_expinv(a: &Tangent) -> TangentMap {
        let th2 = a.norm_squared();
        let th = th2.sqrt();
        let w = hat3(a);
        let c2 = if th < SMALL_ANGLE {
            1.0 / 12.0 + th2 / 720.0
        } else {
            let half = 0.5 * th;
            1.0 / th2 - half.cos() / (half.sin() * 2.0 * th)
        };
        TangentMap::identity(3, 3) + &w * 0.5 + &w * &w * c2
    }
}
