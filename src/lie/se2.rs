//! SE(2) - rigid motions in the plane.
//!
//! Tangent coordinates are `[vx, vy, ω]`: body-frame translational velocity
//! followed by the rotation rate. Jacobians of the exponential use the series
//! provided by [`LieGroup`].

use nalgebra::{UnitComplex, Vector2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{LieGroup, Tangent, TangentMap};
use crate::precision::SMALL_ANGLE;

/// Planar pose `(R, t)` acting as `x ↦ R x + t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SE2 {
    rotation: UnitComplex<f64>,
    translation: Vector2<f64>,
}

impl SE2 {
    pub fn new(x: f64, y: f64, angle: f64) -> Self {
        SE2 {
            rotation: UnitComplex::new(angle),
            translation: Vector2::new(x, y),
        }
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    /// Heading in (-π, π].
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }
}

/// Coefficients `(sin ω / ω, (1 - cos ω) / ω)` of the translational part of
/// the exponential.
fn v_coefficients(w: f64) -> (f64, f64) {
    if w.abs() < SMALL_ANGLE {
        (1.0 - w * w / 6.0, 0.5 * w - w * w * w / 24.0)
    } else {
        (w.sin() / w, (1.0 - w.cos()) / w)
    }
}

impl LieGroup for SE2 {
    const DOF: Option<usize> = Some(3);

    fn identity(_dof: usize) -> Self {
        SE2::new(0.0, 0.0, 0.0)
    }

    fn random<R: Rng>(rng: &mut R, _dof: usize) -> Self {
        SE2::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-PI..PI),
        )
    }

    fn dof(&self) -> usize {
        3
    }

    fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        SE2 {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SE2 {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    fn log(&self) -> Tangent {
        let w = self.angle();
        let (a, b) = v_coefficients(w);
        // V = [a -b; b a], V⁻¹ = [a b; -b a] / (a² + b²)
        let den = a * a + b * b;
        let t = self.translation;
        Tangent::from_column_slice(&[(a * t.x + b * t.y) / den, (-b * t.x + a * t.y) / den, w])
    }

    fn exp(a: &Tangent) -> Self {
        assert_eq!(a.len(), 3, "SE2 tangent has three coordinates");
        let (c1, c2) = v_coefficients(a[2]);
        SE2 {
            rotation: UnitComplex::new(a[2]),
            translation: Vector2::new(c1 * a[0] - c2 * a[1], c2 * a[0] + c1 * a[1]),
        }
    }

    fn adjoint(&self) -> TangentMap {
        let r = self.rotation.to_rotation_matrix().into_inner();
        let t = self.translation;
        TangentMap::from_row_slice(
            3,
            3,
            &[
                r[(0, 0)], r[(0, 1)], t.y,
                r[(1, 0)], r[(1, 1)], -t.x,
                0.0, 0.0, 1.0,
            ],
        )
    }

    fn ad(a: &Tangent) -> TangentMap {
        TangentMap::from_row_slice(
            3,
            3,
            &[
                0.0, -a[2], a[1],
                a[2], 0.0, -a[0],
                0.0, 0.0, 0.0,
            ],
        )
    }
}
