//! Shortest paths for a planar vehicle with bounded turning radius.
//!
//! Each candidate path is three arcs of type left turn, right turn or
//! straight line; the shortest admissible word wins.

use std::f64::consts::PI;

use super::Curve;
use crate::lie::{LieGroup, Tangent, SE2};
use crate::{CurveError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arc {
    Left,
    Straight,
    Right,
}

const WORDS: [[Arc; 3]; 6] = [
    [Arc::Left, Arc::Straight, Arc::Left],
    [Arc::Right, Arc::Straight, Arc::Right],
    [Arc::Left, Arc::Straight, Arc::Right],
    [Arc::Right, Arc::Straight, Arc::Left],
    [Arc::Right, Arc::Left, Arc::Right],
    [Arc::Left, Arc::Right, Arc::Left],
];

/// Square lengths within this distance of zero count as zero.
const ROUNDING: f64 = 1e-10;

fn mod2pi(x: f64) -> f64 {
    let r = x - 2.0 * PI * (x / (2.0 * PI)).floor();
    if r > 2.0 * PI - ROUNDING {
        0.0
    } else {
        r
    }
}

fn clamped_sqrt(sq: f64) -> Option<f64> {
    if sq < -ROUNDING {
        None
    } else {
        Some(sq.max(0.0).sqrt())
    }
}

/// Normalized arc lengths `(t, p, q)` of one word, in units of the radius.
///
/// `d` is the distance to the target over the radius, `alpha` and `beta` the
/// start and end headings relative to the line joining start and target.
fn word_lengths(word: [Arc; 3], d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, sb) = (alpha.sin(), beta.sin());
    let (ca, cb) = (alpha.cos(), beta.cos());
    let c_ab = (alpha - beta).cos();

    match word {
        [Arc::Left, Arc::Straight, Arc::Left] => {
            let p = clamped_sqrt(2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sa - sb))?;
            let tmp = (cb - ca).atan2(d + sa - sb);
            Some([mod2pi(tmp - alpha), p, mod2pi(beta - tmp)])
        }
        [Arc::Right, Arc::Straight, Arc::Right] => {
            let p = clamped_sqrt(2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sb - sa))?;
            let tmp = (ca - cb).atan2(d - sa + sb);
            Some([mod2pi(alpha - tmp), p, mod2pi(tmp - beta)])
        }
        [Arc::Left, Arc::Straight, Arc::Right] => {
            let p = clamped_sqrt(-2.0 + d * d + 2.0 * c_ab + 2.0 * d * (sa + sb))?;
            let tmp = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
            Some([mod2pi(tmp - alpha), p, mod2pi(tmp - beta)])
        }
        [Arc::Right, Arc::Straight, Arc::Left] => {
            let p = clamped_sqrt(-2.0 + d * d + 2.0 * c_ab - 2.0 * d * (sa + sb))?;
            let tmp = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
            Some([mod2pi(alpha - tmp), p, mod2pi(beta - tmp)])
        }
        [Arc::Right, Arc::Left, Arc::Right] => {
            let c = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sa - sb)) / 8.0;
            if c.abs() > 1.0 {
                return None;
            }
            let p = mod2pi(2.0 * PI - c.acos());
            let t = mod2pi(alpha - (ca - cb).atan2(d - sa + sb) + p / 2.0);
            Some([t, p, mod2pi(alpha - beta - t + p)])
        }
        [Arc::Left, Arc::Right, Arc::Left] => {
            let c = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sb - sa)) / 8.0;
            if c.abs() > 1.0 {
                return None;
            }
            let p = mod2pi(2.0 * PI - c.acos());
            let t = mod2pi(-alpha - (ca - cb).atan2(d + sa - sb) + p / 2.0);
            Some([t, p, mod2pi(beta - alpha - t + p)])
        }
        _ => None,
    }
}

impl Curve<SE2> {
    /// Shortest path from the identity to `target` for a vehicle moving
    /// forward at unit speed with turning radius at least `radius`.
    ///
    /// The curve is a concatenation of up to three constant velocity pieces;
    /// its duration equals the path length.
    pub fn dubins(target: &SE2, radius: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(CurveError::InvalidArgument(format!(
                "turning radius must be positive and finite, got {}",
                radius
            )));
        }

        let (dx, dy) = (target.x(), target.y());
        let d = dx.hypot(dy) / radius;
        let theta = if d > 0.0 { mod2pi(dy.atan2(dx)) } else { 0.0 };
        let alpha = mod2pi(-theta);
        let beta = mod2pi(target.angle() - theta);

        let (word, lengths) = WORDS
            .iter()
            .filter_map(|&w| word_lengths(w, d, alpha, beta).map(|l| (w, l)))
            .min_by(|a, b| {
                let la: f64 = a.1.iter().sum();
                let lb: f64 = b.1.iter().sum();
                la.total_cmp(&lb)
            })
            .ok_or_else(|| CurveError::InvalidArgument("no admissible path found".into()))?;

        log::trace!("dubins word {:?} with lengths {:?}", word, lengths);

        let mut curve = Curve::empty(3);
        for (arc, len) in word.iter().zip(lengths.iter()) {
            let duration = len * radius;
            if duration <= ROUNDING {
                continue;
            }
            let rate = match arc {
                Arc::Left => 1.0 / radius,
                Arc::Straight => 0.0,
                Arc::Right => -1.0 / radius,
            };
            let v = Tangent::from_column_slice(&[1.0, 0.0, rate]);
            curve *= &Curve::constant_velocity(&v, duration)?;
        }
        Ok(curve)
    }
}
