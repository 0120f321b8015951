//! Piecewise curves on Lie groups
//!
//! A [`Curve`] is a sequence of [`Segment`]s, each a cumulative Bernstein
//! spline on its own time interval. Segment `i` covers
//! `[end_time[i-1], end_time[i]]` (the first one starts at `t0`) and starts
//! at the end value of the previous segment (`g0` for the first).
//!
//! A segment may show only a window of its normalized parameter: evaluation
//! maps local time through `u = crop_start + crop_scale · (t - t_start) / T`.
//! Cropping rewrites this window instead of refitting the polynomial.

mod dubins;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::{Mul, MulAssign};

use crate::basis::{cached_cumulative_basis, PolynomialBasis};
use crate::cspline::cspline_eval_diff;
use crate::lie::{LieGroup, Tangent};
use crate::{CurveError, Result};

/// Anything that can be evaluated with derivatives over a time interval.
///
/// Reparameterization only relies on this interface.
pub trait Trajectory {
    type Group: LieGroup;

    fn t_min(&self) -> f64;

    fn t_max(&self) -> f64;

    /// Value at `t` (clamped to the domain) with optional body velocity and
    /// body acceleration.
    fn eval_with(
        &self,
        t: f64,
        vel: Option<&mut Tangent>,
        acc: Option<&mut Tangent>,
    ) -> Self::Group;

    fn eval(&self, t: f64) -> Self::Group {
        self.eval_with(t, None, None)
    }
}

/// One polynomial arc of a [`Curve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment<G> {
    end_time: f64,
    end_value: G,
    increments: Vec<Tangent>,
    crop_start: f64,
    crop_scale: f64,
}

impl<G> Segment<G> {
    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.increments.len()
    }

    /// Absolute end time.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Absolute value at [`Segment::end_time`].
    pub fn end_value(&self) -> &G {
        &self.end_value
    }

    /// Increments `v_1..v_K` of the cumulative spline, `K ≥ 1`.
    pub fn increments(&self) -> &[Tangent] {
        &self.increments
    }

    /// Start of the visible window of the normalized parameter.
    pub fn crop_start(&self) -> f64 {
        self.crop_start
    }

    /// Length of the visible window of the normalized parameter.
    pub fn crop_scale(&self) -> f64 {
        self.crop_scale
    }
}

/// Piecewise polynomial curve on a Lie group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "CurveData<G>",
    bound(deserialize = "G: LieGroup + Deserialize<'de>")
)]
pub struct Curve<G> {
    t0: f64,
    g0: G,
    segments: Vec<Segment<G>>,
}

/// Unchecked serialized form of a [`Curve`].
#[derive(Deserialize)]
struct CurveData<G> {
    t0: f64,
    g0: G,
    segments: Vec<Segment<G>>,
}

const WINDOW_SLACK: f64 = 1e-9;

impl<G: LieGroup> TryFrom<CurveData<G>> for Curve<G> {
    type Error = CurveError;

    fn try_from(data: CurveData<G>) -> Result<Self> {
        let invalid = |i: usize, what: String| CurveError::InvalidArgument(format!("segment {}: {}", i, what));
        if !data.t0.is_finite() {
            return Err(CurveError::InvalidArgument(format!("start time {} is not finite", data.t0)));
        }
        let dof = data.g0.dof();
        let mut start = data.t0;
        for (i, seg) in data.segments.iter().enumerate() {
            if !(seg.end_time > start) || !seg.end_time.is_finite() {
                return Err(invalid(i, format!("end time {} does not follow {}", seg.end_time, start)));
            }
            if seg.increments.is_empty() {
                return Err(invalid(i, "no increments".into()));
            }
            if seg.end_value.dof() != dof || seg.increments.iter().any(|v| v.len() != dof) {
                return Err(invalid(i, format!("dimension differs from the start value ({})", dof)));
            }
            let window_ok = (0.0..=1.0).contains(&seg.crop_start)
                && seg.crop_scale > 0.0
                && seg.crop_start + seg.crop_scale <= 1.0 + WINDOW_SLACK;
            if !window_ok {
                return Err(invalid(
                    i,
                    format!("window [{}, +{}] is not inside [0, 1]", seg.crop_start, seg.crop_scale),
                ));
            }
            start = seg.end_time;
        }
        Ok(Curve {
            t0: data.t0,
            g0: data.g0,
            segments: data.segments,
        })
    }
}

fn bernstein(degree: usize) -> Cow<'static, DMatrix<f64>> {
    cached_cumulative_basis(PolynomialBasis::Bernstein, degree)
}

impl<G: LieGroup> Curve<G> {
    /// Curve without segments starting at time 0 at the identity.
    pub fn empty(dof: usize) -> Self {
        Curve::starting_at(0.0, G::identity(dof))
    }

    /// Curve without segments starting at time `t0` at `g0`.
    pub fn starting_at(t0: f64, g0: G) -> Self {
        Curve {
            t0,
            g0,
            segments: Vec::new(),
        }
    }

    /// Single segment of the given duration starting at the identity.
    ///
    /// The degree of the segment is the number of increments.
    pub fn from_increments(duration: f64, increments: Vec<Tangent>) -> Result<Self> {
        let dof = increments
            .first()
            .map(|v| v.len())
            .ok_or_else(|| CurveError::InvalidArgument("segment needs at least one increment".into()))?;
        let mut curve = Curve::empty(dof);
        curve.push_segment(duration, increments)?;
        Ok(curve)
    }

    /// Cubic with constant body velocity `v` over `[0, duration]`.
    pub fn constant_velocity(v: &Tangent, duration: f64) -> Result<Self> {
        let inc = v * (duration / 3.0);
        Curve::from_increments(duration, vec![inc.clone(), inc.clone(), inc])
    }

    /// Cubic from the identity to `gb` with body velocity `va` at the start and
    /// `vb` at the end.
    pub fn fixed_cubic(gb: &G, va: &Tangent, vb: &Tangent, duration: f64) -> Result<Self> {
        let v0 = va * (duration / 3.0);
        let v2 = vb * (duration / 3.0);
        let v1 = G::exp(&(-&v0)).compose(gb).compose(&G::exp(&(-&v2))).log();
        Curve::from_increments(duration, vec![v0, v1, v2])
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment<G>] {
        &self.segments
    }

    pub fn t_min(&self) -> f64 {
        self.t0
    }

    pub fn t_max(&self) -> f64 {
        self.segments.last().map_or(self.t0, |s| s.end_time)
    }

    /// Value at `t_min`.
    pub fn start(&self) -> &G {
        &self.g0
    }

    /// Value at `t_max`.
    pub fn end(&self) -> &G {
        self.segments.last().map_or(&self.g0, |s| &s.end_value)
    }

    /// Tangent dimension of the curve values.
    pub fn dof(&self) -> usize {
        self.g0.dof()
    }

    /// Append a segment of the given duration after the current end.
    pub(crate) fn push_segment(&mut self, duration: f64, increments: Vec<Tangent>) -> Result<()> {
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(CurveError::InvalidArgument(format!(
                "segment duration must be positive and finite, got {}",
                duration
            )));
        }
        if increments.is_empty() {
            return Err(CurveError::InvalidArgument("segment needs at least one increment".into()));
        }
        let dof = self.dof();
        if let Some(bad) = increments.iter().find(|v| v.len() != dof) {
            return Err(CurveError::InvalidArgument(format!(
                "increment of dimension {} on a curve of dimension {}",
                bad.len(),
                dof
            )));
        }
        let bcum = bernstein(increments.len());
        let delta: G = cspline_eval_diff(&increments, &bcum, 1.0, None, None, None);
        let end_value = self.end().compose(&delta);
        let end_time = self.t_max() + duration;
        self.segments.push(Segment {
            end_time,
            end_value,
            increments,
            crop_start: 0.0,
            crop_scale: 1.0,
        });
        Ok(())
    }

    /// Index of the segment containing `t`.
    fn find_idx(&self, t: f64) -> usize {
        self.segments
            .partition_point(|s| s.end_time <= t)
            .min(self.segments.len() - 1)
    }

    fn segment_start(&self, i: usize) -> (f64, &G) {
        if i == 0 {
            (self.t0, &self.g0)
        } else {
            let prev = &self.segments[i - 1];
            (prev.end_time, &prev.end_value)
        }
    }

    pub fn eval(&self, t: f64) -> G {
        self.eval_with(t, None, None)
    }

    /// Value at `t` with optional body velocity and acceleration.
    ///
    /// `t` is clamped to `[t_min, t_max]`; an empty curve evaluates to its
    /// start with zero derivatives.
    pub fn eval_with(&self, t: f64, vel: Option<&mut Tangent>, acc: Option<&mut Tangent>) -> G {
        if self.segments.is_empty() {
            let dof = self.dof();
            if let Some(v) = vel {
                *v = Tangent::zeros(dof);
            }
            if let Some(a) = acc {
                *a = Tangent::zeros(dof);
            }
            return self.g0.clone();
        }

        let t = t.clamp(self.t0, self.t_max());
        let i = self.find_idx(t);
        let seg = &self.segments[i];
        let (ta, ga) = self.segment_start(i);
        let duration = seg.end_time - ta;
        let u = (seg.crop_start + seg.crop_scale * (t - ta) / duration).clamp(0.0, 1.0);

        let bcum = bernstein(seg.degree());
        let mut base = ga.clone();
        if seg.crop_start > 0.0 {
            let skipped: G = cspline_eval_diff(&seg.increments, &bcum, seg.crop_start, None, None, None);
            base = base.compose(&skipped.inverse());
        }

        let scale = seg.crop_scale / duration;
        let mut vel = vel;
        let mut acc = acc;
        let g: G = cspline_eval_diff(
            &seg.increments,
            &bcum,
            u,
            vel.as_deref_mut(),
            acc.as_deref_mut(),
            None,
        );
        if let Some(v) = vel {
            *v *= scale;
        }
        if let Some(a) = acc {
            *a *= scale * scale;
        }
        base.compose(&g)
    }

    /// Append `other` so that it continues from the current end.
    ///
    /// `other` is shifted in time by `t_max - other.t_min()` and composed from
    /// the left with `end() · other.start()⁻¹`.
    pub fn concat(&mut self, other: &Curve<G>) {
        if other.is_empty() {
            return;
        }
        let dt = self.t_max() - other.t0;
        let shift = self.end().compose(&other.g0.inverse());
        self.segments.extend(other.segments.iter().map(|s| Segment {
            end_time: s.end_time + dt,
            end_value: shift.compose(&s.end_value),
            increments: s.increments.clone(),
            crop_start: s.crop_start,
            crop_scale: s.crop_scale,
        }));
    }

    /// The part of the curve over `[ta, tb]` as a new curve on
    /// `[0, tb - ta]` that starts at the identity.
    ///
    /// Both ends are clamped to the domain first; `tb = f64::INFINITY` crops
    /// to the end.
    ///
    /// # Errors
    /// [`CurveError::InvalidArgument`] if the curve is empty or the clamped
    /// interval is empty.
    pub fn crop(&self, ta: f64, tb: f64) -> Result<Self> {
        if self.segments.is_empty() {
            return Err(CurveError::InvalidArgument("cannot crop an empty curve".into()));
        }
        let ta = ta.clamp(self.t0, self.t_max());
        let tb = tb.clamp(self.t0, self.t_max());
        if !(tb > ta) {
            return Err(CurveError::InvalidArgument(format!(
                "crop interval [{}, {}] is empty",
                ta, tb
            )));
        }

        let last = self.segments.len() - 1;
        let i0 = self.segments.partition_point(|s| s.end_time <= ta).min(last);
        let i1 = self.segments.partition_point(|s| s.end_time < tb).min(last);

        let ga_inv = self.eval(ta).inverse();
        let gb = self.eval(tb);

        let mut segments = Vec::with_capacity(i1 + 1 - i0);
        for i in i0..=i1 {
            let seg = &self.segments[i];
            let (start, _) = self.segment_start(i);
            let duration = seg.end_time - start;
            let s = start.max(ta);
            let e = seg.end_time.min(tb);
            let end_value = if i == i1 { &gb } else { &seg.end_value };
            segments.push(Segment {
                end_time: e - ta,
                end_value: ga_inv.compose(end_value),
                increments: seg.increments.clone(),
                crop_start: seg.crop_start + seg.crop_scale * (s - start) / duration,
                crop_scale: seg.crop_scale * (e - s) / duration,
            });
        }

        Ok(Curve {
            t0: 0.0,
            g0: G::identity(self.dof()),
            segments,
        })
    }
}

impl<G: LieGroup> Trajectory for Curve<G> {
    type Group = G;

    fn t_min(&self) -> f64 {
        Curve::t_min(self)
    }

    fn t_max(&self) -> f64 {
        Curve::t_max(self)
    }

    fn eval_with(&self, t: f64, vel: Option<&mut Tangent>, acc: Option<&mut Tangent>) -> G {
        Curve::eval_with(self, t, vel, acc)
    }
}

impl<G: LieGroup> MulAssign<&Curve<G>> for Curve<G> {
    fn mul_assign(&mut self, rhs: &Curve<G>) {
        self.concat(rhs);
    }
}

impl<G: LieGroup> Mul for &Curve<G> {
    type Output = Curve<G>;

    fn mul(self, rhs: &Curve<G>) -> Curve<G> {
        let mut out = self.clone();
        out.concat(rhs);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lie::{Rn, SO3};

    fn tangent(x: &[f64]) -> Tangent {
        Tangent::from_column_slice(x)
    }

    #[test]
    fn test_constant_velocity() {
        let v = tangent(&[0.1, -0.2, 0.3]);
        let c = Curve::<SO3>::constant_velocity(&v, 2.0).unwrap();
        assert_eq!(c.len(), 1);
        assert!(c.eval(0.0).is_approx(&SO3::identity(3), 1e-12));
        assert!(c.eval(1.0).is_approx(&SO3::exp(&(&v * 1.0)), 1e-10));

        let mut vel = Tangent::zeros(3);
        let mut acc = Tangent::zeros(3);
        c.eval_with(2.0, Some(&mut vel), Some(&mut acc));
        assert!((vel - &v).norm() < 1e-10);
        assert!(acc.norm() < 1e-10);
    }

    #[test]
    fn test_rejects_bad_duration() {
        let v = tangent(&[1.0]);
        assert!(Curve::<Rn>::constant_velocity(&v, 0.0).is_err());
        assert!(Curve::<Rn>::constant_velocity(&v, -1.0).is_err());
        assert!(Curve::<Rn>::from_increments(1.0, vec![]).is_err());
    }

    #[test]
    fn test_find_segment_on_breakpoints() {
        let v = tangent(&[1.0]);
        let mut c = Curve::<Rn>::constant_velocity(&v, 1.0).unwrap();
        c *= &Curve::constant_velocity(&(&v * 2.0), 1.0).unwrap();
        assert_eq!(c.find_idx(0.0), 0);
        assert_eq!(c.find_idx(1.0), 1);
        assert_eq!(c.find_idx(5.0), 1);
        assert!((c.eval(1.5).x() - 2.0).abs() < 1e-12);
        assert!((c.eval(10.0).x() - 3.0).abs() < 1e-12);
        assert!((c.eval(-1.0).x()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_curve() {
        let c = Curve::<SO3>::empty(3);
        let mut vel = Tangent::from_element(3, 1.0);
        assert!(c.eval_with(1.0, Some(&mut vel), None).is_approx(&SO3::identity(3), 1e-12));
        assert_eq!(vel, Tangent::zeros(3));
        assert!(c.crop(0.0, 1.0).is_err());
    }

    #[test]
    fn test_crop_inside_one_segment() {
        let c = Curve::<Rn>::from_increments(2.0, vec![tangent(&[1.0]), tangent(&[0.0]), tangent(&[1.0])]).unwrap();
        let cropped = c.crop(0.5, 1.5).unwrap();
        assert_eq!(cropped.len(), 1);
        assert!((cropped.t_max() - 1.0).abs() < 1e-12);
        for &t in &[0.0, 0.25, 0.5, 1.0] {
            let expected = c.eval(0.5 + t).x() - c.eval(0.5).x();
            assert!((cropped.eval(t).x() - expected).abs() < 1e-12);
        }
    }
}
