//! Tests for piecewise curves: constructors, concatenation, cropping

use liecurve::{Curve, CurveError, LieGroup, Tangent, SE2, SO3, TOLERANCE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn tangent(x: &[f64]) -> Tangent {
    Tangent::from_column_slice(x)
}

fn random_tangent(rng: &mut StdRng, scale: f64) -> Tangent {
    Tangent::from_fn(3, |_, _| rng.random_range(-scale..scale))
}

/// Three random curves of different shapes and durations.
fn random_pieces(seed: u64) -> (Curve<SO3>, Curve<SO3>, Curve<SO3>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let c1 = Curve::constant_velocity(&random_tangent(&mut rng, 1.0), 1.5).unwrap();
    let gb = SO3::exp(&random_tangent(&mut rng, 1.0));
    let c2 = Curve::fixed_cubic(&gb, &random_tangent(&mut rng, 1.0), &random_tangent(&mut rng, 1.0), 2.0).unwrap();
    let c3 = Curve::from_increments(
        0.7,
        vec![random_tangent(&mut rng, 0.5), random_tangent(&mut rng, 0.5)],
    )
    .unwrap();
    (c1, c2, c3)
}

#[test]
fn test_constant_velocity_properties() {
    let v = tangent(&[0.2, -0.1, 0.5]);
    let t = 3.0;
    let c = Curve::<SE2>::constant_velocity(&v, t).unwrap();

    assert_eq!(c.t_min(), 0.0);
    assert_eq!(c.t_max(), t);
    assert!(c.eval(0.0).is_approx(&SE2::identity(3), TOLERANCE));
    assert!(c.eval(t / 2.0).is_approx(&SE2::exp(&(&v * (t / 2.0))), TOLERANCE));

    let mut vel = Tangent::zeros(3);
    c.eval_with(t, Some(&mut vel), None);
    assert!((vel - v).norm() < TOLERANCE);
}

#[test]
fn test_fixed_cubic_properties() {
    let gb = SO3::exp(&tangent(&[0.3, 1.0, -0.4]));
    let va = tangent(&[1.0, 0.0, 0.2]);
    let vb = tangent(&[0.0, -0.5, 0.1]);
    let t = 2.5;
    let c = Curve::fixed_cubic(&gb, &va, &vb, t).unwrap();

    let mut vel = Tangent::zeros(3);
    assert!(c.eval_with(0.0, Some(&mut vel), None).is_approx(&SO3::identity(3), TOLERANCE));
    assert!((&vel - &va).norm() < TOLERANCE);

    assert!(c.eval_with(t, Some(&mut vel), None).is_approx(&gb, TOLERANCE));
    assert!((&vel - &vb).norm() < TOLERANCE);
}

#[test]
fn test_concatenation_is_continuous() {
    let (c1, c2, _) = random_pieces(1);
    let c = &c1 * &c2;
    assert_eq!(c.len(), 2);
    assert!((c.t_max() - 3.5).abs() < 1e-12);

    let joint = c1.t_max();
    assert!(c.eval(joint).is_approx(c1.end(), TOLERANCE));
    for &s in &[0.0, 0.4, 1.3, 2.0] {
        let expected = c1.end().compose(&c2.eval(s));
        assert!(c.eval(joint + s).is_approx(&expected, TOLERANCE));
    }
}

#[test]
fn test_concatenation_is_associative() {
    let (c1, c2, c3) = random_pieces(2);
    let left = &(&c1 * &c2) * &c3;
    let right = &c1 * &(&c2 * &c3);

    assert!((left.t_max() - right.t_max()).abs() < 1e-12);
    let n = 57;
    for i in 0..=n {
        let t = left.t_max() * i as f64 / n as f64;
        assert!(left.eval(t).is_approx(&right.eval(t), TOLERANCE), "mismatch at t = {}", t);
    }
}

#[test]
fn test_mul_assign_matches_mul() {
    let (c1, c2, c3) = random_pieces(3);
    let mut c = c1.clone();
    c *= &c2;
    c *= &c3;
    assert_eq!(c, &(&c1 * &c2) * &c3);
}

#[test]
fn test_crop_consistency() {
    let (c1, c2, c3) = random_pieces(4);
    let c = &(&c1 * &c2) * &c3;
    let intervals = [(0.0, 4.2), (0.3, 1.2), (1.0, 3.9), (1.5, 3.5), (2.7, 2.9), (0.0, 1.5)];

    for &(ta, tb) in &intervals {
        let cropped = c.crop(ta, tb).unwrap();
        assert!((cropped.t_max() - (tb - ta)).abs() < 1e-12);
        assert!(cropped.eval(0.0).is_approx(&SO3::identity(3), TOLERANCE));

        let ga_inv = c.eval(ta).inverse();
        let expected_end = ga_inv.compose(&c.eval(tb));
        assert!(cropped.eval(tb - ta).is_approx(&expected_end, TOLERANCE));

        for i in 0..=10 {
            let s = (tb - ta) * i as f64 / 10.0;
            let mut v1 = Tangent::zeros(3);
            let mut a1 = Tangent::zeros(3);
            let mut v2 = Tangent::zeros(3);
            let mut a2 = Tangent::zeros(3);
            let g1 = cropped.eval_with(s, Some(&mut v1), Some(&mut a1));
            let g2 = ga_inv.compose(&c.eval_with(ta + s, Some(&mut v2), Some(&mut a2)));
            assert!(g1.is_approx(&g2, TOLERANCE), "value mismatch in [{}, {}] at {}", ta, tb, s);
            assert!((v1 - v2).norm() < TOLERANCE);
            assert!((a1 - a2).norm() < TOLERANCE);
        }
    }
}

#[test]
fn test_crop_of_crop() {
    let (c1, c2, c3) = random_pieces(5);
    let c = &(&c1 * &c2) * &c3;
    let once = c.crop(0.8, 3.6).unwrap();
    let twice = once.crop(0.5, 2.0).unwrap();
    let direct = c.crop(1.3, 2.8).unwrap();

    assert!((twice.t_max() - direct.t_max()).abs() < 1e-12);
    for i in 0..=20 {
        let t = direct.t_max() * i as f64 / 20.0;
        assert!(twice.eval(t).is_approx(&direct.eval(t), TOLERANCE));
    }
}

#[test]
fn test_crop_clamps_to_domain() {
    let (c1, c2, _) = random_pieces(6);
    let c = &c1 * &c2;
    let full = c.crop(-1.0, f64::INFINITY).unwrap();
    assert!((full.t_max() - c.t_max()).abs() < 1e-12);
    assert!(full.end().is_approx(c.end(), TOLERANCE));

    let tail = c.crop(2.0, f64::INFINITY).unwrap();
    assert!((tail.t_max() - (c.t_max() - 2.0)).abs() < 1e-12);
}

#[test]
fn test_crop_rejects_empty_interval() {
    let (c1, _, _) = random_pieces(7);
    assert!(matches!(c1.crop(1.0, 0.5), Err(CurveError::InvalidArgument(_))));
    assert!(matches!(c1.crop(1.0, 1.0), Err(CurveError::InvalidArgument(_))));
    // both ends clamp to t_max
    assert!(matches!(c1.crop(5.0, 6.0), Err(CurveError::InvalidArgument(_))));
}

#[test]
fn test_eval_clamps_outside_domain() {
    let (c1, c2, _) = random_pieces(8);
    let c = &c1 * &c2;
    assert!(c.eval(-3.0).is_approx(&SO3::identity(3), TOLERANCE));
    assert!(c.eval(100.0).is_approx(c.end(), TOLERANCE));
}

#[test]
fn test_serde_round_trip() {
    let (c1, c2, _) = random_pieces(9);
    let c = (&c1 * &c2).crop(0.5, 3.0).unwrap();
    let json = serde_json::to_string(&c).unwrap();
    let back: Curve<SO3> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), c.len());
    for &t in &[0.0, 0.7, 1.9, 2.5] {
        assert!(back.eval(t).is_approx(&c.eval(t), 1e-12));
    }
}

#[test]
fn test_deserialize_rejects_malformed_curves() {
    let (c1, c2, _) = random_pieces(10);
    let good = serde_json::to_value(&c1 * &c2).unwrap();
    assert!(serde_json::from_value::<Curve<SO3>>(good.clone()).is_ok());

    let broken: Vec<(&str, serde_json::Value)> = vec![
        ("crop_scale", serde_json::json!(2.0)),
        ("crop_start", serde_json::json!(-0.1)),
        ("end_time", serde_json::json!(-1.0)),
        ("increments", serde_json::json!([])),
        ("increments", serde_json::to_value(vec![Tangent::zeros(2)]).unwrap()),
    ];
    for (field, value) in broken {
        let mut json = good.clone();
        json["segments"][1][field] = value.clone();
        assert!(
            serde_json::from_value::<Curve<SO3>>(json).is_err(),
            "accepted {} = {}",
            field,
            value
        );
    }
}

#[test]
fn test_segment_accessors() {
    let (c1, c2, _) = random_pieces(11);
    let c = (&c1 * &c2).crop(0.5, 3.0).unwrap();
    let segs = c.segments();
    assert_eq!(segs.len(), 2);
    assert!((segs[0].end_time() - 1.0).abs() < 1e-12);
    assert!((segs[1].end_time() - 2.5).abs() < 1e-12);
    assert!(segs[1].end_value().is_approx(c.end(), 1e-12));
    assert_eq!(segs[1].increments().len(), 3);
    assert!((segs[0].crop_start() - 1.0 / 3.0).abs() < 1e-12);
    assert!((segs[0].crop_scale() - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(segs[1].crop_start(), 0.0);
    assert!((segs[1].crop_scale() - 0.75).abs() < 1e-12);
}
