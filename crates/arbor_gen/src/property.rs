//! Interpolation descriptors for parameters that vary along a branch.
//!
//! A [`Property`] maps an argument in `[0, 1]` (usually the position of a
//! branch origin along its parent) to a float. Randomized variants draw
//! from the caller-supplied RNG so a whole growth pass stays reproducible
//! from its seed.
use rand::RngCore;

use crate::geometry::{lerp, rand01};

/// A tunable scalar: constant, random within a range, or a piecewise
/// linear curve over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    Constant(f32),
    Random { min: f32, max: f32 },
    /// Control points `(x, value)` sorted by `x`; sampling clamps outside
    /// the covered range.
    Curve(Vec<(f32, f32)>),
}

impl Property {
    pub fn constant(value: f32) -> Self {
        Property::Constant(value)
    }

    pub fn random(min: f32, max: f32) -> Self {
        Property::Random { min, max }
    }

    pub fn curve(points: impl Into<Vec<(f32, f32)>>) -> Self {
        Property::Curve(points.into())
    }

    /// Evaluate the property at `t` in `[0, 1]`.
    pub fn sample(&self, t: f32, rng: &mut dyn RngCore) -> f32 {
        match self {
            Property::Constant(value) => *value,
            Property::Random { min, max } => min + (max - min) * rand01(rng),
            Property::Curve(points) => sample_curve(points, t),
        }
    }
}

impl Default for Property {
    fn default() -> Self {
        Property::Constant(0.0)
    }
}

impl From<f32> for Property {
    fn from(value: f32) -> Self {
        Property::Constant(value)
    }
}

fn sample_curve(points: &[(f32, f32)], t: f32) -> f32 {
    match points {
        [] => 0.0,
        [(_, only)] => *only,
        _ => {
            let t = t.clamp(0.0, 1.0);
            if t <= points[0].0 {
                return points[0].1;
            }
            for pair in points.windows(2) {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                if t <= x1 {
                    let span = (x1 - x0).max(1e-6);
                    return lerp(y0, y1, (t - x0) / span);
                }
            }
            points[points.len() - 1].1
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn constant_ignores_argument() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = Property::constant(3.5);
        assert_eq!(p.sample(0.0, &mut rng), 3.5);
        assert_eq!(p.sample(1.0, &mut rng), 3.5);
    }

    #[test]
    fn random_draws_within_range_and_is_seed_deterministic() {
        let p = Property::random(2.0, 4.0);
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let va = p.sample(0.5, &mut a);
            let vb = p.sample(0.5, &mut b);
            assert_eq!(va, vb);
            assert!((2.0..=4.0).contains(&va));
        }
    }

    #[test]
    fn curve_interpolates_between_control_points() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = Property::curve(vec![(0.0, 1.0), (0.5, 3.0), (1.0, 0.0)]);
        assert_eq!(p.sample(0.0, &mut rng), 1.0);
        assert!((p.sample(0.25, &mut rng) - 2.0).abs() < 1e-5);
        assert!((p.sample(0.75, &mut rng) - 1.5).abs() < 1e-5);
        assert_eq!(p.sample(1.0, &mut rng), 0.0);
    }

    #[test]
    fn curve_clamps_outside_covered_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = Property::curve(vec![(0.2, 5.0), (0.8, 7.0)]);
        assert_eq!(p.sample(0.0, &mut rng), 5.0);
        assert_eq!(p.sample(1.0, &mut rng), 7.0);
    }

    #[test]
    fn empty_curve_samples_to_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Property::curve(vec![]).sample(0.3, &mut rng), 0.0);
    }
}
