//! Signed distance helpers for rotating colliders
//!
//! Flipper surfaces move during a sub-step, so their time of impact has no
//! closed form. The distance field is sampled over the sub-step and the first
//! sign change is refined by bisection.

use glam::Vec2;

use crate::consts::FLIPPER_ITERATIONS;

/// Samples taken across a sub-step before bisecting
const CROSSING_SAMPLES: u32 = 8;

/// Signed distance to a tapered capsule lying along +X: a circle of radius `r1`
/// at the origin, one of radius `r2` at `(length, 0)`, and their common tangents
pub fn sd_tapered_capsule(p: Vec2, r1: f32, r2: f32, length: f32) -> f32 {
    if length <= 1.0e-6 {
        return p.length() - r1.max(r2);
    }
    let q = Vec2::new(p.y.abs(), p.x);
    let b = ((r1 - r2) / length).clamp(-1.0, 1.0);
    let a = (1.0 - b * b).sqrt();
    let k = q.dot(Vec2::new(-b, a));
    if k < 0.0 {
        return q.length() - r1;
    }
    if k > a * length {
        return (q - Vec2::new(0.0, length)).length() - r2;
    }
    q.dot(Vec2::new(a, b)) - r1
}

/// Surface normal from central differences
pub fn sdf_gradient<F>(p: Vec2, sdf: F) -> Vec2
where
    F: Fn(Vec2) -> f32,
{
    let eps = 0.05;
    let dx = sdf(p + Vec2::new(eps, 0.0)) - sdf(p - Vec2::new(eps, 0.0));
    let dy = sdf(p + Vec2::new(0.0, eps)) - sdf(p - Vec2::new(0.0, eps));
    Vec2::new(dx, dy).normalize_or_zero()
}

/// First time in `(0, dtime]` where `distance(t)` drops to zero.
///
/// Returns the last time still outside the surface, so the caller resolves
/// the hit with the ball just touching.
pub fn first_crossing<F>(dtime: f32, distance: F) -> Option<f32>
where
    F: Fn(f32) -> f32,
{
    if dtime <= 0.0 {
        return None;
    }
    let step = dtime / CROSSING_SAMPLES as f32;
    let mut lo = 0.0;
    for i in 1..=CROSSING_SAMPLES {
        let t = step * i as f32;
        let d = distance(t);
        if !d.is_finite() {
            return None;
        }
        if d <= 0.0 {
            let mut hi = t;
            for _ in 0..FLIPPER_ITERATIONS {
                let mid = 0.5 * (lo + hi);
                if distance(mid) > 0.0 {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            return Some(lo);
        }
        lo = t;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sd_circle(p: Vec2, center: Vec2, radius: f32) -> f32 {
        (p - center).length() - radius
    }

    #[test]
    fn test_tapered_capsule_regions() {
        // Base radius 10 at origin, tip radius 5 at (100, 0)
        let d = |p: Vec2| sd_tapered_capsule(p, 10.0, 5.0, 100.0);
        assert!((d(Vec2::new(-20.0, 0.0)) - 10.0).abs() < 1e-4);
        assert!((d(Vec2::new(115.0, 0.0)) - 10.0).abs() < 1e-4);
        // Midway the face sits between the two radii
        let mid = d(Vec2::new(50.0, 20.0));
        assert!(mid > 11.0 && mid < 13.5);
        // Symmetric about the axis
        assert!((d(Vec2::new(50.0, -20.0)) - mid).abs() < 1e-5);
        assert!(d(Vec2::new(50.0, 0.0)) < 0.0);
    }

    #[test]
    fn test_gradient_of_circle() {
        let n = sdf_gradient(Vec2::new(3.0, 4.0), |p| sd_circle(p, Vec2::ZERO, 1.0));
        assert!((n - Vec2::new(0.6, 0.8)).length() < 1e-3);
    }

    #[test]
    fn test_first_crossing_linear() {
        // Surface reached at t = 0.037
        let t = first_crossing(0.1, |t| 0.037 - t).unwrap();
        assert!(t <= 0.037 && 0.037 - t < 1e-5);
        assert!(first_crossing(0.1, |t| 1.0 - t).is_none());
    }
}
