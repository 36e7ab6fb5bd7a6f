//! Flipper Core - collision detection and response for a pinball table
//!
//! Core modules:
//! - `physics`: Deterministic collision core (colliders, spatial indices, step driver)
//! - `settings`: Data-driven physics configuration
//! - `error`: Recoverable API errors

pub mod error;
pub mod physics;
pub mod settings;

pub use error::PhysicsError;
pub use settings::PhysicsSettings;

/// Physics configuration constants
///
/// Time is measured in frames of 10 ms, distances in table units.
pub mod consts {
    /// Duration of one physics tick in frames (1 ms)
    pub const TICK_TIME: f32 = 0.1;
    /// Physics ticks per millisecond of game time
    pub const TICKS_PER_MSEC: u32 = 1;

    /// Distance below which a ball is considered touching a surface
    pub const PHYS_TOUCH: f32 = 0.05;
    /// Margin added to swept hit radii
    pub const PHYS_SKIN: f32 = 0.25;
    /// Normal speed below which a touch is a resting contact
    pub const CONTACT_VEL: f32 = 0.099;
    /// Normal speed below which a body is considered not moving along the normal
    pub const LOW_NORM_VEL: f32 = 0.0001;
    /// Slip speed below which static friction applies
    pub const PRECISION: f32 = 0.01;
    /// Fraction of the penetration depth corrected on impact
    pub const DISP_GAIN: f32 = 0.9825;
    /// Maximum positional correction per impact
    pub const DISP_LIMIT: f32 = 5.0;
    /// Penetration depth beyond which a slow ball is considered embedded
    pub const EMBEDDED: f32 = 0.0;
    /// Normal speed given to an embedded ball
    pub const EMBED_SHOT: f32 = 0.05;
    /// Hit times below this count as zero-time sub-steps
    pub const STATIC_TIME: f32 = 0.005;
    /// Consecutive zero-time sub-steps allowed before time is forced forward
    pub const STATIC_COUNTS: i32 = 10;
    /// Tolerance on a ball's rolling point for non-lateral line tests
    pub const TOL_RADIUS: f32 = 0.005;
    /// Tolerance on segment endpoints
    pub const TOL_ENDPOINTS: f32 = 0.0;
    /// Impact speed at which elasticity falloff halves the coefficient of restitution
    pub const FALLOFF_REFERENCE: f32 = 18.53;
    /// Iterations of the root search used by rotating flipper surfaces
    pub const FLIPPER_ITERATIONS: u32 = 20;

    /// Default ball radius
    pub const BALL_RADIUS: f32 = 25.0;
    /// Default ball mass
    pub const BALL_MASS: f32 = 1.0;
    /// Default ball-ball coefficient of restitution
    pub const BALL_BALL_ELASTICITY: f32 = 0.8;
    /// Gravity constant of a level table (units per frame²)
    pub const GRAVITY: f32 = 1.762_985;
    /// Minimum squared distance between two hit events of the same ball
    pub const EVENT_MIN_DIST_SQR: f32 = 0.25;
    /// Minimum milliseconds between two flipper collide events
    pub const FLIPPER_EVENT_INTERVAL_MS: u64 = 250;
}

/// Solve `a·t² + b·t + c = 0`
///
/// Returns both roots, `None` if the discriminant is negative.
#[inline]
pub fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    let discr = b * b - 4.0 * a * c;
    if discr < 0.0 {
        return None;
    }
    let discr = discr.sqrt();
    let inv_a = -0.5 / a;
    Some(((b + discr) * inv_a, (b - discr) * inv_a))
}

/// Pick the time of first contact from two quadratic roots.
///
/// Roots of opposite sign mean the body is already inside, so the exit root is
/// the next event. Otherwise the earlier root wins.
#[inline]
pub fn first_root(t1: f32, t2: f32) -> f32 {
    if t1 * t2 < 0.0 { t1.max(t2) } else { t1.min(t2) }
}

/// Clamp `value` into `[min, max]`, tolerating `min > max`
#[inline]
pub fn clamp_signed(value: f32, min: f32, max: f32) -> f32 {
    if min > max {
        value.clamp(max, min)
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_quadratic() {
        // (t - 1)(t - 3) = t² - 4t + 3
        let (t1, t2) = solve_quadratic(1.0, -4.0, 3.0).unwrap();
        let (lo, hi) = (t1.min(t2), t1.max(t2));
        assert!((lo - 1.0).abs() < 1e-5);
        assert!((hi - 3.0).abs() < 1e-5);

        assert!(solve_quadratic(1.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_first_root() {
        assert_eq!(first_root(2.0, 5.0), 2.0);
        assert_eq!(first_root(-1.0, 4.0), 4.0);
        assert_eq!(first_root(-3.0, -1.0), -3.0);
    }
}
