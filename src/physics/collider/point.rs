//! Isolated vertex

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{Touch, classify_touch, touch_event};
use crate::consts::PHYS_TOUCH;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::{first_root, solve_quadratic};

/// Single point, the corner of a mesh
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitPoint {
    pub p: Vec3,
}

impl HitPoint {
    pub fn new(p: Vec3) -> Self {
        Self { p }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.p, self.p)
    }

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        let d = ball.position - self.p;
        let dv = ball.velocity;
        let bcdd_sqr = d.length_squared();
        let bcdd = bcdd_sqr.sqrt();
        if bcdd < 1.0e-6 {
            return None;
        }
        let b = dv.dot(d);
        let bnv = b / bcdd;
        let bnd = bcdd - ball.radius;

        let touch = if bnd <= PHYS_TOUCH {
            classify_touch(bnv, bnd, ball.radius, dtime)?
        } else {
            let a = dv.length_squared();
            if a < 1.0e-8 || bnv >= 0.0 {
                return None;
            }
            let (t1, t2) = solve_quadratic(a, 2.0 * b, bcdd_sqr - ball.radius * ball.radius)?;
            let t = first_root(t1, t2);
            if !t.is_finite() || t < 0.0 || t > dtime {
                return None;
            }
            Touch::Impact(t)
        };
        let hit_time = match touch {
            Touch::Impact(t) => t,
            Touch::Contact => 0.0,
        };
        let normal = (d + dv * hit_time).normalize_or_zero();
        if normal == Vec3::ZERO {
            return None;
        }
        Some(touch_event(touch, target, normal, bnd, bnv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BallId, ColliderId};

    #[test]
    fn test_diagonal_approach() {
        let point = HitPoint::new(Vec3::ZERO);
        let dir = Vec3::new(1.0, 1.0, 1.0).normalize();
        let ball = Ball::new(BallId(0), dir * 27.0, -dir * 40.0);
        let hit = point.hit_test(&ball, 0.1, HitTarget::Collider(ColliderId(1))).unwrap();
        assert!((hit.hit_time - 0.05).abs() < 1e-4);
        assert!((hit.hit_normal - dir).length() < 1e-4);
    }
}
