//! Mesh face

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{Touch, classify_touch, touch_event};
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};

/// Triangle, solid behind the face whose vertices wind counter-clockwise
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitTriangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub normal: Vec3,
}

impl HitTriangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a,
            b,
            c,
            normal: (b - a).cross(c - a).normalize_or_zero(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.normal == Vec3::ZERO
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&[self.a, self.b, self.c])
    }

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        if self.is_degenerate() {
            return None;
        }
        let bnv = self.normal.dot(ball.velocity);
        let bnd = self.normal.dot(ball.position - self.a) - ball.radius;
        let touch = classify_touch(bnv, bnd, ball.radius, dtime)?;
        let hit_time = match touch {
            Touch::Impact(t) => t,
            Touch::Contact => 0.0,
        };
        let contact_point = ball.position + ball.velocity * hit_time - self.normal * ball.radius;
        if !self.contains(contact_point) {
            return None;
        }
        Some(touch_event(touch, target, self.normal, bnd, bnv))
    }

    /// Point in the plane of the triangle lies inside it (barycentric test)
    fn contains(&self, p: Vec3) -> bool {
        let e0 = self.b - self.a;
        let e1 = self.c - self.a;
        let ep = p - self.a;
        let d00 = e0.dot(e0);
        let d01 = e0.dot(e1);
        let d11 = e1.dot(e1);
        let dp0 = ep.dot(e0);
        let dp1 = ep.dot(e1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < f32::EPSILON {
            return false;
        }
        let v = (d11 * dp0 - d01 * dp1) / denom;
        let w = (d00 * dp1 - d01 * dp0) / denom;
        v >= 0.0 && w >= 0.0 && v + w <= 1.0
    }
}
