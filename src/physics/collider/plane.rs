//! Infinite plane (playfield, glass)

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{classify_touch, touch_event};
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};

/// Plane `normal · p = distance`, solid on the back side
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitPlane {
    pub normal: Vec3,
    pub distance: f32,
}

impl HitPlane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize_or(Vec3::Z),
            distance,
        }
    }

    /// Horizontal floor at height `z`
    pub fn floor(z: f32) -> Self {
        Self::new(Vec3::Z, z)
    }

    /// Horizontal ceiling at height `z`
    pub fn ceiling(z: f32) -> Self {
        Self::new(Vec3::NEG_Z, -z)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::splat(f32::MIN), Vec3::splat(f32::MAX))
    }

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        let bnv = self.normal.dot(ball.velocity);
        let bnd = self.normal.dot(ball.position) - ball.radius - self.distance;
        let touch = classify_touch(bnv, bnd, 2.0 * ball.radius, dtime)?;
        Some(touch_event(touch, target, self.normal, bnd, bnv))
    }
}
