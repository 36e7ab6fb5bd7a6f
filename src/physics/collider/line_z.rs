//! Vertical edges and arbitrary 3D edges

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::circle::{MovingSphere, cylinder_hit_test};
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};

/// Vertical edge at `xy` spanning `[z_low, z_high]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitLineZ {
    pub xy: Vec2,
    pub z_low: f32,
    pub z_high: f32,
}

impl HitLineZ {
    pub fn new(xy: Vec2, z_low: f32, z_high: f32) -> Self {
        Self { xy, z_low, z_high }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_footprint(self.xy, self.xy, self.z_low, self.z_high)
    }

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        let z_range = (self.z_low, self.z_high);
        cylinder_hit_test(self.xy, 0.0, z_range, 0.0, MovingSphere::from(ball), dtime, target)
    }
}

/// Edge between two arbitrary points.
///
/// Tested as a vertical edge in a frame rotated so the edge runs along +Z.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitLine3D {
    pub v1: Vec3,
    pub v2: Vec3,
    /// World to edge frame
    rotation: Quat,
    length: f32,
}

impl HitLine3D {
    pub fn new(v1: Vec3, v2: Vec3) -> Self {
        let along = v2 - v1;
        let length = along.length();
        let rotation = if length > 0.0 {
            Quat::from_rotation_arc(along / length, Vec3::Z)
        } else {
            Quat::IDENTITY
        };
        Self {
            v1,
            v2,
            rotation,
            length,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.v1.min(self.v2), self.v1.max(self.v2))
    }

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        if self.length <= 0.0 {
            return None;
        }
        let local = MovingSphere {
            position: self.rotation * (ball.position - self.v1),
            velocity: self.rotation * ball.velocity,
            radius: ball.radius,
        };
        let z_range = (0.0, self.length);
        let mut hit = cylinder_hit_test(Vec2::ZERO, 0.0, z_range, 0.0, local, dtime, target)?;
        hit.hit_normal = self.rotation.inverse() * hit.hit_normal;
        Some(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BallId, ColliderId};

    const TARGET: HitTarget = HitTarget::Collider(ColliderId(0));

    #[test]
    fn test_corner_post() {
        let post = HitLineZ::new(Vec2::new(100.0, 0.0), 0.0, 50.0);
        let ball = Ball::new(BallId(0), Vec3::new(100.0, -27.0, 25.0), Vec3::new(0.0, 20.0, 0.0));
        let hit = post.hit_test(&ball, 0.2, TARGET).unwrap();
        assert!((hit.hit_time - 0.1).abs() < 1e-4);
        assert!((hit.hit_normal - Vec3::NEG_Y).length() < 1e-4);
    }

    #[test]
    fn test_horizontal_edge_normal_in_world_frame() {
        // Edge along x at height 0, ball dropping onto it
        let edge = HitLine3D::new(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0));
        let ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 26.0), Vec3::new(0.0, 0.0, -20.0));
        let hit = edge.hit_test(&ball, 0.1, TARGET).unwrap();
        assert!((hit.hit_time - 0.05).abs() < 1e-3);
        assert!((hit.hit_normal - Vec3::Z).length() < 1e-3);

        // Beyond the end of the edge
        let off_end = Ball::new(BallId(0), Vec3::new(80.0, 0.0, 26.0), Vec3::new(0.0, 0.0, -20.0));
        assert!(edge.hit_test(&off_end, 0.1, TARGET).is_none());
    }
}
