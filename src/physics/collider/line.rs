//! Vertical wall segments and slingshots

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{ColliderHeader, ResolveContext, Touch, classify_touch, touch_event, wall_response};
use crate::consts::{LOW_NORM_VEL, TOL_ENDPOINTS, TOL_RADIUS};
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::event_queue::EventKind;
use crate::physics::hit::{CollisionEvent, HitTarget};

/// Wall segment from `v1` to `v2`, extruded over `[z_low, z_high]`.
///
/// Solid on one side: the front face looks along `normal = (dir.y, -dir.x)`.
/// Endpoints are not tested here; bakes add [`HitLineZ`](super::HitLineZ)
/// posts at the corners.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LineSegment {
    pub v1: Vec2,
    pub v2: Vec2,
    pub z_low: f32,
    pub z_high: f32,
    pub normal: Vec2,
    pub length: f32,
}

impl LineSegment {
    pub fn new(v1: Vec2, v2: Vec2, z_low: f32, z_high: f32) -> Self {
        let along = v2 - v1;
        let length = along.length();
        let dir = if length > 0.0 { along / length } else { Vec2::X };
        Self {
            v1,
            v2,
            z_low,
            z_high,
            normal: Vec2::new(dir.y, -dir.x),
            length,
        }
    }

    /// Same segment facing the other way
    pub fn reversed(&self) -> Self {
        Self::new(self.v2, self.v1, self.z_low, self.z_high)
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        Vec2::new(-self.normal.y, self.normal.x)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_footprint(self.v1.min(self.v2), self.v1.max(self.v2), self.z_low, self.z_high)
    }

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        self.hit_test_moving(ball, dtime, target, Vec2::ZERO)
    }

    /// Rigid front-face test against a segment translating at `surface_velocity`
    pub fn hit_test_moving(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
        surface_velocity: Vec2,
    ) -> Option<CollisionEvent> {
        let rel_vel = ball.velocity.truncate() - surface_velocity;
        let bnv = self.normal.dot(rel_vel);
        let offset = ball.position.truncate() - self.v1;
        let bnd = self.normal.dot(offset) - ball.radius;

        // Center behind the line: the ball belongs to the other side
        let touch = classify_touch(bnv, bnd, ball.radius, dtime)?;
        let hit_time = match touch {
            Touch::Impact(t) => t,
            Touch::Contact => 0.0,
        };
        if !self.within(ball, offset + rel_vel * hit_time, hit_time) {
            return None;
        }
        Some(touch_event(touch, target, self.normal.extend(0.0), bnd, bnv))
    }

    /// Non-rigid front-face test: the ball center crossing the line.
    ///
    /// The hit time lands just past the line so the same crossing is not
    /// reported again on the next sub-step.
    pub fn crossing_test(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
    ) -> Option<CollisionEvent> {
        let vel = ball.velocity.truncate();
        let bnv = self.normal.dot(vel);
        if bnv >= -LOW_NORM_VEL {
            return None;
        }
        let offset = ball.position.truncate() - self.v1;
        let bnd = self.normal.dot(offset);
        if bnd < 0.0 {
            return None;
        }
        let hit_time = (bnd + TOL_RADIUS) / -bnv;
        if !hit_time.is_finite() || hit_time > dtime {
            return None;
        }
        if !self.within(ball, offset + vel * hit_time, hit_time) {
            return None;
        }
        let normal = self.normal.extend(0.0);
        Some(CollisionEvent::impact(target, hit_time, normal, bnd).with_normal_velocity(bnv))
    }

    /// Hit point inside the segment's extent and z range
    fn within(&self, ball: &Ball, offset_at_hit: Vec2, hit_time: f32) -> bool {
        let along = self.direction().dot(offset_at_hit);
        if along < -TOL_ENDPOINTS || along > self.length + TOL_ENDPOINTS {
            return false;
        }
        let hit_z = ball.position.z + ball.velocity.z * hit_time;
        let slack = ball.radius * 0.5;
        hit_z + slack >= self.z_low && hit_z - slack <= self.z_high
    }
}

/// Slingshot: a wall segment that kicks the ball on a hard enough hit
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlingshotLine {
    pub line: LineSegment,
    /// Speed added along the hit normal
    pub force: f32,
}

impl SlingshotLine {
    pub fn new(line: LineSegment, force: f32) -> Self {
        Self { line, force }
    }

    pub(crate) fn collide(
        &self,
        header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        ctx: &mut ResolveContext<'_>,
    ) {
        let Some(dot) = wall_response(header, ball, hit, ctx) else {
            return;
        };
        if -dot < header.threshold || !ball.moved_since_last_event() {
            return;
        }
        ball.velocity += hit.hit_normal * self.force;
        ball.last_event_pos = ball.position;
        if header.fire_events {
            ctx.events.emit(EventKind::Slingshot, header.item, None, header.is_group_event);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::physics::collider::ColliderShape;
    use crate::physics::collider::test_support::{Harness, baked};
    use crate::physics::material::PhysicsMaterial;
    use crate::physics::{BallId, ColliderId};

    const TARGET: HitTarget = HitTarget::Collider(ColliderId(0));

    /// Wall along x from 0 to 100 facing -y
    fn wall() -> LineSegment {
        LineSegment::new(Vec2::ZERO, Vec2::new(100.0, 0.0), 0.0, 50.0)
    }

    #[test]
    fn test_front_face_hit() {
        let ball = Ball::new(BallId(0), Vec3::new(50.0, -26.0, 25.0), Vec3::new(0.0, 20.0, 0.0));
        let hit = wall().hit_test(&ball, 0.1, TARGET).unwrap();
        assert!((hit.hit_time - 0.05).abs() < 1e-5);
        assert_eq!(hit.hit_normal, Vec3::NEG_Y);
    }

    #[test]
    fn test_back_side_and_past_end_ignored() {
        let behind = Ball::new(BallId(0), Vec3::new(50.0, 30.0, 25.0), Vec3::new(0.0, -20.0, 0.0));
        assert!(wall().hit_test(&behind, 0.1, TARGET).is_none());
        let velocity = Vec3::new(0.0, 20.0, 0.0);
        let past_end = Ball::new(BallId(0), Vec3::new(130.0, -26.0, 25.0), velocity);
        assert!(wall().hit_test(&past_end, 0.1, TARGET).is_none());
    }

    #[test]
    fn test_crossing_lands_past_line() {
        let ball = Ball::new(BallId(0), Vec3::new(50.0, -1.0, 25.0), Vec3::new(0.0, 20.0, 0.0));
        let line = wall();
        let hit = line.crossing_test(&ball, 0.1, TARGET).unwrap();
        let mut moved = ball.clone();
        moved.update_displacements(hit.hit_time);
        assert!(moved.position.y > 0.0);
        assert!(line.crossing_test(&moved, 0.1, TARGET).is_none());
    }

    #[test]
    fn test_slingshot_fires_once_per_spot() {
        let mut harness = Harness::new();
        let sling = baked(0, 2, ColliderShape::SlingshotLine(SlingshotLine::new(wall(), 10.0)))
            .with_material(PhysicsMaterial::bouncy(0.5))
            .with_events(1.0);
        let mut ball = Ball::new(BallId(0), Vec3::new(50.0, -25.0, 25.0), Vec3::new(0.0, 4.0, 0.0));
        let hit = sling.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        sling.collide(&mut ball, &hit, &mut harness.ctx());
        assert!((ball.velocity.y + 12.0).abs() < 1e-4);

        // Same spot again: bounce only
        ball.velocity = Vec3::new(0.0, 4.0, 0.0);
        sling.collide(&mut ball, &hit, &mut harness.ctx());
        assert!((ball.velocity.y + 2.0).abs() < 1e-4);
        assert_eq!(harness.event_kinds(), vec![EventKind::Slingshot]);
    }
}
