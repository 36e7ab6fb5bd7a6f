//! Plunger tip: a rigid face translating along Y

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::line::LineSegment;
use super::{ColliderHeader, ResolveContext, fire_hit_event};
use crate::physics::MechanismId;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::physics::mechanism::{Mechanisms, PlungerState};

/// Plunger tip spanning `x_left..x_right`, facing -Y
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlungerHit {
    pub x_left: f32,
    pub x_right: f32,
    pub z_low: f32,
    pub z_high: f32,
    /// Tip travel, park and fully pulled positions
    pub travel: (f32, f32),
    pub mechanism: MechanismId,
}

impl PlungerHit {
    /// Plunger whose tip travels between the state's park and stroke-end positions
    pub fn new(x_left: f32, x_right: f32, state: &PlungerState, mechanism: MechanismId) -> Self {
        Self {
            x_left,
            x_right,
            z_low: 0.0,
            z_high: 50.0,
            travel: (state.park_position, state.stroke_end),
            mechanism,
        }
    }

    pub fn bounds(&self) -> Aabb {
        let (a, b) = self.travel;
        Aabb::from_footprint(
            Vec2::new(self.x_left, a.min(b)),
            Vec2::new(self.x_right, a.max(b)),
            self.z_low,
            self.z_high,
        )
    }

    /// Tip face at tip position `y`
    fn face(&self, y: f32) -> LineSegment {
        let (left, right) = (Vec2::new(self.x_left, y), Vec2::new(self.x_right, y));
        LineSegment::new(left, right, self.z_low, self.z_high)
    }

    pub fn hit_test(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
        mechanisms: &Mechanisms,
    ) -> Option<CollisionEvent> {
        let state = mechanisms.plungers.get(self.mechanism.index()).filter(|p| p.enabled)?;
        self.face(state.position)
            .hit_test_moving(ball, dtime, target, Vec2::new(0.0, state.speed))
    }

    /// Infinite-mass response against the moving face
    pub(crate) fn collide(
        &self,
        header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        ctx: &mut ResolveContext<'_>,
    ) {
        let Ok(state) = ctx.mechanisms.plunger(self.mechanism) else {
            return;
        };
        let surface = Vec3::new(0.0, state.speed, 0.0);
        let rel = ball.velocity - surface;
        let Some(dot) = Ball::approach_speed(rel.dot(hit.hit_normal), hit.hit_distance) else {
            return;
        };
        ball.correct_embedding(hit.hit_normal, hit.hit_distance);
        let elasticity = header.material.elasticity_at(dot);
        ball.velocity += hit.hit_normal * (-(1.0 + elasticity) * dot);
        fire_hit_event(header, ball, dot, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::ColliderShape;
    use crate::physics::collider::test_support::{Harness, baked};
    use crate::physics::material::PhysicsMaterial;
    use crate::physics::{BallId, ItemId};

    #[test]
    fn test_firing_plunger_launches_ball() {
        let mut harness = Harness::new();
        let mut state = PlungerState::new(ItemId(3), 100.0, 180.0);
        state.position = 180.0;
        state.fire();
        let speed = state.speed;
        let plunger = PlungerHit::new(-30.0, 30.0, &state, MechanismId(0));
        harness.mechanisms.add_plunger(state);
        let material = PhysicsMaterial::bouncy(0.0);
        let collider = baked(0, 3, ColliderShape::Plunger(plunger)).with_material(material);

        // Ball resting just in front of the tip
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 155.0, 25.0), Vec3::ZERO);
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        assert_eq!(hit.hit_normal, Vec3::NEG_Y);
        harness.mechanisms.plungers[0].update_displacements(hit.hit_time);
        collider.collide(&mut ball, &hit, &mut harness.ctx());
        assert!((ball.velocity.y - speed).abs() < 1e-3);
    }

    #[test]
    fn test_parked_plunger_is_a_wall() {
        let mut harness = Harness::new();
        let state = PlungerState::new(ItemId(3), 100.0, 180.0);
        let plunger = PlungerHit::new(-30.0, 30.0, &state, MechanismId(0));
        harness.mechanisms.add_plunger(state);
        let material = PhysicsMaterial::bouncy(0.5);
        let collider = baked(0, 3, ColliderShape::Plunger(plunger)).with_material(material);

        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 70.0, 25.0), Vec3::new(0.0, 20.0, 0.0));
        let hit = collider.hit_test(&ball, 0.5, &harness.mechanisms).unwrap();
        assert!((hit.hit_time - 0.25).abs() < 1e-4);
        ball.update_displacements(hit.hit_time);
        collider.collide(&mut ball, &hit, &mut harness.ctx());
        assert!((ball.velocity.y + 10.0).abs() < 1e-4);
    }
}
