//! Gate: a swinging flap the ball passes through

use serde::{Deserialize, Serialize};

use super::line::LineSegment;
use super::{ColliderHeader, ResolveContext, fire_hit_event, wall_response};
use crate::physics::MechanismId;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::physics::mechanism::Mechanisms;

/// Gate across `line`. Balls crossing the front face swing it open.
///
/// A one-way gate is a rigid wall from behind; a two-way gate swings either
/// way. Hits on the back face carry `hit_flag`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateHit {
    pub line: LineSegment,
    /// Flap length from the hinge; converts ball speed into swing speed
    pub height: f32,
    pub mechanism: MechanismId,
}

impl GateHit {
    pub fn new(line: LineSegment, height: f32, mechanism: MechanismId) -> Self {
        Self { line, height, mechanism }
    }

    pub fn bounds(&self) -> Aabb {
        self.line.bounds()
    }

    pub fn hit_test(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
        mechanisms: &Mechanisms,
    ) -> Option<CollisionEvent> {
        let state = mechanisms.gates.get(self.mechanism.index()).filter(|g| g.enabled)?;
        let front = self.line.crossing_test(ball, dtime, target);
        let back_face = self.line.reversed();
        let back = if state.two_way {
            back_face.crossing_test(ball, dtime, target)
        } else {
            back_face.hit_test(ball, dtime, target)
        }
        .map(|hit| hit.with_flag(true));

        match (front, back) {
            (Some(f), Some(b)) => Some(if b.hit_time < f.hit_time { b } else { f }),
            (f, b) => f.or(b),
        }
    }

    pub(crate) fn collide(
        &self,
        header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        ctx: &mut ResolveContext<'_>,
    ) {
        let Ok(state) = ctx.mechanisms.gate_mut(self.mechanism) else {
            return;
        };
        if hit.hit_flag && !state.two_way {
            if let Some(dot) = wall_response(header, ball, hit, ctx) {
                fire_hit_event(header, ball, dot, ctx);
            }
            return;
        }

        let dot = ball.velocity.dot(hit.hit_normal);
        let speed = dot.abs() / (self.height * 0.5).max(1.0);
        state.angle_speed = if hit.hit_flag { -speed } else { speed };
        fire_hit_event(header, ball, dot, ctx);
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::physics::collider::test_support::{Harness, baked};
    use crate::physics::collider::{Collider, ColliderShape};
    use crate::physics::event_queue::EventKind;
    use crate::physics::mechanism::GateState;
    use crate::physics::material::PhysicsMaterial;
    use crate::physics::{BallId, ItemId};

    /// Gate along x facing -y
    fn gate(two_way: bool) -> (Harness, Collider) {
        let mut harness = Harness::new();
        let id = harness.mechanisms.add_gate(GateState::new(ItemId(4), two_way));
        let line = LineSegment::new(Vec2::ZERO, Vec2::new(100.0, 0.0), 0.0, 50.0);
        let collider = baked(0, 4, ColliderShape::Gate(GateHit::new(line, 60.0, id)))
            .with_material(PhysicsMaterial::bouncy(0.5))
            .with_events(0.0);
        (harness, collider)
    }

    #[test]
    fn test_front_crossing_swings_open() {
        let (mut harness, collider) = gate(false);
        let mut ball = Ball::new(BallId(0), Vec3::new(50.0, -1.0, 25.0), Vec3::new(0.0, 30.0, 0.0));
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        assert!(!hit.hit_flag);
        collider.collide(&mut ball, &hit, &mut harness.ctx());

        // Passes through unchanged, flap swings toward the back
        assert_eq!(ball.velocity, Vec3::new(0.0, 30.0, 0.0));
        assert!((harness.mechanisms.gates[0].angle_speed - 1.0).abs() < 1e-5);
        assert_eq!(harness.event_kinds(), vec![EventKind::Hit]);
    }

    #[test]
    fn test_one_way_back_is_rigid() {
        let (mut harness, collider) = gate(false);
        let velocity = Vec3::new(0.0, -20.0, 0.0);
        let mut ball = Ball::new(BallId(0), Vec3::new(50.0, 26.0, 25.0), velocity);
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        assert!(hit.hit_flag);
        collider.collide(&mut ball, &hit, &mut harness.ctx());
        assert!((ball.velocity.y - 10.0).abs() < 1e-4);
        assert_eq!(harness.mechanisms.gates[0].angle_speed, 0.0);
    }

    #[test]
    fn test_two_way_back_swings_negative() {
        let (mut harness, collider) = gate(true);
        let mut ball = Ball::new(BallId(0), Vec3::new(50.0, 1.0, 25.0), Vec3::new(0.0, -30.0, 0.0));
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        assert!(hit.hit_flag);
        collider.collide(&mut ball, &hit, &mut harness.ctx());
        assert!(harness.mechanisms.gates[0].angle_speed < 0.0);
        assert_eq!(ball.velocity.y, -30.0);
    }
}
