//! Spinner: a free-spinning blade across a lane

use serde::{Deserialize, Serialize};

use super::line::LineSegment;
use super::{ColliderHeader, ResolveContext};
use crate::physics::MechanismId;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::physics::mechanism::Mechanisms;

/// Spinner blade across `line`, passable from both sides
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpinnerHit {
    pub line: LineSegment,
    /// Blade length below the axle
    pub height: f32,
    pub mechanism: MechanismId,
}

impl SpinnerHit {
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
        mechanisms.spinners.get(self.mechanism.index()).filter(|s| s.enabled)?;
        let front = self.line.crossing_test(ball, dtime, target);
        let back = self
            .line
            .reversed()
            .crossing_test(ball, dtime, target)
            .map(|hit| hit.with_flag(true));
        match (front, back) {
            (Some(f), Some(b)) => Some(if b.hit_time < f.hit_time { b } else { f }),
            (f, b) => f.or(b),
        }
    }

    /// Spin the blade; Spin events come from the blade's own motion
    pub(crate) fn collide(
        &self,
        _header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        ctx: &mut ResolveContext<'_>,
    ) {
        let Ok(state) = ctx.mechanisms.spinner_mut(self.mechanism) else {
            return;
        };
        let dot = ball.velocity.dot(hit.hit_normal);
        let speed = dot.abs() / (self.height * 0.5).max(1.0);
        state.angle_speed = if hit.hit_flag { -speed } else { speed };
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::physics::collider::ColliderShape;
    use crate::physics::collider::test_support::{Harness, baked};
    use crate::physics::event_queue::EventKind;
    use crate::physics::mechanism::SpinnerState;
    use crate::physics::{BallId, ItemId};

    #[test]
    fn test_pass_spins_blade_until_spin_events() {
        let mut harness = Harness::new();
        let id = harness.mechanisms.add_spinner(SpinnerState::new(ItemId(8)));
        let line = LineSegment::new(Vec2::ZERO, Vec2::new(80.0, 0.0), 0.0, 60.0);
        let collider = baked(0, 8, ColliderShape::Spinner(SpinnerHit::new(line, 40.0, id)));

        let mut ball = Ball::new(BallId(0), Vec3::new(40.0, -2.0, 25.0), Vec3::new(0.0, 40.0, 0.0));
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        collider.collide(&mut ball, &hit, &mut harness.ctx());
        assert_eq!(ball.velocity.y, 40.0);
        assert!((harness.mechanisms.spinners[0].angle_speed - 2.0).abs() < 1e-5);

        let events = harness.events.clone();
        for _ in 0..10 {
            harness.mechanisms.update_displacements(1.0, &events);
        }
        assert!(harness.event_kinds().contains(&EventKind::Spin));
    }
}
