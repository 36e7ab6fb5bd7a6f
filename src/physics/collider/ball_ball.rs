//! Ball against ball

use glam::Vec3;

use super::{Touch, classify_touch, touch_event};
use crate::consts::{CONTACT_VEL, PHYS_TOUCH};
use crate::physics::ItemId;
use crate::physics::ball::Ball;
use crate::physics::event_queue::{EventKind, EventSender};
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::{first_root, solve_quadratic};

/// Item reported by ball-ball collide events
pub const BALL_ITEM: ItemId = ItemId(u32::MAX);

/// Earliest hit of `ball` with `other` within `dtime`; the normal points from
/// `other` toward `ball`
pub fn hit_test(ball: &Ball, other: &Ball, dtime: f32) -> Option<CollisionEvent> {
    let mut d = ball.position - other.position;
    let dv = ball.velocity - other.velocity;
    let target_radius = ball.radius + other.radius;
    let mut bcdd = d.length();
    if bcdd < 1.0e-8 {
        // Coincident centers: separate along +Z
        d = Vec3::Z;
        bcdd = 1.0;
    }
    let b = dv.dot(d);
    let bnv = b / bcdd;
    if bnv > CONTACT_VEL {
        return None;
    }
    let bnd = bcdd - target_radius;

    let touch = if bnd <= PHYS_TOUCH {
        classify_touch(bnv, bnd, 2.0 * ball.radius, dtime)?
    } else {
        let a = dv.length_squared();
        if a < 1.0e-8 {
            return None;
        }
        let (t1, t2) = solve_quadratic(a, 2.0 * b, bcdd * bcdd - target_radius * target_radius)?;
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
    let normal = (d + dv * hit_time).try_normalize().unwrap_or(Vec3::Z);
    Some(touch_event(touch, HitTarget::Ball(other.id), normal, bnd, bnv))
}

/// Impulse exchange between two balls at their current positions.
///
/// Frozen balls act as infinite mass. Nothing happens if the balls are
/// already separating, so a pair found by both balls resolves once.
/// Returns the approach speed along the normal (negative).
pub fn collide(ball: &mut Ball, other: &mut Ball, elasticity: f32) -> Option<f32> {
    let d = ball.position - other.position;
    let distance = d.length();
    let normal = if distance < 1.0e-8 { Vec3::Z } else { d / distance };
    let dot = (ball.velocity - other.velocity).dot(normal);
    let embedded = distance - (ball.radius + other.radius);
    let dot = Ball::approach_speed(dot, embedded)?;

    let inv_a = if ball.frozen { 0.0 } else { ball.inv_mass };
    let inv_b = if other.frozen { 0.0 } else { other.inv_mass };
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return None;
    }

    if embedded < 0.0 {
        // Each movable ball takes its share of the push-out
        let share = if inv_a > 0.0 && inv_b > 0.0 { 0.5 } else { 1.0 };
        if inv_a > 0.0 {
            ball.correct_embedding(normal, embedded * share);
        }
        if inv_b > 0.0 {
            other.correct_embedding(-normal, embedded * share);
        }
    }

    let impulse = -(1.0 + elasticity) * dot / inv_sum;
    ball.velocity += normal * (impulse * inv_a);
    other.velocity -= normal * (impulse * inv_b);
    Some(dot)
}

/// Impact between two balls, reported as a [`EventKind::BallBallCollide`]
pub(crate) fn collide_and_report(
    ball: &mut Ball,
    other: &mut Ball,
    elasticity: f32,
    events: &EventSender,
) {
    if let Some(dot) = collide(ball, other, elasticity) {
        events.emit(EventKind::BallBallCollide, BALL_ITEM, Some(-dot), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BallId;
    use crate::physics::event_queue::EventQueue;

    #[test]
    fn test_head_on_time_and_normal() {
        let a = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(10.0, 0.0, 0.0));
        let b = Ball::new(BallId(1), Vec3::new(52.0, 0.0, 25.0), Vec3::new(-10.0, 0.0, 0.0));
        let hit = hit_test(&a, &b, 0.2).unwrap();
        assert!((hit.hit_time - 0.1).abs() < 1e-4);
        assert!((hit.hit_normal - Vec3::NEG_X).length() < 1e-4);
        assert_eq!(hit.target, HitTarget::Ball(BallId(1)));
    }

    #[test]
    fn test_separating_balls_ignored() {
        let a = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(-10.0, 0.0, 0.0));
        let b = Ball::new(BallId(1), Vec3::new(50.0, 0.0, 25.0), Vec3::new(10.0, 0.0, 0.0));
        assert!(hit_test(&a, &b, 0.2).is_none());
    }

    #[test]
    fn test_elastic_exchange_resolves_once() {
        let queue = EventQueue::default();
        let events = queue.sender();
        let mut a = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(10.0, 0.0, 0.0));
        let mut b = Ball::new(BallId(1), Vec3::new(50.0, 0.0, 25.0), Vec3::ZERO);
        collide_and_report(&mut a, &mut b, 1.0, &events);
        assert!(a.velocity.length() < 1e-4);
        assert!((b.velocity.x - 10.0).abs() < 1e-4);

        // The partner's view of the same hit is now separating
        assert!(collide(&mut b, &mut a, 1.0).is_none());
        collide_and_report(&mut b, &mut a, 1.0, &events);
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].param, Some(10.0));
    }

    #[test]
    fn test_frozen_ball_is_immovable() {
        let mut a = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(10.0, 0.0, 0.0));
        let mut b = Ball::new(BallId(1), Vec3::new(50.0, 0.0, 25.0), Vec3::ZERO);
        b.frozen = true;
        assert_eq!(collide(&mut a, &mut b, 1.0), Some(-10.0));
        assert!((a.velocity.x + 10.0).abs() < 1e-4);
        assert_eq!(b.velocity, Vec3::ZERO);
    }
}
