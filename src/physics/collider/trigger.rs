//! Switch volumes: triggers the ball rolls over
//!
//! A trigger never deflects the ball. Its hit test reports the moment the ball
//! center enters the volume (for balls not yet inside) or leaves it (for balls
//! inside), and resolution flips the ball's membership. Membership is kept per
//! collider; an item built from several volumes closes on the first entry and
//! opens on the last exit.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::line::LineSegment;
use super::{ColliderHeader, ResolveContext};
use crate::physics::ColliderId;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::event_queue::EventKind;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::solve_quadratic;

/// Shortest stay inside a volume that counts as an entry
const MIN_INSIDE_TIME: f32 = 1.0e-4;

/// Time interval the ball center spends inside a volume, unbounded when the
/// ball never leaves
pub(crate) type InsideInterval = Option<(f32, f32)>;

/// Next membership change within `dtime`.
///
/// Outside balls enter at the start of the interval if they stay long enough;
/// inside balls leave at its end, or at once if the interval already passed.
pub(crate) fn crossing_time(interval: InsideInterval, dtime: f32, is_member: bool) -> Option<f32> {
    match (interval, is_member) {
        (None, true) => Some(0.0),
        (None, false) => None,
        (Some((_, exit)), true) => {
            if exit <= 0.0 {
                Some(0.0)
            } else {
                (exit <= dtime).then_some(exit)
            }
        }
        (Some((enter, exit)), false) => {
            let enter = enter.max(0.0);
            (exit - enter > MIN_INSIDE_TIME && enter <= dtime).then_some(enter)
        }
    }
}

/// Interval the ball center spends within `radius` of `center` (XY only)
pub(crate) fn circle_interval(center: Vec2, radius: f32, ball: &Ball) -> InsideInterval {
    let d = ball.position.truncate() - center;
    let dv = ball.velocity.truncate();
    let a = dv.length_squared();
    let c = d.length_squared() - radius * radius;
    if a < 1.0e-8 {
        return (c <= 0.0).then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let (t1, t2) = solve_quadratic(a, 2.0 * dv.dot(d), c)?;
    Some((t1.min(t2), t1.max(t2)))
}

/// Interval a moving coordinate `x` with speed `v` spends inside `[lo, hi]`
fn slab_interval(x: f32, v: f32, lo: f32, hi: f32) -> InsideInterval {
    if v.abs() < 1.0e-6 {
        return (lo..=hi).contains(&x).then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let ta = (lo - x) / v;
    let tb = (hi - x) / v;
    Some((ta.min(tb), ta.max(tb)))
}

fn volume_event(target: HitTarget, time: f32, is_member: bool) -> CollisionEvent {
    CollisionEvent::impact(target, time, Vec3::Z, 0.0).with_flag(!is_member)
}

/// Round switch
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TriggerCircle {
    pub center: Vec2,
    pub radius: f32,
    pub z_low: f32,
    pub z_high: f32,
}

impl TriggerCircle {
    pub fn new(center: Vec2, radius: f32, z_low: f32, z_high: f32) -> Self {
        Self {
            center,
            radius,
            z_low,
            z_high,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_footprint(
            self.center - Vec2::splat(self.radius),
            self.center + Vec2::splat(self.radius),
            self.z_low,
            self.z_high,
        )
    }

    pub fn hit_test(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
        id: ColliderId,
    ) -> Option<CollisionEvent> {
        let is_member = ball.is_inside_collider(id);
        let interval = if within_height(ball, self.z_low, self.z_high) {
            circle_interval(self.center, self.radius, ball)
        } else {
            None
        };
        let t = crossing_time(interval, dtime, is_member)?;
        Some(volume_event(target, t, is_member))
    }
}

/// Straight switch: a box of `half_width` around `line`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TriggerLine {
    pub line: LineSegment,
    pub half_width: f32,
}

impl TriggerLine {
    pub fn new(line: LineSegment, half_width: f32) -> Self {
        Self { line, half_width }
    }

    pub fn bounds(&self) -> Aabb {
        self.line.bounds().inflated(self.half_width)
    }

    pub fn hit_test(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
        id: ColliderId,
    ) -> Option<CollisionEvent> {
        let is_member = ball.is_inside_collider(id);
        let interval = if within_height(ball, self.line.z_low, self.line.z_high) {
            self.box_interval(ball)
        } else {
            None
        };
        let t = crossing_time(interval, dtime, is_member)?;
        Some(volume_event(target, t, is_member))
    }

    fn box_interval(&self, ball: &Ball) -> InsideInterval {
        let dir = self.line.direction();
        let normal = self.line.normal;
        let offset = ball.position.truncate() - self.line.v1;
        let vel = ball.velocity.truncate();
        let (a1, a2) = slab_interval(offset.dot(dir), vel.dot(dir), 0.0, self.line.length)?;
        let w = self.half_width;
        let (b1, b2) = slab_interval(offset.dot(normal), vel.dot(normal), -w, w)?;
        let (enter, exit) = (a1.max(b1), a2.min(b2));
        (enter <= exit).then_some((enter, exit))
    }
}

fn within_height(ball: &Ball, z_low: f32, z_high: f32) -> bool {
    ball.position.z + ball.radius >= z_low && ball.position.z - ball.radius <= z_high
}

/// Flip the ball's membership and report the switch
pub(crate) fn collide(
    header: &ColliderHeader,
    ball: &mut Ball,
    hit: &CollisionEvent,
    ctx: &mut ResolveContext<'_>,
) {
    if hit.hit_flag {
        if ball.enter_volume(header.item, header.id) {
            ctx.events
                .emit(EventKind::SwitchClosed, header.item, None, header.is_group_event);
        }
    } else if ball.leave_volume(header.item, header.id) {
        ctx.events
            .emit(EventKind::SwitchOpen, header.item, None, header.is_group_event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::ColliderShape;
    use crate::physics::collider::test_support::{Harness, baked};
    use crate::physics::{BallId, ItemId};

    const TARGET: HitTarget = HitTarget::Collider(ColliderId(0));

    #[test]
    fn test_crossing_time_rules() {
        // Entering half way, leaving after the sub-step
        assert_eq!(crossing_time(Some((0.05, 0.3)), 0.1, false), Some(0.05));
        // Already inside, not yet a member
        assert_eq!(crossing_time(Some((-1.0, 0.3)), 0.1, false), Some(0.0));
        // Grazing touch too short to count
        assert_eq!(crossing_time(Some((0.05, 0.05)), 0.1, false), None);
        // Member leaving within the sub-step
        assert_eq!(crossing_time(Some((-1.0, 0.08)), 0.1, true), Some(0.08));
        // Member already gone
        assert_eq!(crossing_time(None, 0.1, true), Some(0.0));
        // Resting inside
        let forever = Some((f32::NEG_INFINITY, f32::INFINITY));
        assert_eq!(crossing_time(forever, 0.1, true), None);
        assert_eq!(crossing_time(forever, 0.1, false), Some(0.0));
    }

    #[test]
    fn test_circle_entry_then_exit() {
        let trigger = TriggerCircle::new(Vec2::ZERO, 20.0, 0.0, 50.0);
        let id = ColliderId(0);
        let velocity = Vec3::new(100.0, 0.0, 0.0);
        let mut ball = Ball::new(BallId(0), Vec3::new(-25.0, 0.0, 25.0), velocity);
        let enter = trigger.hit_test(&ball, 0.1, TARGET, id).unwrap();
        assert!(enter.hit_flag);
        assert!((enter.hit_time - 0.05).abs() < 1e-4);

        ball.update_displacements(enter.hit_time);
        ball.enter_volume(ItemId(6), id);
        // Exit is 0.4 away
        assert!(trigger.hit_test(&ball, 0.1, TARGET, id).is_none());
        let exit = trigger.hit_test(&ball, 0.5, TARGET, id).unwrap();
        assert!(!exit.hit_flag);
        assert!((exit.hit_time - 0.4).abs() < 1e-3);
    }

    #[test]
    fn test_line_box_entry() {
        let line = LineSegment::new(Vec2::ZERO, Vec2::new(100.0, 0.0), 0.0, 50.0);
        let trigger = TriggerLine::new(line, 5.0);
        let ball = Ball::new(BallId(0), Vec3::new(50.0, -10.0, 25.0), Vec3::new(0.0, 100.0, 0.0));
        let hit = trigger.hit_test(&ball, 0.1, TARGET, ColliderId(0)).unwrap();
        assert!(hit.hit_flag);
        assert!((hit.hit_time - 0.05).abs() < 1e-4);

        let beside = Ball::new(BallId(0), Vec3::new(150.0, -10.0, 25.0), ball.velocity);
        assert!(trigger.hit_test(&beside, 0.1, TARGET, ColliderId(0)).is_none());
    }

    #[test]
    fn test_collide_toggles_membership_once() {
        let mut harness = Harness::new();
        let circle = TriggerCircle::new(Vec2::ZERO, 20.0, 0.0, 50.0);
        let collider = baked(0, 6, ColliderShape::TriggerCircle(circle));
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::ZERO);
        let enter = volume_event(TARGET, 0.0, false);
        collider.collide(&mut ball, &enter, &mut harness.ctx());
        collider.collide(&mut ball, &enter, &mut harness.ctx());
        assert!(ball.is_inside(ItemId(6)));

        let exit = volume_event(TARGET, 0.0, true);
        collider.collide(&mut ball, &exit, &mut harness.ctx());
        assert_eq!(
            harness.event_kinds(),
            vec![EventKind::SwitchClosed, EventKind::SwitchOpen]
        );
    }

    #[test]
    fn test_overlapping_volumes_of_one_item_report_once() {
        let mut harness = Harness::new();
        let shape = |x: f32| {
            ColliderShape::TriggerCircle(TriggerCircle::new(Vec2::new(x, 0.0), 20.0, 0.0, 50.0))
        };
        let first = baked(0, 6, shape(0.0));
        let second = baked(1, 6, shape(15.0));
        let mut ball = Ball::new(BallId(0), Vec3::new(10.0, 0.0, 25.0), Vec3::ZERO);

        let enter = volume_event(TARGET, 0.0, false);
        first.collide(&mut ball, &enter, &mut harness.ctx());
        second.collide(&mut ball, &enter, &mut harness.ctx());
        // Inside the second volume now, so its test no longer reports an entry
        assert!(second.hit_test(&ball, 0.1, &harness.mechanisms).is_none());

        let exit = volume_event(TARGET, 0.0, true);
        first.collide(&mut ball, &exit, &mut harness.ctx());
        assert!(ball.is_inside(ItemId(6)));
        second.collide(&mut ball, &exit, &mut harness.ctx());
        assert!(!ball.is_inside(ItemId(6)));
        assert_eq!(
            harness.event_kinds(),
            vec![EventKind::SwitchClosed, EventKind::SwitchOpen]
        );
    }
}
