//! Kicker hole: captures the ball until kicked out

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::trigger::{circle_interval, crossing_time};
use super::{ColliderHeader, ResolveContext};
use crate::physics::MechanismId;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::event_queue::EventKind;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::physics::mechanism::Mechanisms;

/// Capture circle of a kicker. The ball is caught when its center enters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KickerCircle {
    pub center: Vec2,
    pub radius: f32,
    pub z_low: f32,
    pub z_high: f32,
    pub mechanism: MechanismId,
}

impl KickerCircle {
    pub fn new(center: Vec2, radius: f32, mechanism: MechanismId) -> Self {
        Self {
            center,
            radius,
            z_low: 0.0,
            z_high: 50.0,
            mechanism,
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
        header: &ColliderHeader,
        mechanisms: &Mechanisms,
    ) -> Option<CollisionEvent> {
        let state = mechanisms.kickers.get(self.mechanism.index()).filter(|k| k.enabled)?;
        let is_member = ball.is_inside_collider(header.id);
        // One ball at a time
        if !ball.is_inside(header.item) && state.captured.is_some() {
            return None;
        }
        if ball.position.z - ball.radius > self.z_high {
            return None;
        }
        let t = crossing_time(circle_interval(self.center, self.radius, ball), dtime, is_member)?;
        let target = HitTarget::Collider(header.id);
        Some(CollisionEvent::impact(target, t, Vec3::Z, 0.0).with_flag(!is_member))
    }

    pub(crate) fn collide(
        &self,
        header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        ctx: &mut ResolveContext<'_>,
    ) {
        let Ok(state) = ctx.mechanisms.kicker_mut(self.mechanism) else {
            return;
        };
        if !hit.hit_flag {
            if ball.leave_volume(header.item, header.id) {
                if state.captured == Some(ball.id) {
                    state.captured = None;
                }
                ctx.events.emit(EventKind::Unhit, header.item, None, header.is_group_event);
            }
            return;
        }

        // Already held by another circle of the same kicker
        if !ball.enter_volume(header.item, header.id) {
            return;
        }
        if state.drain {
            ctx.drained.push(ball.id);
        } else {
            ball.frozen = true;
            ball.position.x = self.center.x;
            ball.position.y = self.center.y;
            ball.velocity = Vec3::ZERO;
            ball.angular_momentum = Vec3::ZERO;
            ball.angular_velocity = Vec3::ZERO;
            state.captured = Some(ball.id);
        }
        ctx.events.emit(EventKind::Hit, header.item, None, header.is_group_event);
    }
}
