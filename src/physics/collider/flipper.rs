//! Flipper: a tapered capsule rotating about its pivot
//!
//! The surface moves during the sub-step, so the time of impact comes from
//! sampling the signed distance along the ball path and flipper swing, then
//! bisecting the first sign change. The response is an impulse exchange with
//! the flipper's rotational inertia, so a swinging flipper shoots the ball.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{ColliderHeader, ResolveContext, Touch, classify_touch, touch_event};
use crate::consts::{CONTACT_VEL, LOW_NORM_VEL, PHYS_TOUCH, PRECISION};
use crate::physics::MechanismId;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::event_queue::EventKind;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::physics::mechanism::{FlipperState, Mechanisms};
use crate::physics::sdf::{first_crossing, sd_tapered_capsule, sdf_gradient};

/// Flipper geometry; angle and speed live in [`FlipperState`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlipperHit {
    pub pivot: Vec2,
    pub base_radius: f32,
    pub end_radius: f32,
    /// Pivot to end-circle center
    pub length: f32,
    pub z_low: f32,
    pub z_high: f32,
    pub mechanism: MechanismId,
}

/// Unit vector along the flipper at `angle`
#[inline]
fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.sin(), -angle.cos())
}

/// Velocity of a point at `r` from the pivot of a body spinning at `omega`
#[inline]
fn rotation_velocity(omega: f32, r: Vec2) -> Vec2 {
    omega * r.perp()
}

impl FlipperHit {
    pub fn new(
        pivot: Vec2,
        base_radius: f32,
        end_radius: f32,
        length: f32,
        mechanism: MechanismId,
    ) -> Self {
        Self {
            pivot,
            base_radius,
            end_radius,
            length,
            z_low: 0.0,
            z_high: 50.0,
            mechanism,
        }
    }

    pub fn with_height(mut self, z_low: f32, z_high: f32) -> Self {
        self.z_low = z_low;
        self.z_high = z_high;
        self
    }

    /// Bounds of the full swing
    pub fn bounds(&self) -> Aabb {
        let reach = (self.length + self.end_radius).max(self.base_radius);
        Aabb::from_footprint(
            self.pivot - Vec2::splat(reach),
            self.pivot + Vec2::splat(reach),
            self.z_low,
            self.z_high,
        )
    }

    /// World point to the flipper frame (+X along the flipper)
    #[inline]
    fn to_local(&self, p: Vec2, angle: f32) -> Vec2 {
        let rel = p - self.pivot;
        let dir = direction(angle);
        Vec2::new(rel.dot(dir), rel.dot(dir.perp()))
    }

    #[inline]
    fn local_distance(&self, local: Vec2) -> f32 {
        sd_tapered_capsule(local, self.base_radius, self.end_radius, self.length)
    }

    /// Signed distance from a world point to the flipper surface
    pub fn distance(&self, p: Vec2, angle: f32) -> f32 {
        self.local_distance(self.to_local(p, angle))
    }

    /// Outward surface normal nearest to `p`, in world space
    fn normal_at(&self, p: Vec2, angle: f32) -> Vec2 {
        let local = self.to_local(p, angle);
        let g = sdf_gradient(local, |q| self.local_distance(q));
        let dir = direction(angle);
        (dir * g.x + dir.perp() * g.y).normalize_or_zero()
    }

    fn state<'a>(&self, mechanisms: &'a Mechanisms) -> Option<&'a FlipperState> {
        mechanisms.flippers.get(self.mechanism.index()).filter(|s| s.enabled)
    }

    pub fn hit_test(
        &self,
        ball: &Ball,
        dtime: f32,
        target: HitTarget,
        mechanisms: &Mechanisms,
    ) -> Option<CollisionEvent> {
        let state = self.state(mechanisms)?;
        let z = ball.position.z;
        if z + ball.radius < self.z_low || z - ball.radius > self.z_high {
            return None;
        }

        let start = ball.position.truncate();
        let vel = ball.velocity.truncate();
        let distance_at = |t: f32| self.distance(start + vel * t, state.angle_at(t)) - ball.radius;

        let bnd = distance_at(0.0);
        let (touch, hit_time) = if bnd <= PHYS_TOUCH {
            let omega = state.angular_velocity;
            let bnv = self.relative_normal_velocity(start, vel, state.angle, omega);
            let touch = classify_touch(bnv, bnd, ball.radius, dtime)?;
            let t = match touch {
                Touch::Impact(t) => t,
                Touch::Contact => 0.0,
            };
            (touch, t)
        } else {
            let t = first_crossing(dtime, distance_at)?;
            (Touch::Impact(t), t)
        };

        let p = start + vel * hit_time;
        let angle = state.angle_at(hit_time);
        let normal = self.normal_at(p, angle);
        if normal == Vec2::ZERO {
            return None;
        }
        let bnv = self.relative_normal_velocity(p, vel, angle, state.angular_velocity);
        if matches!(touch, Touch::Impact(_)) && bnv > LOW_NORM_VEL && bnd > 0.0 {
            // Grazing: the surfaces meet while already separating
            return None;
        }
        Some(touch_event(touch, target, normal.extend(0.0), bnd, bnv))
    }

    /// Normal velocity of the ball relative to the flipper surface nearest to it
    fn relative_normal_velocity(&self, p: Vec2, vel: Vec2, angle: f32, omega: f32) -> f32 {
        let normal = self.normal_at(p, angle);
        let surface = p - normal * (self.distance(p, angle));
        (vel - rotation_velocity(omega, surface - self.pivot)).dot(normal)
    }

    pub(crate) fn collide(
        &self,
        header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        ctx: &mut ResolveContext<'_>,
    ) {
        let Ok(state) = ctx.mechanisms.flipper_mut(self.mechanism) else {
            return;
        };
        let normal = hit.hit_normal.truncate();
        let r = ball.position.truncate() - normal * ball.radius - self.pivot;
        let surf_vel = rotation_velocity(state.angular_velocity, r);
        let v_rel = ball.velocity.truncate() - surf_vel;
        let Some(bnv) = Ball::approach_speed(v_rel.dot(normal), hit.hit_distance) else {
            return;
        };
        ball.correct_embedding(hit.hit_normal, hit.hit_distance);

        let elasticity = header.material.elasticity_at(bnv);
        // Angular lever of the impulse about the pivot
        let rxn = r.perp_dot(normal);
        let mut ang_resp = rxn * rxn / state.inertia;
        if state.is_blocked(-rxn) {
            ang_resp = 0.0;
        }
        let impulse = -(1.0 + elasticity) * bnv / (ball.inv_mass + ang_resp);
        ball.velocity += hit.hit_normal * (impulse * ball.inv_mass);
        if ang_resp > 0.0 {
            state.apply_angular_impulse(-impulse * rxn);
        }

        // Friction against the moving surface
        let friction = header.material.friction;
        let surf_p = -ball.radius * hit.hit_normal;
        let slip_vel = ball.surface_velocity(surf_p) - surf_vel.extend(0.0);
        let slip = slip_vel - slip_vel.dot(hit.hit_normal) * hit.hit_normal;
        let slip_speed = slip.length();
        if friction > 0.0 && slip_speed > PRECISION {
            let slip_dir = slip / slip_speed;
            let cp = surf_p.cross(slip_dir);
            let denom = ball.inv_mass + slip_dir.dot((cp / ball.inertia()).cross(surf_p));
            let fric = (-slip_speed / denom).clamp(-friction * impulse, 0.0);
            if fric.is_finite() {
                ball.apply_surface_impulse(cp * fric, slip_dir * fric);
            }
        }

        if header.fire_events && state.should_fire_collide(ctx.time_ms) {
            ctx.events
                .emit(EventKind::FlipperCollide, header.item, Some(-bnv), header.is_group_event);
        }
    }

    /// Resting contact: the ball's weight loads the flipper
    pub(crate) fn contact(
        &self,
        header: &ColliderHeader,
        ball: &mut Ball,
        hit: &CollisionEvent,
        dtime: f32,
        ctx: &mut ResolveContext<'_>,
    ) {
        let gravity = ctx.settings.gravity;
        let Ok(state) = ctx.mechanisms.flipper_mut(self.mechanism) else {
            return;
        };
        let normal = hit.hit_normal.truncate();
        let r = ball.position.truncate() - normal * ball.radius - self.pivot;
        let v_rel = ball.velocity.truncate() - rotation_velocity(state.angular_velocity, r);
        if v_rel.dot(normal) > CONTACT_VEL {
            return;
        }
        let weight = gravity.dot(hit.hit_normal) * ball.mass;
        let normal_force = (-(weight * dtime + hit.hit_org_normal_velocity)).max(0.0);
        ball.velocity += hit.hit_normal * normal_force;
        state.apply_angular_impulse(-normal_force * ball.mass * r.perp_dot(normal));
        ball.apply_friction(hit.hit_normal, dtime, header.material.friction, gravity);
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec3;

    use super::*;
    use crate::physics::collider::ColliderShape;
    use crate::physics::collider::test_support::{Harness, baked};
    use crate::physics::material::PhysicsMaterial;
    use crate::physics::{BallId, ItemId};

    /// Flipper pointing along +x, free to swing toward +y
    fn setup(omega: f32) -> (Harness, crate::physics::collider::Collider) {
        let mut harness = Harness::new();
        let mut state =
            FlipperState::new(ItemId(1), FRAC_PI_2, FRAC_PI_2 + 1.0).with_inertia(1.0e9);
        state.angular_velocity = omega;
        state.angular_momentum = omega * state.inertia;
        let id = harness.mechanisms.add_flipper(state);
        let shape = ColliderShape::Flipper(FlipperHit::new(Vec2::ZERO, 15.0, 8.0, 100.0, id));
        let collider = baked(0, 1, shape)
            .with_material(PhysicsMaterial::bouncy(0.5))
            .with_events(0.0);
        (harness, collider)
    }

    #[test]
    fn test_distance_follows_angle() {
        let flipper = FlipperHit::new(Vec2::ZERO, 15.0, 8.0, 100.0, MechanismId(0));
        // Tip circle at (100, 0) when the flipper points along +x
        assert!((flipper.distance(Vec2::new(120.0, 0.0), FRAC_PI_2) - 12.0).abs() < 1e-3);
        // Same point after a quarter turn is far from the tip
        assert!(flipper.distance(Vec2::new(120.0, 0.0), std::f32::consts::PI) > 50.0);
    }

    #[test]
    fn test_swinging_flipper_finds_resting_ball() {
        let (harness, collider) = setup(1.0);
        let ball = Ball::new(BallId(0), Vec3::new(60.0, 40.0, 25.0), Vec3::ZERO);
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        assert!(!hit.is_contact);
        assert!(hit.hit_time > 0.03 && hit.hit_time < 0.1);
        assert!(hit.hit_normal.y > 0.9);
    }

    #[test]
    fn test_still_flipper_misses() {
        let (harness, collider) = setup(0.0);
        let ball = Ball::new(BallId(0), Vec3::new(60.0, 40.0, 25.0), Vec3::ZERO);
        assert!(collider.hit_test(&ball, 0.1, &harness.mechanisms).is_none());
    }

    #[test]
    fn test_swing_imparts_velocity() {
        let (mut harness, collider) = setup(1.0);
        let mut ball = Ball::new(BallId(0), Vec3::new(60.0, 40.0, 25.0), Vec3::ZERO);
        let hit = collider.hit_test(&ball, 0.1, &harness.mechanisms).unwrap();
        harness.mechanisms.flippers[0].update_displacements(hit.hit_time);
        collider.collide(&mut ball, &hit, &mut harness.ctx());

        // Surface speed at the contact is about 60; elasticity 0.5 gives ~90
        assert!(ball.velocity.y > 60.0);
        assert!(ball.velocity.y < 100.0);
        assert_eq!(harness.event_kinds(), vec![EventKind::FlipperCollide]);
    }
}
