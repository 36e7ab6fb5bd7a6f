//! Vertical cylinders: posts, round walls and bumpers

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::{
    ColliderHeader, ResolveContext, Touch, classify_touch, fire_hit_event, touch_event,
    wall_response,
};
use crate::consts::PHYS_TOUCH;
use crate::physics::aabb::Aabb;
use crate::physics::ball::Ball;
use crate::physics::hit::{CollisionEvent, HitTarget};
use crate::{first_root, solve_quadratic};

/// Moving sphere as seen by a hit test, possibly in a collider's local frame
#[derive(Debug, Clone, Copy)]
pub(crate) struct MovingSphere {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
}

impl From<&Ball> for MovingSphere {
    fn from(ball: &Ball) -> Self {
        Self {
            position: ball.position,
            velocity: ball.velocity,
            radius: ball.radius,
        }
    }
}

/// Hit test against the outside of a vertical cylinder.
///
/// `z_slack` widens the z range at the hit point; caps are not tested.
pub(crate) fn cylinder_hit_test(
    center: Vec2,
    radius: f32,
    z_range: (f32, f32),
    z_slack: f32,
    ball: MovingSphere,
    dtime: f32,
    target: HitTarget,
) -> Option<CollisionEvent> {
    let d = ball.position.truncate() - center;
    let dv = ball.velocity.truncate();
    let bcdd_sqr = d.length_squared();
    let bcdd = bcdd_sqr.sqrt();
    if bcdd < 1.0e-6 {
        // Center on the axis, no usable normal
        return None;
    }
    let target_radius = radius + ball.radius;
    let b = dv.dot(d);
    let bnv = b / bcdd;
    let bnd = bcdd - target_radius;

    let touch = if bnd <= PHYS_TOUCH {
        classify_touch(bnv, bnd, 2.0 * ball.radius, dtime)?
    } else {
        let a = dv.length_squared();
        if a < 1.0e-8 || bnv >= 0.0 {
            return None;
        }
        let (t1, t2) = solve_quadratic(a, 2.0 * b, bcdd_sqr - target_radius * target_radius)?;
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

    let hit_z = ball.position.z + ball.velocity.z * hit_time;
    if hit_z + z_slack < z_range.0 || hit_z - z_slack > z_range.1 {
        return None;
    }

    let normal = (d + dv * hit_time).normalize_or_zero().extend(0.0);
    if normal == Vec3::ZERO {
        return None;
    }
    Some(touch_event(touch, target, normal, bnd, bnv))
}

/// Vertical cylinder
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HitCircle {
    pub center: Vec2,
    pub radius: f32,
    pub z_low: f32,
    pub z_high: f32,
}

impl HitCircle {
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

    pub fn hit_test(&self, ball: &Ball, dtime: f32, target: HitTarget) -> Option<CollisionEvent> {
        cylinder_hit_test(
            self.center,
            self.radius,
            (self.z_low, self.z_high),
            ball.radius * 0.5,
            MovingSphere::from(ball),
            dtime,
            target,
        )
    }
}

/// Pop bumper: a cylinder that kicks the ball away on a hard enough hit
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bumper {
    pub circle: HitCircle,
    /// Speed added along the hit normal
    pub force: f32,
}

impl Bumper {
    pub fn new(circle: HitCircle, force: f32) -> Self {
        Self { circle, force }
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
        if -dot >= header.threshold {
            ball.velocity += hit.hit_normal * self.force;
            fire_hit_event(header, ball, dot, ctx);
        }
    }
}
