//! Ball state and the per-ball response math
//!
//! The wall response is shared by every rigid collider:
//! - Embedded balls are pushed out along the normal and shot free
//! - Elasticity drops with impact speed (falloff)
//! - Friction is a Coulomb-bounded impulse at the contact point, spinning the ball
//! - Scatter rotates the outgoing XY velocity by a quadratic-distributed angle

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::hit::CollisionEvent;
use super::material::PhysicsMaterial;
use super::{BallId, ColliderId, ItemId};
use crate::consts::*;

/// Spread factor of the scatter distribution, peaks at `1/sqrt(3)`
const SCATTER_SPREAD: f32 = 2.598_076;

/// A ball
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: BallId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub mass: f32,
    pub inv_mass: f32,
    pub angular_momentum: Vec3,
    pub angular_velocity: Vec3,
    /// Held in place (kicker capture); skipped by both phases
    pub frozen: bool,
    /// Swept bounds for the current sub-step
    pub aabb: Aabb,
    /// Squared radius of the swept sphere enclosed by `aabb`
    pub hit_radius_sqr: f32,
    /// Switch and kicker colliders the ball is currently inside, with their item
    #[serde(default)]
    pub inside_volumes: Vec<(ItemId, ColliderId)>,
    /// Position of the last hit event, used to suppress repeats
    pub last_event_pos: Vec3,
}

impl Ball {
    pub fn new(id: BallId, position: Vec3, velocity: Vec3) -> Self {
        Self::with_size(id, position, velocity, BALL_RADIUS, BALL_MASS)
    }

    pub fn with_size(id: BallId, position: Vec3, velocity: Vec3, radius: f32, mass: f32) -> Self {
        let mut ball = Self {
            id,
            position,
            velocity,
            radius,
            mass,
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            angular_momentum: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            frozen: false,
            aabb: Aabb::EMPTY,
            hit_radius_sqr: 0.0,
            inside_volumes: Vec::new(),
            last_event_pos: Vec3::splat(f32::MAX),
        };
        ball.update_aabb();
        ball
    }

    /// Solid sphere moment of inertia
    #[inline]
    pub fn inertia(&self) -> f32 {
        0.4 * self.mass * self.radius * self.radius
    }

    /// Radius of the sphere the ball can reach within one frame
    #[inline]
    pub fn hit_radius(&self) -> f32 {
        self.hit_radius_sqr.sqrt()
    }

    /// Recompute the swept bounds from the current position and speed.
    /// One frame of travel covers any sub-step.
    pub fn update_aabb(&mut self) {
        let reach = self.velocity.length() + self.radius + PHYS_SKIN;
        self.hit_radius_sqr = reach * reach;
        self.aabb = Aabb::from_sphere(self.position, reach);
    }

    /// Inside any volume of `item`
    pub fn is_inside(&self, item: ItemId) -> bool {
        self.inside_volumes.iter().any(|&(i, _)| i == item)
    }

    /// Inside the volume of this one collider
    pub fn is_inside_collider(&self, collider: ColliderId) -> bool {
        self.inside_volumes.iter().any(|&(_, c)| c == collider)
    }

    /// Record entering a collider's volume; returns true only for the first
    /// volume of its item
    pub fn enter_volume(&mut self, item: ItemId, collider: ColliderId) -> bool {
        if self.is_inside_collider(collider) {
            return false;
        }
        let first = !self.is_inside(item);
        self.inside_volumes.push((item, collider));
        first
    }

    /// Record leaving a collider's volume; returns true only when it was the
    /// last volume of its item
    pub fn leave_volume(&mut self, item: ItemId, collider: ColliderId) -> bool {
        let before = self.inside_volumes.len();
        self.inside_volumes.retain(|&(_, c)| c != collider);
        before != self.inside_volumes.len() && !self.is_inside(item)
    }

    /// Whether the ball moved far enough from the last event position to fire again
    pub fn moved_since_last_event(&self) -> bool {
        (self.position - self.last_event_pos).length_squared() > EVENT_MIN_DIST_SQR
    }

    /// Velocity of a surface point given relative to the center
    #[inline]
    pub fn surface_velocity(&self, surf_p: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(surf_p)
    }

    /// Acceleration of a surface point under gravity and spin
    #[inline]
    pub fn surface_acceleration(&self, surf_p: Vec3, gravity: Vec3) -> Vec3 {
        gravity + self.angular_velocity.cross(self.angular_velocity.cross(surf_p))
    }

    /// Apply a linear impulse and an angular impulse
    pub fn apply_surface_impulse(&mut self, rot_impulse: Vec3, impulse: Vec3) {
        self.velocity += impulse * self.inv_mass;
        self.angular_momentum += rot_impulse;
        let inertia = self.inertia();
        if inertia > 0.0 {
            self.angular_velocity = self.angular_momentum / inertia;
        }
    }

    /// Free flight over `dtime`
    pub fn update_displacements(&mut self, dtime: f32) {
        if self.frozen {
            return;
        }
        self.position += self.velocity * dtime;
    }

    /// Per-tick velocity update
    pub fn update_velocities(&mut self, gravity: Vec3) {
        if self.frozen {
            return;
        }
        self.velocity += gravity * TICK_TIME;
    }

    /// Push an embedded ball out along `normal`
    pub(crate) fn correct_embedding(&mut self, normal: Vec3, hit_distance: f32) {
        let push = -DISP_GAIN * hit_distance;
        if push > 1.0e-4 {
            self.position += normal * push.min(DISP_LIMIT);
        }
    }

    /// Normal velocity into the surface, or `None` if the ball leaves it.
    /// Slow embedded balls get a small shot so they come free.
    pub(crate) fn approach_speed(dot: f32, hit_distance: f32) -> Option<f32> {
        if dot >= -LOW_NORM_VEL {
            if dot > LOW_NORM_VEL || hit_distance >= -EMBEDDED {
                return None;
            }
            return Some(-EMBED_SHOT);
        }
        Some(dot)
    }

    /// Rigid wall response. Returns the incoming normal velocity, `None` if receding.
    pub fn collide_3d_wall(
        &mut self,
        hit: &CollisionEvent,
        material: &PhysicsMaterial,
        scatter_angle: f32,
        rng: &mut Pcg32,
    ) -> Option<f32> {
        let normal = hit.hit_normal;
        let dot = Self::approach_speed(self.velocity.dot(normal), hit.hit_distance)?;

        self.correct_embedding(normal, hit.hit_distance);

        let elasticity = material.elasticity_at(dot);
        let reaction_impulse = self.mass * -dot * (1.0 + elasticity);

        let surf_p = -self.radius * normal;
        let surf_vel = self.surface_velocity(surf_p);
        let slip = surf_vel - surf_vel.dot(normal) * normal;
        let slip_speed = slip.length();

        let mut impulse = normal * reaction_impulse;
        let mut rot_impulse = Vec3::ZERO;
        if slip_speed > PRECISION && material.friction > 0.0 {
            let slip_dir = slip / slip_speed;
            let cp = surf_p.cross(slip_dir);
            let denom = self.inv_mass + slip_dir.dot((cp / self.inertia()).cross(surf_p));
            let max_fric = material.friction * reaction_impulse;
            let fric = (-slip_speed / denom).clamp(-max_fric, 0.0);
            if fric.is_finite() {
                impulse += slip_dir * fric;
                rot_impulse = cp * fric;
            }
        }
        self.apply_surface_impulse(rot_impulse, impulse);

        let out_dot = self.velocity.dot(normal);
        if out_dot > 1.0 && scatter_angle > 1.0e-5 {
            let s: f32 = rng.random_range(-1.0..=1.0);
            let angle = s * (1.0 - s * s) * SCATTER_SPREAD * scatter_angle;
            let (sin, cos) = angle.sin_cos();
            let (vx, vy) = (self.velocity.x, self.velocity.y);
            self.velocity.x = vx * cos - vy * sin;
            self.velocity.y = vy * cos + vx * sin;
        }
        Some(dot)
    }

    /// Resting contact: cancel the approach velocity and the gravity of the sub-step,
    /// then apply friction
    pub fn handle_static_contact(
        &mut self,
        hit: &CollisionEvent,
        friction: f32,
        dtime: f32,
        gravity: Vec3,
    ) {
        let normal_vel = self.velocity.dot(hit.hit_normal);
        // A collision earlier in the sub-step may already have moved us off
        if normal_vel > CONTACT_VEL {
            return;
        }
        let fe = gravity * self.mass;
        let dot = fe.dot(hit.hit_normal);
        let normal_force = (-(dot * dtime + hit.hit_org_normal_velocity)).max(0.0);
        self.velocity += hit.hit_normal * normal_force;
        self.apply_friction(hit.hit_normal, dtime, friction, gravity);
    }

    /// Static or dynamic friction against a surface with normal `normal`
    pub fn apply_friction(&mut self, normal: Vec3, dtime: f32, fric_coeff: f32, gravity: Vec3) {
        let surf_p = -self.radius * normal;
        let surf_vel = self.surface_velocity(surf_p);
        let slip = surf_vel - surf_vel.dot(normal) * normal;
        let max_fric = fric_coeff * self.mass * -gravity.dot(normal);
        let slip_speed = slip.length();

        let (slip_dir, numer) = if slip_speed < PRECISION {
            let surf_acc = self.surface_acceleration(surf_p, gravity);
            let slip_acc = surf_acc - surf_acc.dot(normal) * normal;
            if slip_acc.length_squared() < 1.0e-6 {
                return;
            }
            let slip_dir = slip_acc.normalize();
            (slip_dir, -slip_dir.dot(surf_acc))
        } else {
            let slip_dir = slip / slip_speed;
            (slip_dir, -slip_dir.dot(surf_vel))
        };

        let cp = surf_p.cross(slip_dir);
        let denom = self.inv_mass + slip_dir.dot((cp / self.inertia()).cross(surf_p));
        let fric = (numer / denom).clamp(-max_fric.abs(), max_fric.abs());
        if fric.is_finite() {
            self.apply_surface_impulse(cp * (dtime * fric), slip_dir * (dtime * fric));
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::physics::ColliderId;
    use crate::physics::hit::HitTarget;

    fn floor_hit(distance: f32) -> CollisionEvent {
        CollisionEvent::impact(HitTarget::Collider(ColliderId(0)), 0.0, Vec3::Z, distance)
    }

    #[test]
    fn test_aabb_encloses_sphere() {
        let mut ball = Ball::new(BallId(0), Vec3::new(10.0, 20.0, 25.0), Vec3::new(3.0, -4.0, 0.0));
        ball.update_aabb();
        assert!(ball.aabb.encloses_sphere(ball.position, ball.radius));
        assert!((ball.hit_radius() - (5.0 + BALL_RADIUS + PHYS_SKIN)).abs() < 1e-4);
    }

    #[test]
    fn test_wall_bounce_halves_with_elasticity() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(0.0, 0.0, -5.0));
        let material = PhysicsMaterial::bouncy(0.5);
        let dot = ball.collide_3d_wall(&floor_hit(0.0), &material, 0.0, &mut rng);
        assert_eq!(dot, Some(-5.0));
        assert!((ball.velocity.z - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_receding_ball_untouched() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(0.0, 0.0, 2.0));
        let material = PhysicsMaterial::bouncy(0.5);
        let dot = ball.collide_3d_wall(&floor_hit(0.0), &material, 0.0, &mut rng);
        assert!(dot.is_none());
        assert_eq!(ball.velocity, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_embedded_ball_pushed_out() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 24.0), Vec3::ZERO);
        let material = PhysicsMaterial::bouncy(0.5);
        let dot = ball.collide_3d_wall(&floor_hit(-1.0), &material, 0.0, &mut rng);
        assert_eq!(dot, Some(-EMBED_SHOT));
        assert!((ball.position.z - (24.0 + DISP_GAIN)).abs() < 1e-4);
        assert!(ball.velocity.z > 0.0);
    }

    #[test]
    fn test_friction_spins_sliding_ball() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(4.0, 0.0, -3.0));
        ball.collide_3d_wall(&floor_hit(0.0), &PhysicsMaterial::new(0.5, 0.5), 0.0, &mut rng);
        assert!(ball.velocity.x < 4.0);
        assert!(ball.angular_velocity.y > 0.0);
        // Friction never reverses the slip
        let slip = ball.surface_velocity(-ball.radius * Vec3::Z);
        assert!(slip.x >= -1e-3);
    }

    #[test]
    fn test_scatter_keeps_xy_speed() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(3.0, 1.0, -6.0));
        ball.collide_3d_wall(&floor_hit(0.0), &PhysicsMaterial::bouncy(1.0), 0.3, &mut rng);
        let xy = ball.velocity.truncate().length();
        assert!((xy - 10.0_f32.sqrt()).abs() < 1e-4);
        assert!((ball.velocity.z - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_static_contact_cancels_gravity() {
        let gravity = Vec3::new(0.0, 0.0, -GRAVITY);
        let mut ball = Ball::new(BallId(0), Vec3::new(0.0, 0.0, 25.0), Vec3::new(0.0, 0.0, -0.05));
        let hit = CollisionEvent::contact(HitTarget::Collider(ColliderId(0)), Vec3::Z, 0.0, -0.05);
        ball.handle_static_contact(&hit, 0.3, TICK_TIME, gravity);
        ball.update_velocities(gravity);
        assert!(ball.velocity.z.abs() < 1e-5);
    }

    #[test]
    fn test_volume_membership() {
        let mut ball = Ball::new(BallId(0), Vec3::ZERO, Vec3::ZERO);
        assert!(ball.enter_volume(ItemId(2), ColliderId(4)));
        assert!(!ball.enter_volume(ItemId(2), ColliderId(4)));
        assert!(ball.is_inside(ItemId(2)));
        assert!(ball.leave_volume(ItemId(2), ColliderId(4)));
        assert!(!ball.leave_volume(ItemId(2), ColliderId(4)));
    }

    #[test]
    fn test_item_membership_spans_its_colliders() {
        let mut ball = Ball::new(BallId(0), Vec3::ZERO, Vec3::ZERO);
        assert!(ball.enter_volume(ItemId(3), ColliderId(0)));
        // Second volume of the same item: no new entry
        assert!(!ball.enter_volume(ItemId(3), ColliderId(1)));
        assert!(ball.is_inside_collider(ColliderId(1)));

        assert!(!ball.leave_volume(ItemId(3), ColliderId(0)));
        assert!(ball.is_inside(ItemId(3)));
        assert!(ball.leave_volume(ItemId(3), ColliderId(1)));
        assert!(!ball.is_inside(ItemId(3)));
    }
}
