//! Narrow-phase results

use glam::Vec3;

use super::{BallId, ColliderId};

/// What a ball hit: a collider or another ball, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Collider(ColliderId),
    Ball(BallId),
}

/// Result of a single hit test, recomputed every sub-step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Time of impact relative to the sub-step start (0 for contacts and embedded hits)
    pub hit_time: f32,
    /// Unit normal pointing from the surface toward the ball
    pub hit_normal: Vec3,
    /// Distance between ball surface and collider at the start of the sub-step
    pub hit_distance: f32,
    /// Normal velocity at test time (relative to the surface)
    pub hit_org_normal_velocity: f32,
    /// Resting touch instead of an impact
    pub is_contact: bool,
    /// Collider-specific flag: back face for gates/spinners, entry for switch volumes
    pub hit_flag: bool,
    pub target: HitTarget,
}

impl CollisionEvent {
    /// Impact at `hit_time`
    pub fn impact(target: HitTarget, hit_time: f32, hit_normal: Vec3, hit_distance: f32) -> Self {
        Self {
            hit_time,
            hit_normal,
            hit_distance,
            hit_org_normal_velocity: 0.0,
            is_contact: false,
            hit_flag: false,
            target,
        }
    }

    /// Resting contact, valid for the whole sub-step
    pub fn contact(
        target: HitTarget,
        hit_normal: Vec3,
        hit_distance: f32,
        normal_velocity: f32,
    ) -> Self {
        Self {
            hit_time: 0.0,
            hit_normal,
            hit_distance,
            hit_org_normal_velocity: normal_velocity,
            is_contact: true,
            hit_flag: false,
            target,
        }
    }

    pub fn with_flag(mut self, flag: bool) -> Self {
        self.hit_flag = flag;
        self
    }

    pub fn with_normal_velocity(mut self, normal_velocity: f32) -> Self {
        self.hit_org_normal_velocity = normal_velocity;
        self
    }

    /// Impact time inside `[0, max_time]`; NaN and negative times fail
    #[inline]
    pub fn is_valid_impact(&self, max_time: f32) -> bool {
        !self.is_contact
            && self.hit_time.is_finite()
            && self.hit_time >= 0.0
            && self.hit_time <= max_time
    }
}

/// Resting touch recorded during narrow phase and resolved after impacts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub ball: BallId,
    pub event: CollisionEvent,
}
