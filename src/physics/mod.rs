//! Deterministic collision core
//!
//! Everything that touches a ball during a physics tick lives here:
//! - Fixed tick, variable sub-steps bounded by the earliest hit
//! - Seeded RNG only (per ball, per sub-step)
//! - Static colliders indexed once in a quad-tree, balls re-indexed every sub-step
//! - No rendering, input or game-rule dependencies

use serde::{Deserialize, Serialize};

pub mod aabb;
pub mod ball;
pub mod broad_phase;
pub mod collider;
pub mod contact;
pub mod event_queue;
pub mod hit;
pub mod kd_tree;
pub mod material;
pub mod mechanism;
pub mod narrow_phase;
pub mod quad_tree;
pub mod sdf;
pub mod world;

pub use aabb::Aabb;
pub use ball::Ball;
pub use broad_phase::Candidates;
pub use collider::{Collider, ColliderHeader, ColliderShape};
pub use event_queue::{EventKind, EventQueue, EventSender, PhysicsEvent};
pub use hit::{CollisionEvent, Contact, HitTarget};
pub use kd_tree::KdTree;
pub use material::PhysicsMaterial;
pub use mechanism::{
    DropTargetState, FlipperState, GateState, KickerState, Mechanisms, PlungerState, SpinnerState,
};
pub use narrow_phase::{AcceptAll, HitTestFilter};
pub use quad_tree::QuadTree;
pub use world::{PhysicsWorld, StepPhase, TableBake};

/// Ball handle, unique for the lifetime of a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BallId(pub u32);

/// Index into the baked collider table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderId(pub u32);

impl ColliderId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Table item (wall, bumper, trigger...) owning one or more colliders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Index into one of the mechanism state tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MechanismId(pub u32);

impl MechanismId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
