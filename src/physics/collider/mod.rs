//! Collider model
//!
//! A closed set of shapes behind one tagged enum. Narrow phase and resolution
//! dispatch with a single `match`, so there is no virtual call in the hot loop.
//!
//! Static shapes are pure geometry. Kinematic shapes (flipper, gate, spinner,
//! plunger, kicker) hold a [`MechanismId`](super::MechanismId) and read or
//! write the matching state in [`Mechanisms`].

use glam::Vec3;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::ball::Ball;
use super::event_queue::{EventKind, EventSender};
use super::hit::{CollisionEvent, HitTarget};
use super::material::PhysicsMaterial;
use super::mechanism::Mechanisms;
use super::{BallId, ColliderId, ItemId};
use crate::consts::{CONTACT_VEL, PHYS_TOUCH};
use crate::settings::PhysicsSettings;

pub mod ball_ball;
pub mod circle;
pub mod flipper;
pub mod gate;
pub mod kicker;
pub mod line;
pub mod line_z;
pub mod plane;
pub mod plunger;
pub mod point;
pub mod spinner;
pub mod triangle;
pub mod trigger;

pub use circle::{Bumper, HitCircle};
pub use flipper::FlipperHit;
pub use gate::GateHit;
pub use kicker::KickerCircle;
pub use line::{LineSegment, SlingshotLine};
pub use line_z::{HitLine3D, HitLineZ};
pub use plane::HitPlane;
pub use plunger::PlungerHit;
pub use point::HitPoint;
pub use spinner::SpinnerHit;
pub use triangle::HitTriangle;
pub use trigger::{TriggerCircle, TriggerLine};

/// Data shared by every collider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColliderHeader {
    /// Index into the collider table, assigned at bake
    pub id: ColliderId,
    /// Item this collider belongs to
    pub item: ItemId,
    pub material: PhysicsMaterial,
    /// Emit hit events
    pub fire_events: bool,
    /// Minimum impact speed for a hit event
    pub threshold: f32,
    /// Events are reported for the item's group
    pub is_group_event: bool,
    /// Bounds over the collider's full range of motion
    pub aabb: Aabb,
}

/// Collider geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColliderShape {
    Circle(HitCircle),
    Line(LineSegment),
    Line3D(HitLine3D),
    LineZ(HitLineZ),
    Plane(HitPlane),
    Point(HitPoint),
    Triangle(HitTriangle),
    Flipper(FlipperHit),
    Gate(GateHit),
    Spinner(SpinnerHit),
    Plunger(PlungerHit),
    KickerCircle(KickerCircle),
    TriggerCircle(TriggerCircle),
    TriggerLine(TriggerLine),
    Bumper(Bumper),
    SlingshotLine(SlingshotLine),
}

impl ColliderShape {
    /// Bounds of the shape over its full range of motion
    pub fn bounds(&self) -> Aabb {
        match self {
            ColliderShape::Circle(c) => c.bounds(),
            ColliderShape::Line(l) => l.bounds(),
            ColliderShape::Line3D(l) => l.bounds(),
            ColliderShape::LineZ(l) => l.bounds(),
            ColliderShape::Plane(p) => p.bounds(),
            ColliderShape::Point(p) => p.bounds(),
            ColliderShape::Triangle(t) => t.bounds(),
            ColliderShape::Flipper(f) => f.bounds(),
            ColliderShape::Gate(g) => g.bounds(),
            ColliderShape::Spinner(s) => s.bounds(),
            ColliderShape::Plunger(p) => p.bounds(),
            ColliderShape::KickerCircle(k) => k.bounds(),
            ColliderShape::TriggerCircle(t) => t.bounds(),
            ColliderShape::TriggerLine(t) => t.bounds(),
            ColliderShape::Bumper(b) => b.circle.bounds(),
            ColliderShape::SlingshotLine(s) => s.line.bounds(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ColliderShape::Circle(_) => "circle",
            ColliderShape::Line(_) => "line",
            ColliderShape::Line3D(_) => "line3d",
            ColliderShape::LineZ(_) => "line_z",
            ColliderShape::Plane(_) => "plane",
            ColliderShape::Point(_) => "point",
            ColliderShape::Triangle(_) => "triangle",
            ColliderShape::Flipper(_) => "flipper",
            ColliderShape::Gate(_) => "gate",
            ColliderShape::Spinner(_) => "spinner",
            ColliderShape::Plunger(_) => "plunger",
            ColliderShape::KickerCircle(_) => "kicker",
            ColliderShape::TriggerCircle(_) => "trigger_circle",
            ColliderShape::TriggerLine(_) => "trigger_line",
            ColliderShape::Bumper(_) => "bumper",
            ColliderShape::SlingshotLine(_) => "slingshot",
        }
    }
}

/// Mutable state available while resolving a hit
pub struct ResolveContext<'a> {
    pub mechanisms: &'a mut Mechanisms,
    pub events: &'a EventSender,
    pub settings: &'a PhysicsSettings,
    pub rng: &'a mut Pcg32,
    /// Simulation time in milliseconds
    pub time_ms: u64,
    /// Balls consumed by a draining kicker
    pub drained: &'a mut Vec<BallId>,
}

/// A collider: header plus geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collider {
    pub header: ColliderHeader,
    pub shape: ColliderShape,
}

impl Collider {
    /// Unbaked collider; the id is assigned when added to a table
    pub fn new(item: ItemId, shape: ColliderShape) -> Self {
        let aabb = shape.bounds();
        Self {
            header: ColliderHeader {
                id: ColliderId(u32::MAX),
                item,
                material: PhysicsMaterial::default(),
                fire_events: false,
                threshold: 0.0,
                is_group_event: false,
                aabb,
            },
            shape,
        }
    }

    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.header.material = material;
        self
    }

    /// Emit hit events for impacts at least `threshold` fast
    pub fn with_events(mut self, threshold: f32) -> Self {
        self.header.fire_events = true;
        self.header.threshold = threshold;
        self
    }

    pub fn grouped(mut self) -> Self {
        self.header.is_group_event = true;
        self
    }

    #[inline]
    pub fn id(&self) -> ColliderId {
        self.header.id
    }

    /// Shapes every ball is a candidate for, kept outside the quad-tree
    pub fn is_unbounded(&self) -> bool {
        matches!(self.shape, ColliderShape::Plane(_))
    }

    /// Earliest hit or resting contact within `dtime`
    pub fn hit_test(
        &self,
        ball: &Ball,
        dtime: f32,
        mechanisms: &Mechanisms,
    ) -> Option<CollisionEvent> {
        let target = HitTarget::Collider(self.header.id);
        match &self.shape {
            ColliderShape::Circle(c) => c.hit_test(ball, dtime, target),
            ColliderShape::Line(l) => l.hit_test(ball, dtime, target),
            ColliderShape::Line3D(l) => l.hit_test(ball, dtime, target),
            ColliderShape::LineZ(l) => l.hit_test(ball, dtime, target),
            ColliderShape::Plane(p) => p.hit_test(ball, dtime, target),
            ColliderShape::Point(p) => p.hit_test(ball, dtime, target),
            ColliderShape::Triangle(t) => t.hit_test(ball, dtime, target),
            ColliderShape::Flipper(f) => f.hit_test(ball, dtime, target, mechanisms),
            ColliderShape::Gate(g) => g.hit_test(ball, dtime, target, mechanisms),
            ColliderShape::Spinner(s) => s.hit_test(ball, dtime, target, mechanisms),
            ColliderShape::Plunger(p) => p.hit_test(ball, dtime, target, mechanisms),
            ColliderShape::KickerCircle(k) => k.hit_test(ball, dtime, &self.header, mechanisms),
            ColliderShape::TriggerCircle(t) => t.hit_test(ball, dtime, target, self.header.id),
            ColliderShape::TriggerLine(t) => t.hit_test(ball, dtime, target, self.header.id),
            ColliderShape::Bumper(b) => b.circle.hit_test(ball, dtime, target),
            ColliderShape::SlingshotLine(s) => s.line.hit_test(ball, dtime, target),
        }
    }

    /// Apply the response of an impact found by [`Collider::hit_test`]
    pub fn collide(&self, ball: &mut Ball, hit: &CollisionEvent, ctx: &mut ResolveContext<'_>) {
        let header = &self.header;
        match &self.shape {
            ColliderShape::Flipper(f) => f.collide(header, ball, hit, ctx),
            ColliderShape::Gate(g) => g.collide(header, ball, hit, ctx),
            ColliderShape::Spinner(s) => s.collide(header, ball, hit, ctx),
            ColliderShape::Plunger(p) => p.collide(header, ball, hit, ctx),
            ColliderShape::KickerCircle(k) => k.collide(header, ball, hit, ctx),
            ColliderShape::TriggerCircle(_) | ColliderShape::TriggerLine(_) => {
                trigger::collide(header, ball, hit, ctx)
            }
            ColliderShape::Bumper(b) => b.collide(header, ball, hit, ctx),
            ColliderShape::SlingshotLine(s) => s.collide(header, ball, hit, ctx),
            ColliderShape::Circle(_)
            | ColliderShape::Line(_)
            | ColliderShape::Line3D(_)
            | ColliderShape::LineZ(_)
            | ColliderShape::Plane(_)
            | ColliderShape::Point(_)
            | ColliderShape::Triangle(_) => {
                if let Some(dot) = wall_response(header, ball, hit, ctx) {
                    fire_hit_event(header, ball, dot, ctx);
                }
            }
        }
    }

    /// Resolve a resting contact over `dtime`
    pub fn contact(
        &self,
        ball: &mut Ball,
        hit: &CollisionEvent,
        dtime: f32,
        ctx: &mut ResolveContext<'_>,
    ) {
        match &self.shape {
            ColliderShape::Flipper(f) => f.contact(&self.header, ball, hit, dtime, ctx),
            _ => {
                let friction = self.header.material.friction;
                ball.handle_static_contact(hit, friction, dtime, ctx.settings.gravity)
            }
        }
    }
}

/// How a rigid surface is touched at the start of a sub-step
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Touch {
    Contact,
    Impact(f32),
}

/// Classify a rigid surface touch from normal velocity `bnv` and surface distance `bnd`.
///
/// Timed impacts assume straight-line approach to an infinite surface; shapes
/// with curvature solve their own time and only use the touching branch.
pub(crate) fn classify_touch(bnv: f32, bnd: f32, max_depth: f32, dtime: f32) -> Option<Touch> {
    if bnv > CONTACT_VEL || bnd < -max_depth {
        return None;
    }
    if bnv.abs() <= CONTACT_VEL {
        if bnd.abs() <= PHYS_TOUCH {
            return Some(Touch::Contact);
        }
        // Slow but embedded
        return (bnd < 0.0).then_some(Touch::Impact(0.0));
    }
    let t = if bnd <= 0.0 { 0.0 } else { bnd / -bnv };
    (t.is_finite() && t <= dtime).then_some(Touch::Impact(t))
}

/// Build the event for a classified touch
pub(crate) fn touch_event(
    touch: Touch,
    target: HitTarget,
    normal: Vec3,
    bnd: f32,
    bnv: f32,
) -> CollisionEvent {
    match touch {
        Touch::Contact => CollisionEvent::contact(target, normal, bnd, bnv),
        Touch::Impact(t) => {
            CollisionEvent::impact(target, t, normal, bnd).with_normal_velocity(bnv)
        }
    }
}

/// Rigid wall response with the collider's material. Drops a drop target on a
/// hard enough impact. Returns the incoming normal velocity.
pub(crate) fn wall_response(
    header: &ColliderHeader,
    ball: &mut Ball,
    hit: &CollisionEvent,
    ctx: &mut ResolveContext<'_>,
) -> Option<f32> {
    let scatter = ctx.settings.scatter_for(header.material.scatter_angle);
    let dot = ball.collide_3d_wall(hit, &header.material, scatter, ctx.rng)?;
    if -dot >= header.threshold {
        ctx.mechanisms.drop_item(header.item, ctx.events);
    }
    Some(dot)
}

/// Hit event for an impact of normal velocity `dot`, suppressed while the
/// ball stays near the previous event position
pub(crate) fn fire_hit_event(
    header: &ColliderHeader,
    ball: &mut Ball,
    dot: f32,
    ctx: &ResolveContext<'_>,
) {
    fire_event_kind(EventKind::Hit, header, ball, dot, ctx);
}

pub(crate) fn fire_event_kind(
    kind: EventKind,
    header: &ColliderHeader,
    ball: &mut Ball,
    dot: f32,
    ctx: &ResolveContext<'_>,
) -> bool {
    if !header.fire_events || -dot < header.threshold || !ball.moved_since_last_event() {
        return false;
    }
    ball.last_event_pos = ball.position;
    ctx.events.emit(kind, header.item, None, header.is_group_event);
    true
}
