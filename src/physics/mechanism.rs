//! Mutable state of kinematic table parts
//!
//! Colliders only carry geometry and a [`MechanismId`]. Angles, speeds and
//! capture state live here and are passed by reference into hit tests
//! (read-only, may run in parallel) and resolution (mutable, single-threaded).

use std::collections::HashSet;
use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use super::event_queue::{EventKind, EventSender};
use super::{BallId, ItemId, MechanismId};
use crate::consts::{FLIPPER_EVENT_INTERVAL_MS, TICK_TIME};
use crate::error::{PhysicsError, Result};

/// Angles closer than this count as sitting on a stop
const STOP_TOLERANCE: f32 = 1.0e-5;

/// Flipper state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipperState {
    pub item: ItemId,
    /// Current angle in radians (0 points up the table, positive is clockwise)
    pub angle: f32,
    pub angular_velocity: f32,
    pub angular_momentum: f32,
    /// Rest angle
    pub start_angle: f32,
    /// Fully raised angle
    pub end_angle: f32,
    pub inertia: f32,
    /// Solenoid torque while energized
    pub strength: f32,
    /// Fraction of `strength` pulling the flipper back down
    pub return_ratio: f32,
    /// Solenoid energized
    pub solenoid: bool,
    pub enabled: bool,
    #[serde(default)]
    pub last_collide_ms: Option<u64>,
}

impl FlipperState {
    pub fn new(item: ItemId, start_angle: f32, end_angle: f32) -> Self {
        Self {
            item,
            angle: start_angle,
            angular_velocity: 0.0,
            angular_momentum: 0.0,
            start_angle,
            end_angle,
            inertia: 2_000.0,
            strength: 2_200.0,
            return_ratio: 0.058,
            solenoid: false,
            enabled: true,
            last_collide_ms: None,
        }
    }

    pub fn with_inertia(mut self, inertia: f32) -> Self {
        self.inertia = inertia;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    /// Lowest and highest reachable angle
    #[inline]
    pub fn angle_range(&self) -> (f32, f32) {
        (self.start_angle.min(self.end_angle), self.start_angle.max(self.end_angle))
    }

    /// Angle after `dt` of free rotation, clamped to the stops
    #[inline]
    pub fn angle_at(&self, dt: f32) -> f32 {
        let (lo, hi) = self.angle_range();
        (self.angle + self.angular_velocity * dt).clamp(lo, hi)
    }

    /// Whether the flipper rests on a stop and `direction` pushes further into it
    pub fn is_blocked(&self, direction: f32) -> bool {
        let (lo, hi) = self.angle_range();
        (direction > 0.0 && self.angle >= hi - STOP_TOLERANCE)
            || (direction < 0.0 && self.angle <= lo + STOP_TOLERANCE)
    }

    /// Add angular momentum, honoring the stops
    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        self.angular_momentum += impulse;
        if self.is_blocked(self.angular_momentum) {
            self.angular_momentum = 0.0;
        }
        self.angular_velocity = self.angular_momentum / self.inertia;
    }

    /// Time until the moving flipper reaches a stop
    pub fn time_to_stop(&self) -> Option<f32> {
        if !self.enabled || self.angular_velocity == 0.0 {
            return None;
        }
        let (lo, hi) = self.angle_range();
        let target = if self.angular_velocity > 0.0 { hi } else { lo };
        let t = (target - self.angle) / self.angular_velocity;
        (t.is_finite() && t >= 0.0).then_some(t)
    }

    /// Solenoid torque for one tick
    pub fn update_velocities(&mut self) {
        if !self.enabled {
            return;
        }
        let (toward, torque) = if self.solenoid {
            (self.end_angle - self.start_angle, self.strength)
        } else {
            (self.start_angle - self.end_angle, self.strength * self.return_ratio)
        };
        self.apply_angular_impulse(toward.signum() * torque * TICK_TIME);
    }

    /// Rotate by `dt`; arriving on a stop kills the motion
    pub fn update_displacements(&mut self, dt: f32) {
        if !self.enabled {
            return;
        }
        let (lo, hi) = self.angle_range();
        self.angle += self.angular_velocity * dt;
        if self.angle >= hi - STOP_TOLERANCE && self.angular_velocity > 0.0 {
            self.angle = hi;
            self.stop();
        } else if self.angle <= lo + STOP_TOLERANCE && self.angular_velocity < 0.0 {
            self.angle = lo;
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.angular_velocity = 0.0;
        self.angular_momentum = 0.0;
    }

    /// Rate limit for collide events
    pub fn should_fire_collide(&mut self, now_ms: u64) -> bool {
        match self.last_collide_ms {
            Some(last) if now_ms.saturating_sub(last) < FLIPPER_EVENT_INTERVAL_MS => false,
            _ => {
                self.last_collide_ms = Some(now_ms);
                true
            }
        }
    }
}

/// Gate state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateState {
    pub item: ItemId,
    /// 0 is closed, positive swings toward the back face
    pub angle: f32,
    pub angle_speed: f32,
    /// Widest open angle
    pub angle_max: f32,
    /// Per-tick speed retention
    pub damping: f32,
    /// Strength of the return swing
    pub gravity_factor: f32,
    /// Opens both ways
    pub two_way: bool,
    pub enabled: bool,
}

impl GateState {
    pub fn new(item: ItemId, two_way: bool) -> Self {
        Self {
            item,
            angle: 0.0,
            angle_speed: 0.0,
            angle_max: PI * 0.5,
            damping: 0.999,
            gravity_factor: 0.25,
            two_way,
            enabled: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.angle.abs() > 1.0e-3
    }

    pub fn update_velocities(&mut self) {
        self.angle_speed -= self.angle.sin() * self.gravity_factor * (TICK_TIME / 8.0);
        self.angle_speed *= self.damping;
    }

    pub fn update_displacements(&mut self, dt: f32) {
        self.angle += self.angle_speed * dt;
        let lo = if self.two_way { -self.angle_max } else { 0.0 };
        if self.angle > self.angle_max {
            self.angle = self.angle_max;
            self.angle_speed = self.angle_speed.min(0.0);
        } else if self.angle < lo {
            self.angle = lo;
            self.angle_speed = self.angle_speed.max(0.0);
        }
    }
}

/// Spinner state; angle 0 is the blade hanging down
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinnerState {
    pub item: ItemId,
    pub angle: f32,
    pub angle_speed: f32,
    pub damping: f32,
    pub enabled: bool,
}

impl SpinnerState {
    pub fn new(item: ItemId) -> Self {
        Self {
            item,
            angle: 0.0,
            angle_speed: 0.0,
            damping: 0.9879,
            enabled: true,
        }
    }

    pub fn update_velocities(&mut self) {
        self.angle_speed -= self.angle.sin() * 0.0025 * TICK_TIME;
        self.angle_speed *= self.damping;
    }

    /// Rotate by `dt`; a Spin event fires each time the blade passes over the top
    pub fn update_displacements(&mut self, dt: f32, events: &EventSender) {
        self.angle += self.angle_speed * dt;
        if self.angle > PI {
            self.angle -= TAU;
            events.emit(EventKind::Spin, self.item, None, false);
        } else if self.angle < -PI {
            self.angle += TAU;
            events.emit(EventKind::Spin, self.item, None, false);
        }
    }
}

/// Plunger state; the tip moves along +Y when pulled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlungerState {
    pub item: ItemId,
    /// Tip Y coordinate
    pub position: f32,
    /// Tip speed along Y
    pub speed: f32,
    /// Rest position of the tip
    pub park_position: f32,
    /// Fully pulled position of the tip
    pub stroke_end: f32,
    pub pull_speed: f32,
    /// Release speed from a full pull
    pub fire_speed: f32,
    pub enabled: bool,
}

impl PlungerState {
    pub fn new(item: ItemId, park_position: f32, stroke_end: f32) -> Self {
        Self {
            item,
            position: park_position,
            speed: 0.0,
            park_position,
            stroke_end,
            pull_speed: 5.0,
            fire_speed: 80.0,
            enabled: true,
        }
    }

    /// Start pulling back
    pub fn pull(&mut self) {
        self.speed = self.pull_speed;
    }

    /// Release; speed scales with how far the plunger was pulled
    pub fn fire(&mut self) {
        let stroke = self.stroke_end - self.park_position;
        let pulled = if stroke.abs() > f32::EPSILON {
            ((self.position - self.park_position) / stroke).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.speed = -self.fire_speed * pulled;
    }

    pub fn update_displacements(&mut self, dt: f32) {
        self.position += self.speed * dt;
        if self.speed > 0.0 && self.position >= self.stroke_end {
            self.position = self.stroke_end;
            self.speed = 0.0;
        } else if self.speed < 0.0 && self.position <= self.park_position {
            self.position = self.park_position;
            self.speed = 0.0;
        }
    }
}

/// Kicker state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickerState {
    pub item: ItemId,
    pub enabled: bool,
    /// Captured balls are destroyed instead of held
    pub drain: bool,
    pub captured: Option<BallId>,
}

impl KickerState {
    pub fn new(item: ItemId) -> Self {
        Self {
            item,
            enabled: true,
            drain: false,
            captured: None,
        }
    }
}

/// Drop target state; a dropped target's colliders are skipped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTargetState {
    pub item: ItemId,
    pub dropped: bool,
}

/// All mechanism state of a table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mechanisms {
    pub flippers: Vec<FlipperState>,
    pub gates: Vec<GateState>,
    pub spinners: Vec<SpinnerState>,
    pub plungers: Vec<PlungerState>,
    pub kickers: Vec<KickerState>,
    pub drop_targets: Vec<DropTargetState>,
    #[serde(default)]
    disabled_items: HashSet<ItemId>,
}

macro_rules! mechanism_accessors {
    ($get:ident, $get_mut:ident, $field:ident, $ty:ty, $kind:literal) => {
        pub fn $get(&self, id: MechanismId) -> Result<&$ty> {
            self.$field
                .get(id.index())
                .ok_or(PhysicsError::UnknownMechanism { kind: $kind, id })
        }

        pub fn $get_mut(&mut self, id: MechanismId) -> Result<&mut $ty> {
            self.$field
                .get_mut(id.index())
                .ok_or(PhysicsError::UnknownMechanism { kind: $kind, id })
        }
    };
}

impl Mechanisms {
    mechanism_accessors!(flipper, flipper_mut, flippers, FlipperState, "flipper");
    mechanism_accessors!(gate, gate_mut, gates, GateState, "gate");
    mechanism_accessors!(spinner, spinner_mut, spinners, SpinnerState, "spinner");
    mechanism_accessors!(plunger, plunger_mut, plungers, PlungerState, "plunger");
    mechanism_accessors!(kicker, kicker_mut, kickers, KickerState, "kicker");

    pub fn add_flipper(&mut self, state: FlipperState) -> MechanismId {
        self.flippers.push(state);
        MechanismId(self.flippers.len() as u32 - 1)
    }

    pub fn add_gate(&mut self, state: GateState) -> MechanismId {
        self.gates.push(state);
        MechanismId(self.gates.len() as u32 - 1)
    }

    pub fn add_spinner(&mut self, state: SpinnerState) -> MechanismId {
        self.spinners.push(state);
        MechanismId(self.spinners.len() as u32 - 1)
    }

    pub fn add_plunger(&mut self, state: PlungerState) -> MechanismId {
        self.plungers.push(state);
        MechanismId(self.plungers.len() as u32 - 1)
    }

    pub fn add_kicker(&mut self, state: KickerState) -> MechanismId {
        self.kickers.push(state);
        MechanismId(self.kickers.len() as u32 - 1)
    }

    /// Register an item as a drop target
    pub fn add_drop_target(&mut self, item: ItemId) {
        if self.drop_target(item).is_none() {
            self.drop_targets.push(DropTargetState { item, dropped: false });
        }
    }

    pub fn drop_target(&self, item: ItemId) -> Option<&DropTargetState> {
        self.drop_targets.iter().find(|t| t.item == item)
    }

    pub fn drop_target_mut(&mut self, item: ItemId) -> Option<&mut DropTargetState> {
        self.drop_targets.iter_mut().find(|t| t.item == item)
    }

    pub fn set_item_enabled(&mut self, item: ItemId, enabled: bool) {
        if enabled {
            self.disabled_items.remove(&item);
        } else {
            self.disabled_items.insert(item);
        }
    }

    /// Item neither disabled nor a dropped target
    pub fn is_item_active(&self, item: ItemId) -> bool {
        !self.disabled_items.contains(&item) && !self.drop_target(item).is_some_and(|t| t.dropped)
    }

    /// Drop a standing target; returns true if it was up
    pub fn drop_item(&mut self, item: ItemId, events: &EventSender) -> bool {
        match self.drop_target_mut(item) {
            Some(target) if !target.dropped => {
                target.dropped = true;
                events.emit(EventKind::TargetDropped, item, None, false);
                true
            }
            _ => false,
        }
    }

    /// Raise a dropped target; returns true if it was down
    pub fn raise_item(&mut self, item: ItemId, events: &EventSender) -> Result<bool> {
        let target = self.drop_target_mut(item).ok_or(PhysicsError::UnknownItem(item))?;
        if !target.dropped {
            return Ok(false);
        }
        target.dropped = false;
        events.emit(EventKind::TargetRaised, item, None, false);
        Ok(true)
    }

    /// Earliest flipper stop arrival, an extra sub-step boundary
    pub fn next_stop_time(&self) -> Option<f32> {
        self.flippers
            .iter()
            .filter_map(FlipperState::time_to_stop)
            .min_by(f32::total_cmp)
    }

    /// Per-tick velocity update of every mover
    pub fn update_velocities(&mut self) {
        for flipper in &mut self.flippers {
            flipper.update_velocities();
        }
        for gate in &mut self.gates {
            gate.update_velocities();
        }
        for spinner in &mut self.spinners {
            spinner.update_velocities();
        }
    }

    /// Per-sub-step displacement of every mover
    pub fn update_displacements(&mut self, dt: f32, events: &EventSender) {
        for flipper in &mut self.flippers {
            flipper.update_displacements(dt);
        }
        for gate in &mut self.gates {
            gate.update_displacements(dt);
        }
        for spinner in &mut self.spinners {
            spinner.update_displacements(dt, events);
        }
        for plunger in &mut self.plungers {
            plunger.update_displacements(dt);
        }
    }
}
