//! Step driver and world API
//!
//! One tick of `TICK_TIME` frames runs [`PhysicsWorld::simulate_cycle`], then
//! applies gravity and mechanism torques. A cycle is split into sub-steps,
//! each advancing to the earliest impact found by any ball:
//!
//! 1. Broad phase: refresh swept bounds, rebuild the ball kd-tree
//! 2. Narrow phase: earliest impact and resting contacts per ball (parallel)
//! 3. Displace every ball and mover to the impact time
//! 4. Resolve impacts, then contacts, then drained balls

use std::path::Path;

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::ball::Ball;
use super::broad_phase::{BroadPhase, Candidates};
use super::collider::{
    Collider, ColliderShape, HitLineZ, HitPlane, LineSegment, ResolveContext, ball_ball,
};
use super::contact::{pair_mut, resolve_contacts};
use super::event_queue::{EventQueue, EventSender, PhysicsEvent};
use super::hit::{CollisionEvent, Contact, HitTarget};
use super::material::PhysicsMaterial;
use super::mechanism::{
    FlipperState, GateState, KickerState, Mechanisms, PlungerState, SpinnerState,
};
use super::narrow_phase::{AcceptAll, BallHits, HitTestFilter, NarrowPhase};
use super::{BallId, ColliderId, ItemId, MechanismId};
use crate::consts::{STATIC_COUNTS, STATIC_TIME, TICK_TIME, TICKS_PER_MSEC};
use crate::error::{PhysicsError, Result};
use crate::settings::PhysicsSettings;

/// Item owning the playfield plane
pub const PLAYFIELD_ITEM: ItemId = ItemId(u32::MAX - 1);
/// Item owning the glass plane
pub const GLASS_ITEM: ItemId = ItemId(u32::MAX - 2);

/// Step driver state, observable between and during sub-steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepPhase {
    /// No cycle has run yet
    #[default]
    Idle,
    BroadPhase,
    NarrowPhase,
    Resolve,
    /// The last cycle consumed its full duration
    Drained,
}

/// Baked table: the collider table plus mechanism state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableBake {
    colliders: Vec<Collider>,
    pub mechanisms: Mechanisms,
    /// Union of the bounded colliders
    bounds: Aabb,
}

impl TableBake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a collider and assign its id
    pub fn add(&mut self, mut collider: Collider) -> ColliderId {
        let id = ColliderId(self.colliders.len() as u32);
        collider.header.id = id;
        if !collider.is_unbounded() {
            self.bounds = self.bounds.union(collider.header.aabb);
        }
        self.colliders.push(collider);
        id
    }

    /// Playfield plane at z = 0
    pub fn with_playfield(mut self, material: PhysicsMaterial) -> Self {
        let floor = Collider::new(PLAYFIELD_ITEM, ColliderShape::Plane(HitPlane::floor(0.0)));
        self.add(floor.with_material(material));
        self
    }

    /// Glass plane at `z`, facing down
    pub fn with_glass(mut self, z: f32, material: PhysicsMaterial) -> Self {
        let glass = Collider::new(GLASS_ITEM, ColliderShape::Plane(HitPlane::ceiling(z)));
        self.add(glass.with_material(material));
        self
    }

    /// Wall from `v1` to `v2` facing its right-hand side, with corner posts
    pub fn add_wall(
        &mut self,
        item: ItemId,
        v1: Vec2,
        v2: Vec2,
        height: f32,
        material: PhysicsMaterial,
    ) -> ColliderId {
        let line = Collider::new(item, ColliderShape::Line(LineSegment::new(v1, v2, 0.0, height)));
        let id = self.add(line.with_material(material));
        for corner in [v1, v2] {
            let post = ColliderShape::LineZ(HitLineZ::new(corner, 0.0, height));
            self.add(Collider::new(item, post).with_material(material));
        }
        id
    }

    pub fn add_flipper(&mut self, state: FlipperState) -> MechanismId {
        self.mechanisms.add_flipper(state)
    }

    pub fn add_gate(&mut self, state: GateState) -> MechanismId {
        self.mechanisms.add_gate(state)
    }

    pub fn add_spinner(&mut self, state: SpinnerState) -> MechanismId {
        self.mechanisms.add_spinner(state)
    }

    pub fn add_plunger(&mut self, state: PlungerState) -> MechanismId {
        self.mechanisms.add_plunger(state)
    }

    pub fn add_kicker(&mut self, state: KickerState) -> MechanismId {
        self.mechanisms.add_kicker(state)
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a baked table from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let bake = Self::from_json_str(&json)?;
        log::info!("Loaded table bake from {} ({} colliders)", path.as_ref().display(), bake.len());
        Ok(bake)
    }
}

/// Seed of the per-ball RNG streams of one sub-step
fn sub_step_seed(seed: u64, tick: u64, sub_step: u32) -> u64 {
    seed ^ tick.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ u64::from(sub_step).wrapping_mul(0xbf58_476d_1ce4_e5b9)
}

/// The collision core of one table
pub struct PhysicsWorld {
    colliders: Vec<Collider>,
    mechanisms: Mechanisms,
    bounds: Aabb,
    broad: BroadPhase,
    balls: Vec<Ball>,
    settings: PhysicsSettings,
    queue: EventQueue,
    events: EventSender,
    filter: Box<dyn HitTestFilter>,
    /// Narrow-phase scratch for the single-threaded path
    candidates: Candidates,
    /// Contact-order coin flips
    rng: Pcg32,
    phase: StepPhase,
    tick: u64,
    static_counts: i32,
    last_contacts: Vec<Contact>,
}

impl PhysicsWorld {
    pub fn new(bake: TableBake, settings: PhysicsSettings) -> Result<Self> {
        settings.validate()?;
        let broad = BroadPhase::new(&bake.colliders);
        let queue = EventQueue::new(settings.events_enabled);
        let events = queue.sender();
        log::info!(
            "Physics world ready: {} colliders ({} indexed), {} flippers, seed {:#x}",
            bake.colliders.len(),
            broad.quad_tree().len(),
            bake.mechanisms.flippers.len(),
            settings.seed
        );
        Ok(Self {
            colliders: bake.colliders,
            mechanisms: bake.mechanisms,
            bounds: bake.bounds,
            broad,
            balls: Vec::new(),
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            queue,
            events,
            filter: Box::new(AcceptAll),
            candidates: Candidates::default(),
            phase: StepPhase::Idle,
            tick: 0,
            static_counts: STATIC_COUNTS,
            last_contacts: Vec::new(),
        })
    }

    // --- Balls ---

    pub fn add_ball(&mut self, mut ball: Ball) -> Result<BallId> {
        if self.balls.iter().any(|b| b.id == ball.id) {
            return Err(PhysicsError::DuplicateBall(ball.id));
        }
        ball.update_aabb();
        let id = ball.id;
        self.balls.push(ball);
        Ok(id)
    }

    pub fn remove_ball(&mut self, id: BallId) -> Result<Ball> {
        let index = self.ball_index(id)?;
        for kicker in &mut self.mechanisms.kickers {
            if kicker.captured == Some(id) {
                kicker.captured = None;
            }
        }
        Ok(self.balls.remove(index))
    }

    fn ball_index(&self, id: BallId) -> Result<usize> {
        self.balls
            .iter()
            .position(|b| b.id == id)
            .ok_or(PhysicsError::UnknownBall(id))
    }

    pub fn ball(&self, id: BallId) -> Result<&Ball> {
        let index = self.ball_index(id)?;
        Ok(&self.balls[index])
    }

    pub fn ball_mut(&mut self, id: BallId) -> Result<&mut Ball> {
        let index = self.ball_index(id)?;
        Ok(&mut self.balls[index])
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    // --- Table ---

    pub fn collider(&self, id: ColliderId) -> Result<&Collider> {
        self.colliders.get(id.index()).ok_or(PhysicsError::UnknownCollider(id))
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn mechanisms(&self) -> &Mechanisms {
        &self.mechanisms
    }

    pub fn flipper(&self, id: MechanismId) -> Result<&FlipperState> {
        self.mechanisms.flipper(id)
    }

    pub fn flipper_mut(&mut self, id: MechanismId) -> Result<&mut FlipperState> {
        self.mechanisms.flipper_mut(id)
    }

    pub fn gate(&self, id: MechanismId) -> Result<&GateState> {
        self.mechanisms.gate(id)
    }

    pub fn spinner(&self, id: MechanismId) -> Result<&SpinnerState> {
        self.mechanisms.spinner(id)
    }

    pub fn plunger_mut(&mut self, id: MechanismId) -> Result<&mut PlungerState> {
        self.mechanisms.plunger_mut(id)
    }

    pub fn kicker(&self, id: MechanismId) -> Result<&KickerState> {
        self.mechanisms.kicker(id)
    }

    pub fn kicker_mut(&mut self, id: MechanismId) -> Result<&mut KickerState> {
        self.mechanisms.kicker_mut(id)
    }

    /// Enable or disable every collider of an item
    pub fn set_item_enabled(&mut self, item: ItemId, enabled: bool) {
        self.mechanisms.set_item_enabled(item, enabled);
    }

    /// Raise a dropped target; returns false if it was already up
    pub fn raise_drop_target(&mut self, item: ItemId) -> Result<bool> {
        self.mechanisms.raise_item(item, &self.events)
    }

    /// Release the ball held by a kicker at `angle` (0 points up the table)
    pub fn kick(&mut self, kicker: MechanismId, angle: f32, speed: f32) -> Result<Option<BallId>> {
        let Some(id) = self.mechanisms.kicker_mut(kicker)?.captured.take() else {
            return Ok(None);
        };
        let ball = self.ball_mut(id)?;
        ball.frozen = false;
        ball.velocity = Vec3::new(angle.sin(), -angle.cos(), 0.0) * speed;
        ball.update_aabb();
        Ok(Some(id))
    }

    // --- Driver ---

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    pub fn set_hit_test_filter(&mut self, filter: impl HitTestFilter + 'static) {
        self.filter = Box::new(filter);
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulation time in milliseconds
    pub fn time_ms(&self) -> u64 {
        self.tick / u64::from(TICKS_PER_MSEC)
    }

    /// Contacts resolved in the last sub-step
    pub fn last_contacts(&self) -> &[Contact] {
        &self.last_contacts
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&self) -> Vec<PhysicsEvent> {
        self.queue.drain()
    }

    /// Advance `elapsed_ms` of game time
    pub fn simulate(&mut self, elapsed_ms: u64) {
        for _ in 0..elapsed_ms * u64::from(TICKS_PER_MSEC) {
            self.step();
        }
    }

    /// One physics tick
    pub fn step(&mut self) {
        self.simulate_cycle(TICK_TIME);
        let gravity = self.settings.gravity;
        for ball in &mut self.balls {
            ball.update_velocities(gravity);
        }
        self.mechanisms.update_velocities();
        self.tick += 1;
    }

    fn set_phase(&mut self, phase: StepPhase) {
        if self.phase != phase {
            log::trace!("Step phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Advance `dtime` frames in sub-steps bounded by the earliest impact
    pub fn simulate_cycle(&mut self, dtime: f32) {
        let mut remaining = dtime;
        let mut sub_steps = 0u32;
        self.static_counts = STATIC_COUNTS;

        while remaining > 0.0 {
            if sub_steps >= self.settings.max_sub_steps {
                log::warn!(
                    "Sub-step limit {} reached at tick {}, {remaining} frames left in free flight",
                    self.settings.max_sub_steps,
                    self.tick
                );
                self.displace(remaining);
                break;
            }

            self.set_phase(StepPhase::BroadPhase);
            let mut hit_time = remaining;
            if let Some(stop) = self.mechanisms.next_stop_time() {
                hit_time = hit_time.min(stop);
            }
            for ball in &mut self.balls {
                ball.update_aabb();
            }
            self.broad.rebuild_balls(&self.balls);

            self.set_phase(StepPhase::NarrowPhase);
            let seed = sub_step_seed(self.settings.seed, self.tick, sub_steps);
            let results = self.narrow_phase(hit_time, seed);
            for hit in results.iter().filter_map(|r| r.hit) {
                hit_time = hit_time.min(hit.hit_time);
            }

            // Repeated near-zero steps: force time forward
            if hit_time < STATIC_TIME {
                self.static_counts -= 1;
                if self.static_counts < 0 {
                    self.static_counts = STATIC_COUNTS;
                    hit_time = STATIC_TIME.min(remaining);
                }
            }

            self.displace(hit_time);
            self.set_phase(StepPhase::Resolve);
            self.resolve(&results, hit_time);

            remaining -= hit_time;
            sub_steps += 1;
        }
        self.set_phase(StepPhase::Drained);
    }

    fn narrow_phase(&mut self, dtime: f32, seed: u64) -> Vec<BallHits> {
        let narrow = NarrowPhase {
            colliders: &self.colliders,
            balls: &self.balls,
            mechanisms: &self.mechanisms,
            broad: &self.broad,
            filter: &*self.filter,
        };
        let run = |index: usize, candidates: &mut Candidates| {
            let mut rng = Pcg32::new(seed, u64::from(narrow.balls[index].id.0));
            narrow.test_ball(index, dtime, &mut rng, candidates)
        };
        if self.settings.parallel && self.balls.len() >= self.settings.parallel_threshold {
            // One scratch list per rayon job
            (0..self.balls.len())
                .into_par_iter()
                .map_init(Candidates::default, |candidates, index| run(index, candidates))
                .collect()
        } else {
            let candidates = &mut self.candidates;
            (0..self.balls.len()).map(|index| run(index, candidates)).collect()
        }
    }

    fn displace(&mut self, dtime: f32) {
        for ball in &mut self.balls {
            ball.update_displacements(dtime);
        }
        self.mechanisms.update_displacements(dtime, &self.events);
    }

    fn resolve(&mut self, results: &[BallHits], hit_time: f32) {
        let time_ms = self.time_ms();
        let mut drained = Vec::new();
        let mut contacts: Vec<(usize, CollisionEvent)> = Vec::new();
        {
            let Self {
                colliders,
                mechanisms,
                balls,
                settings,
                events,
                rng,
                ..
            } = self;
            let mut ctx = ResolveContext {
                mechanisms,
                events,
                settings,
                rng,
                time_ms,
                drained: &mut drained,
            };

            for (index, result) in results.iter().enumerate() {
                if let Some(hit) = result.hit.filter(|h| h.hit_time <= hit_time) {
                    match hit.target {
                        HitTarget::Collider(id) => match colliders.get(id.index()) {
                            Some(collider) => collider.collide(&mut balls[index], &hit, &mut ctx),
                            None => {
                                debug_assert!(false, "dangling collider reference {id:?}");
                                log::warn!("Skipping hit on dangling collider {id:?}");
                            }
                        },
                        HitTarget::Ball(other_id) => {
                            let other = balls.iter().position(|b| b.id == other_id);
                            let pair = other.and_then(|o| pair_mut(balls, index, o));
                            if let Some((ball, other)) = pair {
                                ball_ball::collide_and_report(
                                    ball,
                                    other,
                                    ctx.settings.ball_ball_elasticity,
                                    ctx.events,
                                );
                            }
                        }
                    }
                }
                contacts.extend(result.contacts.iter().map(|c| (index, *c)));
            }

            let reverse = ctx.rng.random_bool(0.5);
            resolve_contacts(&contacts, balls, colliders, hit_time, reverse, &mut ctx);
        }

        // Push-outs and captures move balls other than the one that hit
        for ball in &mut self.balls {
            ball.update_aabb();
        }

        self.last_contacts = contacts
            .iter()
            .filter_map(|(index, event)| {
                let ball = self.balls.get(*index)?;
                Some(Contact {
                    ball: ball.id,
                    event: *event,
                })
            })
            .collect();

        for id in drained {
            if self.remove_ball(id).is_ok() {
                log::debug!("Ball {id:?} drained at tick {}", self.tick);
            }
        }
    }
}
