//! Flipper Core demo
//!
//! Bakes a small table, drops a few balls and logs what the collision core
//! reports. Pass a settings JSON path as the first argument to override the
//! defaults.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Flipper Core demo starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => match flipper_core::PhysicsSettings::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to load settings from {path}: {e}");
                std::process::exit(1);
            }
        },
        None => flipper_core::PhysicsSettings::default(),
    };

    if let Err(e) = demo::run(settings) {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is the product; the demo is native only
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::collections::HashMap;

    use glam::{Vec2, Vec3};

    use flipper_core::physics::collider::{
        Bumper, FlipperHit, HitCircle, KickerCircle, TriggerCircle,
    };
    use flipper_core::physics::{
        Ball, BallId, Collider, ColliderShape, EventKind, FlipperState, ItemId, KickerState,
        MechanismId, PhysicsMaterial, PhysicsWorld, TableBake,
    };
    use flipper_core::{PhysicsSettings, error::Result};

    const WIDTH: f32 = 500.0;
    const HEIGHT: f32 = 1000.0;
    const WALL_HEIGHT: f32 = 60.0;

    const WALLS: ItemId = ItemId(1);
    const BUMPER: ItemId = ItemId(2);
    const ROLLOVER: ItemId = ItemId(3);
    const SAUCER: ItemId = ItemId(4);
    const LEFT_FLIPPER: ItemId = ItemId(5);

    /// Demo table plus the flipper and saucer mechanisms
    fn bake_table() -> (TableBake, MechanismId, MechanismId) {
        let mut bake = TableBake::new()
            .with_playfield(PhysicsMaterial::new(0.25, 0.075))
            .with_glass(WALL_HEIGHT, PhysicsMaterial::new(0.2, 0.0));

        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(WIDTH, 0.0),
            Vec2::new(WIDTH, HEIGHT),
            Vec2::new(0.0, HEIGHT),
        ];
        let rail = PhysicsMaterial::new(0.6, 0.2).with_falloff(0.43);
        for i in 0..corners.len() {
            let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
            bake.add_wall(WALLS, b, a, WALL_HEIGHT, rail);
        }

        let cap = HitCircle::new(Vec2::new(250.0, 300.0), 35.0, 0.0, WALL_HEIGHT);
        let bumper = Bumper::new(cap, 15.0);
        bake.add(
            Collider::new(BUMPER, ColliderShape::Bumper(bumper))
                .with_material(PhysicsMaterial::bouncy(0.7))
                .with_events(0.5),
        );

        let rollover = TriggerCircle::new(Vec2::new(120.0, 500.0), 30.0, 0.0, WALL_HEIGHT);
        bake.add(Collider::new(ROLLOVER, ColliderShape::TriggerCircle(rollover)));

        let saucer = bake.add_kicker(KickerState::new(SAUCER));
        let kicker = KickerCircle::new(Vec2::new(400.0, 650.0), 25.0, saucer);
        bake.add(Collider::new(SAUCER, ColliderShape::KickerCircle(kicker)));

        // Resting pointed down-right, swings up when the solenoid fires
        let flipper = bake.add_flipper(FlipperState::new(LEFT_FLIPPER, 2.1, 1.1));
        let shape = FlipperHit::new(Vec2::new(140.0, 880.0), 14.0, 8.0, 130.0, flipper);
        bake.add(
            Collider::new(LEFT_FLIPPER, ColliderShape::Flipper(shape))
                .with_material(PhysicsMaterial::new(0.55, 0.6)),
        );

        (bake, flipper, saucer)
    }

    pub fn run(settings: PhysicsSettings) -> Result<()> {
        let (bake, flipper, saucer) = bake_table();
        let mut world = PhysicsWorld::new(bake, settings)?;
        for i in 0..4u32 {
            let position = Vec3::new(80.0 + 100.0 * i as f32, 120.0, 25.0);
            let velocity = Vec3::new(4.0 - 2.5 * i as f32, 6.0, 0.0);
            world.add_ball(Ball::new(BallId(i), position, velocity))?;
        }

        let mut counts: HashMap<EventKind, usize> = HashMap::new();

        for second in 0..5u64 {
            // Flip once a second, hold for 300 ms
            world.flipper_mut(flipper)?.solenoid = true;
            world.simulate(300);
            world.flipper_mut(flipper)?.solenoid = false;
            world.simulate(700);

            for event in world.drain_events() {
                log::debug!("{:?} on {:?} (param {:?})", event.kind, event.item, event.param);
                *counts.entry(event.kind).or_default() += 1;
            }
            log::info!(
                "t={}s: {} balls, {} contacts in the last sub-step",
                second + 1,
                world.balls().len(),
                world.last_contacts().len()
            );

            if let Some(captured) = world.kicker(saucer)?.captured {
                log::info!("Saucer holds {captured:?}, kicking it out");
                world.kick(saucer, 0.3, 12.0)?;
            }
        }

        let mut summary: Vec<_> = counts.into_iter().collect();
        summary.sort_by_key(|(kind, _)| format!("{kind:?}"));
        for (kind, count) in summary {
            log::info!("{kind:?}: {count}");
        }
        for ball in world.balls() {
            log::info!("{:?} at {:.1?} moving {:.2?}", ball.id, ball.position, ball.velocity);
        }
        Ok(())
    }
}
