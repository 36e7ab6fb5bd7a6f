//! Narrow phase: precise hit tests over a ball's candidates
//!
//! Reads only immutable data (colliders, ball snapshot, mechanism state), so
//! every ball can be tested on its own thread.

use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::ball::Ball;
use super::broad_phase::{BroadPhase, Candidates};
use super::collider::{Collider, ball_ball};
use super::hit::CollisionEvent;
use super::mechanism::Mechanisms;

/// Hook consulted before every candidate hit test.
///
/// Returning `true` skips the candidate entirely: no hit and no contact.
/// Ball pairs are tested from both sides, so skipping a pair means skipping
/// it for either ball.
pub trait HitTestFilter: Send + Sync {
    fn skip(&self, ball: &Ball, collider: &Collider) -> bool;

    /// Same as [`HitTestFilter::skip`] for another ball
    fn skip_ball(&self, _ball: &Ball, _other: &Ball) -> bool {
        false
    }
}

/// Filter that tests every candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl HitTestFilter for AcceptAll {
    fn skip(&self, _ball: &Ball, _collider: &Collider) -> bool {
        false
    }
}

/// Narrow-phase output for one ball
#[derive(Debug, Clone, Default)]
pub struct BallHits {
    /// Earliest impact, at most one per ball
    pub hit: Option<CollisionEvent>,
    pub contacts: Vec<CollisionEvent>,
}

/// Everything a per-ball narrow phase reads
pub(crate) struct NarrowPhase<'a> {
    pub colliders: &'a [Collider],
    pub balls: &'a [Ball],
    pub mechanisms: &'a Mechanisms,
    pub broad: &'a BroadPhase,
    pub filter: &'a dyn HitTestFilter,
}

impl NarrowPhase<'_> {
    /// Test the ball at `index` for the earliest impact within `dtime`.
    /// Candidates are shuffled with `rng` so ties resolve without bias.
    /// `candidates` is scratch space, reused across calls.
    pub fn test_ball(
        &self,
        index: usize,
        dtime: f32,
        rng: &mut Pcg32,
        candidates: &mut Candidates,
    ) -> BallHits {
        let mut result = BallHits::default();
        let ball = &self.balls[index];
        if ball.frozen {
            return result;
        }
        self.broad.gather(ball, index, candidates);
        candidates.colliders.shuffle(rng);
        candidates.balls.shuffle(rng);

        let mut best_time = dtime;
        for id in &candidates.colliders {
            let Some(collider) = self.colliders.get(id.index()) else {
                debug_assert!(false, "dangling collider reference {id:?}");
                log::warn!("Skipping dangling collider reference {id:?}");
                continue;
            };
            let active = self.mechanisms.is_item_active(collider.header.item);
            if !active || self.filter.skip(ball, collider) {
                continue;
            }
            let Some(hit) = collider.hit_test(ball, best_time, self.mechanisms) else {
                continue;
            };
            keep(&mut result, hit, &mut best_time);
        }

        for &other_index in &candidates.balls {
            let Some(other) = self.balls.get(other_index) else {
                continue;
            };
            if self.filter.skip_ball(ball, other) {
                continue;
            }
            if let Some(hit) = ball_ball::hit_test(ball, other, best_time) {
                keep(&mut result, hit, &mut best_time);
            }
        }
        result
    }
}

/// Record a contact, or an impact that beats the best so far
fn keep(result: &mut BallHits, hit: CollisionEvent, best_time: &mut f32) {
    if hit.is_contact {
        result.contacts.push(hit);
    } else if hit.is_valid_impact(*best_time) {
        let closer = result.hit.is_none_or(|best| hit.hit_time < best.hit_time);
        if closer {
            *best_time = hit.hit_time;
            result.hit = Some(hit);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};
    use proptest::prelude::*;
    use rand::SeedableRng;

    use super::*;
    use crate::physics::collider::{ColliderShape, HitCircle, HitPlane, LineSegment};
    use crate::physics::hit::HitTarget;
    use crate::physics::{BallId, ColliderId, ItemId};

    fn baked(shapes: Vec<ColliderShape>) -> Vec<Collider> {
        shapes
            .into_iter()
            .enumerate()
            .map(|(i, shape)| {
                let mut c = Collider::new(ItemId(i as u32), shape);
                c.header.id = ColliderId(i as u32);
                c
            })
            .collect()
    }

    fn table() -> Vec<Collider> {
        baked(vec![
            ColliderShape::Plane(HitPlane::floor(0.0)),
            ColliderShape::Line(LineSegment::new(
                Vec2::new(0.0, 100.0),
                Vec2::new(200.0, 100.0),
                0.0,
                50.0,
            )),
            ColliderShape::Circle(HitCircle::new(Vec2::new(100.0, 40.0), 10.0, 0.0, 50.0)),
        ])
    }

    struct SkipItem(ItemId);

    impl HitTestFilter for SkipItem {
        fn skip(&self, _ball: &Ball, collider: &Collider) -> bool {
            collider.header.item == self.0
        }
    }

    struct SkipBall(BallId);

    impl HitTestFilter for SkipBall {
        fn skip(&self, _ball: &Ball, _collider: &Collider) -> bool {
            false
        }

        fn skip_ball(&self, _ball: &Ball, other: &Ball) -> bool {
            other.id == self.0
        }
    }

    fn run_seeded(
        colliders: &[Collider],
        balls: &[Ball],
        filter: &dyn HitTestFilter,
        seed: u64,
    ) -> BallHits {
        let mut broad = BroadPhase::new(colliders);
        broad.rebuild_balls(balls);
        let mechanisms = Mechanisms::default();
        let narrow = NarrowPhase {
            colliders,
            balls,
            mechanisms: &mechanisms,
            broad: &broad,
            filter,
        };
        let mut candidates = Candidates::default();
        narrow.test_ball(0, 1.0, &mut Pcg32::seed_from_u64(seed), &mut candidates)
    }

    fn run(colliders: &[Collider], balls: &[Ball], filter: &dyn HitTestFilter) -> BallHits {
        run_seeded(colliders, balls, filter, 1)
    }

    fn rolling(id: u32, position: Vec3, velocity: Vec3) -> Ball {
        Ball::new(BallId(id), position, velocity)
    }

    #[test]
    fn test_earliest_impact_wins_and_floor_is_contact() {
        let colliders = table();
        // Rolling toward the post, surfaces 5 apart
        let balls = vec![rolling(0, Vec3::new(100.0, 0.0, 25.0), Vec3::new(0.0, 20.0, 0.0))];
        let result = run(&colliders, &balls, &AcceptAll);
        let hit = result.hit.unwrap();
        assert_eq!(hit.target, HitTarget::Collider(ColliderId(2)));
        assert!((hit.hit_time - 0.25).abs() < 1e-4);
        assert_eq!(result.contacts.len(), 1);
        assert_eq!(result.contacts[0].target, HitTarget::Collider(ColliderId(0)));
    }

    #[test]
    fn test_filter_skips_candidate() {
        let colliders = table();
        let balls = vec![rolling(0, Vec3::new(100.0, 0.0, 25.0), Vec3::new(0.0, 20.0, 0.0))];
        let result = run(&colliders, &balls, &SkipItem(ItemId(2)));
        let post = HitTarget::Collider(ColliderId(2));
        assert!(result.hit.is_none_or(|hit| hit.target != post));
    }

    #[test]
    fn test_filter_skips_ball_candidate() {
        let balls = vec![
            rolling(0, Vec3::new(0.0, 0.0, 25.0), Vec3::new(20.0, 0.0, 0.0)),
            rolling(1, Vec3::new(60.0, 0.0, 25.0), Vec3::ZERO),
        ];
        assert!(run(&[], &balls, &SkipBall(BallId(1))).hit.is_none());
        assert!(run(&[], &balls, &SkipBall(BallId(7))).hit.is_some());
    }

    #[test]
    fn test_frozen_ball_tests_nothing() {
        let colliders = table();
        let mut ball = rolling(0, Vec3::new(100.0, 0.0, 25.0), Vec3::new(0.0, 20.0, 0.0));
        ball.frozen = true;
        let result = run(&colliders, &[ball], &AcceptAll);
        assert!(result.hit.is_none());
        assert!(result.contacts.is_empty());
    }

    #[test]
    fn test_ball_pair_found() {
        let balls = vec![
            rolling(0, Vec3::new(0.0, 0.0, 25.0), Vec3::new(20.0, 0.0, 0.0)),
            rolling(1, Vec3::new(60.0, 0.0, 25.0), Vec3::ZERO),
        ];
        let result = run(&[], &balls, &AcceptAll);
        let hit = result.hit.unwrap();
        assert_eq!(hit.target, HitTarget::Ball(BallId(1)));
        assert!((hit.hit_time - 0.5).abs() < 1e-4);
    }

    fn shape_strategy() -> impl Strategy<Value = ColliderShape> {
        let circle = (0.0f32..400.0, 0.0f32..400.0, 5.0f32..40.0).prop_map(|(x, y, r)| {
            ColliderShape::Circle(HitCircle::new(Vec2::new(x, y), r, 0.0, 50.0))
        });
        let line = (0.0f32..400.0, 0.0f32..400.0, 0.0f32..400.0, 0.0f32..400.0)
            .prop_filter("degenerate", |(x1, y1, x2, y2)| {
                (x1 - x2).abs() + (y1 - y2).abs() > 1.0
            })
            .prop_map(|(x1, y1, x2, y2)| {
                let line = LineSegment::new(Vec2::new(x1, y1), Vec2::new(x2, y2), 0.0, 50.0);
                ColliderShape::Line(line)
            });
        prop_oneof![circle, line]
    }

    fn ball_strategy() -> impl Strategy<Value = (Vec3, Vec3)> {
        (0.0f32..400.0, 0.0f32..400.0, -40.0f32..40.0, -40.0f32..40.0)
            .prop_map(|(x, y, vx, vy)| (Vec3::new(x, y, 25.0), Vec3::new(vx, vy, 0.0)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn test_hit_is_earliest_valid_impact(
            shapes in prop::collection::vec(shape_strategy(), 0..24),
            spots in prop::collection::vec(ball_strategy(), 1..5),
            seed in any::<u64>(),
        ) {
            let mut all = vec![ColliderShape::Plane(HitPlane::floor(0.0))];
            all.extend(shapes);
            let colliders = baked(all);
            let balls: Vec<Ball> = spots
                .iter()
                .enumerate()
                .map(|(i, &(position, velocity))| rolling(i as u32, position, velocity))
                .collect();
            let result = run_seeded(&colliders, &balls, &AcceptAll, seed);

            // Exhaustive search over every collider and ball
            let mechanisms = Mechanisms::default();
            let ball = &balls[0];
            let from_colliders = colliders
                .iter()
                .filter_map(|c| c.hit_test(ball, 1.0, &mechanisms));
            let from_balls = balls[1..]
                .iter()
                .filter_map(|other| ball_ball::hit_test(ball, other, 1.0));
            let earliest = from_colliders
                .chain(from_balls)
                .filter(|hit| hit.is_valid_impact(1.0))
                .map(|hit| hit.hit_time)
                .min_by(f32::total_cmp);

            match (result.hit, earliest) {
                (Some(hit), Some(t)) => {
                    prop_assert!(!hit.is_contact);
                    let gap = (hit.hit_time - t).abs();
                    prop_assert!(gap < 1e-5, "found {} but {} exists", hit.hit_time, t);
                }
                (None, None) => {}
                (found, expected) => {
                    prop_assert!(false, "found {:?}, expected impact at {:?}", found, expected)
                }
            }
            prop_assert!(result.contacts.iter().all(|c| c.is_contact));
        }
    }
}
