//! Resting contact resolution
//!
//! Contacts gathered by the narrow phase are resolved after every impact of
//! the sub-step. The order flips between forward and reverse so stacked
//! contacts do not always favor the first ball.

use super::ball::Ball;
use super::collider::{Collider, ResolveContext, ball_ball};
use super::hit::{CollisionEvent, HitTarget};

/// Mutable references to two distinct balls
pub(crate) fn pair_mut(balls: &mut [Ball], a: usize, b: usize) -> Option<(&mut Ball, &mut Ball)> {
    if a == b || a >= balls.len() || b >= balls.len() {
        return None;
    }
    if a < b {
        let (lo, hi) = balls.split_at_mut(b);
        Some((&mut lo[a], &mut hi[0]))
    } else {
        let (lo, hi) = balls.split_at_mut(a);
        Some((&mut hi[0], &mut lo[b]))
    }
}

/// Resolve `contacts` (ball index plus event) over `dtime`
pub(crate) fn resolve_contacts(
    contacts: &[(usize, CollisionEvent)],
    balls: &mut [Ball],
    colliders: &[Collider],
    dtime: f32,
    reverse: bool,
    ctx: &mut ResolveContext<'_>,
) {
    if reverse {
        for (index, event) in contacts.iter().rev() {
            resolve_one(*index, event, balls, colliders, dtime, ctx);
        }
    } else {
        for (index, event) in contacts {
            resolve_one(*index, event, balls, colliders, dtime, ctx);
        }
    }
}

fn resolve_one(
    index: usize,
    event: &CollisionEvent,
    balls: &mut [Ball],
    colliders: &[Collider],
    dtime: f32,
    ctx: &mut ResolveContext<'_>,
) {
    if balls.get(index).is_none_or(|b| b.frozen) {
        return;
    }
    match event.target {
        HitTarget::Collider(id) => {
            let Some(collider) = colliders.get(id.index()) else {
                debug_assert!(false, "dangling collider reference {id:?}");
                log::warn!("Skipping contact with dangling collider {id:?}");
                return;
            };
            collider.contact(&mut balls[index], event, dtime, ctx);
        }
        HitTarget::Ball(other_id) => {
            let Some(other) = balls.iter().position(|b| b.id == other_id) else {
                return;
            };
            if let Some((ball, other)) = pair_mut(balls, index, other) {
                // Resting pair: cancel the approach without a bounce
                ball_ball::collide(ball, other, 0.0);
            }
        }
    }
}
