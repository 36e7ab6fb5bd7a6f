//! Broad phase: candidate lists per ball
//!
//! Static colliders come from the quad-tree built at bake, other balls from
//! the kd-tree rebuilt at the start of every sub-step. Unbounded colliders
//! (playfield, glass) are candidates for every ball.

use super::ColliderId;
use super::ball::Ball;
use super::collider::Collider;
use super::kd_tree::KdTree;
use super::quad_tree::QuadTree;

/// Candidates of one ball for one sub-step.
///
/// Meant to be reused across balls and sub-steps: [`BroadPhase::gather`]
/// clears it and keeps the capacity, including the tree walk stack.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub colliders: Vec<ColliderId>,
    /// Indices into the world's ball list
    pub balls: Vec<usize>,
    stack: Vec<usize>,
}

impl Candidates {
    pub fn clear(&mut self) {
        self.colliders.clear();
        self.balls.clear();
    }

    pub fn len(&self) -> usize {
        self.colliders.len() + self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty() && self.balls.is_empty()
    }
}

/// Both spatial indices plus the always-on colliders
#[derive(Debug, Clone, Default)]
pub struct BroadPhase {
    quad_tree: QuadTree,
    unbounded: Vec<ColliderId>,
    kd_tree: KdTree,
}

impl BroadPhase {
    pub fn new(colliders: &[Collider]) -> Self {
        let unbounded = colliders
            .iter()
            .filter(|c| c.is_unbounded())
            .map(Collider::id)
            .collect();
        Self {
            quad_tree: QuadTree::from_colliders(colliders),
            unbounded,
            kd_tree: KdTree::new(),
        }
    }

    pub fn quad_tree(&self) -> &QuadTree {
        &self.quad_tree
    }

    pub fn kd_tree(&self) -> &KdTree {
        &self.kd_tree
    }

    /// Re-index the balls; must run before any query of the sub-step
    pub fn rebuild_balls(&mut self, balls: &[Ball]) {
        self.kd_tree.rebuild(balls);
    }

    /// Fill `out` with the candidates of the ball at `index`
    pub fn gather(&self, ball: &Ball, index: usize, out: &mut Candidates) {
        out.clear();
        out.colliders.extend_from_slice(&self.unbounded);
        self.quad_tree.query_with_stack(ball, &mut out.colliders, &mut out.stack);
        self.kd_tree.query_with_stack(ball, index, &mut out.balls, &mut out.stack);
    }
}
