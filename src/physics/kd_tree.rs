//! Dynamic kd-tree over balls
//!
//! Rebuilt every sub-step from the balls' swept bounds. Each node owns a
//! contiguous range of the index array ordered as items that straddle the
//! split, then the left subtree, then the right subtree. Nodes come from a
//! pool sized `2n + 1`; running out of nodes leaves the node a leaf.

use glam::Vec3;

use super::aabb::Aabb;
use super::ball::Ball;

const MAX_ITEMS_PER_NODE: usize = 4;
const MAX_DEPTH: u32 = 64;
/// Levels in a row whose split failed to separate anything
const MAX_EMPTY_LEVELS: u32 = 8;
const MIN_EXTENT: f32 = 1.0e-4;

/// Snapshot of one ball at build time
#[derive(Debug, Clone, Copy)]
struct KdItem {
    /// Index into the ball slice the tree was built from
    index: usize,
    aabb: Aabb,
    center: Vec3,
    hit_radius: f32,
}

#[derive(Debug, Clone, Copy)]
struct KdNode {
    bounds: Aabb,
    /// Range of `order` covered by this subtree
    start: usize,
    len: usize,
    /// Items at the front of the range kept at this node
    stay: usize,
    /// Index of the left child; the right child follows it
    children: Option<usize>,
    axis: usize,
    split: f32,
}

impl KdNode {
    fn leaf(bounds: Aabb, start: usize, len: usize) -> Self {
        Self {
            bounds,
            start,
            len,
            stay: len,
            children: None,
            axis: 0,
            split: 0.0,
        }
    }
}

/// Spatial index of ball swept bounds
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    items: Vec<KdItem>,
    order: Vec<usize>,
    nodes: Vec<KdNode>,
    max_nodes: usize,
}

impl KdTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the bounds of every non-frozen ball, reusing storage
    pub fn rebuild(&mut self, balls: &[Ball]) {
        self.items.clear();
        let active = balls.iter().enumerate().filter(|(_, ball)| !ball.frozen);
        self.items.extend(active.map(|(index, ball)| KdItem {
            index,
            aabb: ball.aabb,
            center: ball.position,
            hit_radius: ball.hit_radius(),
        }));
        self.order.clear();
        self.order.extend(0..self.items.len());
        self.nodes.clear();
        self.max_nodes = 2 * self.items.len() + 1;

        let bounds = self.items.iter().fold(Aabb::EMPTY, |acc, item| acc.union(item.aabb));
        self.nodes.push(KdNode::leaf(bounds, 0, self.items.len()));
        self.create_next_level(0, 0, 0);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn alloc_two(&mut self) -> Option<usize> {
        if self.nodes.len() + 2 > self.max_nodes {
            return None;
        }
        let first = self.nodes.len();
        let empty = KdNode::leaf(Aabb::EMPTY, 0, 0);
        self.nodes.push(empty);
        self.nodes.push(empty);
        Some(first)
    }

    fn create_next_level(&mut self, node: usize, level: u32, level_empty: u32) {
        let KdNode { bounds, start, len, .. } = self.nodes[node];
        if len <= MAX_ITEMS_PER_NODE || level >= MAX_DEPTH {
            return;
        }
        let diagonal = bounds.diagonal();
        let axis = if diagonal.x >= diagonal.y && diagonal.x >= diagonal.z {
            0
        } else if diagonal.y >= diagonal.z {
            1
        } else {
            2
        };
        if diagonal[axis] < MIN_EXTENT {
            return;
        }
        let Some(first_child) = self.alloc_two() else {
            return;
        };
        let split = bounds.center()[axis];

        // Partition the range in place: straddlers, then left, then right
        let end = start + len;
        let (mut left_start, mut next, mut right_start) = (start, start, end);
        while next < right_start {
            let (lo, hi) = self.items[self.order[next]].aabb.axis_range(axis);
            if hi < split {
                next += 1;
            } else if lo > split {
                right_start -= 1;
                self.order.swap(next, right_start);
            } else {
                self.order.swap(left_start, next);
                left_start += 1;
                next += 1;
            }
        }
        let stay = left_start - start;
        let left = right_start - left_start;
        let right = end - right_start;

        let parts = [stay, left, right].iter().filter(|&&n| n > 0).count();
        let level_empty = if parts < 2 { level_empty + 1 } else { 0 };
        if level_empty > MAX_EMPTY_LEVELS {
            self.nodes.truncate(first_child);
            return;
        }

        let left_bounds = self.range_bounds(left_start, left);
        let right_bounds = self.range_bounds(right_start, right);
        self.nodes[first_child] = KdNode::leaf(left_bounds, left_start, left);
        self.nodes[first_child + 1] = KdNode::leaf(right_bounds, right_start, right);
        let parent = &mut self.nodes[node];
        parent.stay = stay;
        parent.children = Some(first_child);
        parent.axis = axis;
        parent.split = split;

        self.create_next_level(first_child, level + 1, level_empty);
        self.create_next_level(first_child + 1, level + 1, level_empty);
    }

    fn range_bounds(&self, start: usize, len: usize) -> Aabb {
        self.order[start..start + len]
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| acc.union(self.items[i].aabb))
    }

    /// Indices of balls that may touch `ball` this sub-step, excluding `ball`
    /// itself (matched by `self_index`)
    pub fn query(&self, ball: &Ball, self_index: usize, out: &mut Vec<usize>) {
        self.query_with_stack(ball, self_index, out, &mut Vec::new());
    }

    /// [`KdTree::query`] walking with a caller-owned node stack
    pub fn query_with_stack(
        &self,
        ball: &Ball,
        self_index: usize,
        out: &mut Vec<usize>,
        stack: &mut Vec<usize>,
    ) {
        if self.nodes.is_empty() || self.items.is_empty() {
            return;
        }
        let hit_radius = ball.hit_radius();
        stack.clear();
        stack.push(0);
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n];
            for &i in &self.order[node.start..node.start + node.stay] {
                let item = &self.items[i];
                if item.index == self_index || !item.aabb.overlaps(&ball.aabb) {
                    continue;
                }
                let reach = hit_radius + item.hit_radius;
                if (item.center - ball.position).length_squared() <= reach * reach {
                    out.push(item.index);
                }
            }
            let Some(first) = node.children else {
                continue;
            };
            let (lo, hi) = ball.aabb.axis_range(node.axis);
            if lo <= node.split {
                stack.push(first);
            }
            if hi >= node.split {
                stack.push(first + 1);
            }
        }
    }
}
