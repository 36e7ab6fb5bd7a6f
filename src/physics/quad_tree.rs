//! Static quad-tree over baked colliders
//!
//! Built once at bake. Nodes live in one arena; the four children of a node
//! are consecutive. Items that straddle a split line stay at the parent, so a
//! query visits every node whose region the ball's swept bounds touch.

use glam::Vec3;

use super::ColliderId;
use super::aabb::Aabb;
use super::ball::Ball;
use super::collider::Collider;

/// Items a node holds before it tries to split
const MAX_ITEMS_PER_NODE: usize = 4;
/// Consecutive levels that failed to push anything down before giving up
const MAX_EMPTY_LEVELS: u32 = 8;
const MAX_DEPTH: u32 = 128;
/// Narrowest node that may still split
const MIN_NODE_SIZE: f32 = 1.0e-4;

#[derive(Debug, Clone)]
struct QuadNode {
    /// Split point; children are ordered by (x > c.x) + 2 * (y > c.y)
    center: Vec3,
    items: Vec<(ColliderId, Aabb)>,
    /// Index of the first of four children
    children: Option<usize>,
}

/// Spatial index of static collider bounds
#[derive(Debug, Clone)]
pub struct QuadTree {
    nodes: Vec<QuadNode>,
    bounds: Aabb,
    len: usize,
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::build(std::iter::empty())
    }
}

impl QuadTree {
    /// Build from collider bounds
    pub fn build(items: impl IntoIterator<Item = (ColliderId, Aabb)>) -> Self {
        let items: Vec<(ColliderId, Aabb)> = items.into_iter().collect();
        let bounds = items.iter().fold(Aabb::EMPTY, |acc, (_, aabb)| acc.union(*aabb));
        let len = items.len();
        let mut tree = Self {
            nodes: vec![QuadNode {
                center: Vec3::ZERO,
                items,
                children: None,
            }],
            bounds,
            len,
        };
        if !bounds.is_empty() {
            tree.split(0, bounds, 0, 0);
        }
        log::debug!(
            "Quad-tree built: {} colliders, {} nodes, depth {}",
            tree.len,
            tree.nodes.len(),
            tree.depth()
        );
        tree
    }

    /// Build from the bounded colliders of a table
    pub fn from_colliders(colliders: &[Collider]) -> Self {
        Self::build(
            colliders
                .iter()
                .filter(|c| !c.is_unbounded())
                .map(|c| (c.id(), c.header.aabb)),
        )
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Union of every indexed item's bounds
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn split(&mut self, node: usize, region: Aabb, level: u32, level_empty: u32) {
        if self.nodes[node].items.len() <= MAX_ITEMS_PER_NODE {
            return;
        }
        let center = region.center();
        let first_child = self.nodes.len();
        let mut buckets: [Vec<(ColliderId, Aabb)>; 4] = Default::default();
        let mut stay = Vec::new();
        for (id, aabb) in self.nodes[node].items.drain(..) {
            match quadrant(&aabb, center) {
                Some(q) => buckets[q].push((id, aabb)),
                None => stay.push((id, aabb)),
            }
        }
        let used = buckets.iter().filter(|b| !b.is_empty()).count();
        // Everything moving into one quadrant separates nothing
        let level_empty = if used > 1 { 0 } else { level_empty + 1 };

        if used == 0 {
            // Nothing fits a quadrant; keep this node a leaf
            self.nodes[node].items = stay;
            return;
        }

        let node_ref = &mut self.nodes[node];
        node_ref.items = stay;
        node_ref.center = center;
        node_ref.children = Some(first_child);
        for bucket in buckets.iter_mut() {
            self.nodes.push(QuadNode {
                center,
                items: std::mem::take(bucket),
                children: None,
            });
        }

        let may_recurse = level_empty <= MAX_EMPTY_LEVELS
            && level + 1 < MAX_DEPTH
            && (center.x - region.min.x) > MIN_NODE_SIZE;
        if !may_recurse {
            return;
        }
        for q in 0..4 {
            let child_region = quadrant_region(&region, center, q);
            self.split(first_child + q, child_region, level + 1, level_empty);
        }
    }

    /// Colliders whose bounds overlap the ball's swept bounds and reach its
    /// hit sphere, appended to `out`
    pub fn query(&self, ball: &Ball, out: &mut Vec<ColliderId>) {
        self.query_region(&ball.aabb, ball.position, ball.hit_radius_sqr, out);
    }

    /// Colliders overlapping `aabb` and reaching the sphere at `center`
    pub fn query_region(
        &self,
        aabb: &Aabb,
        center: Vec3,
        radius_sqr: f32,
        out: &mut Vec<ColliderId>,
    ) {
        self.query_region_with_stack(aabb, center, radius_sqr, out, &mut Vec::new());
    }

    /// [`QuadTree::query`] walking with a caller-owned node stack
    pub fn query_with_stack(&self, ball: &Ball, out: &mut Vec<ColliderId>, stack: &mut Vec<usize>) {
        self.query_region_with_stack(&ball.aabb, ball.position, ball.hit_radius_sqr, out, stack);
    }

    fn query_region_with_stack(
        &self,
        aabb: &Aabb,
        center: Vec3,
        radius_sqr: f32,
        out: &mut Vec<ColliderId>,
        stack: &mut Vec<usize>,
    ) {
        if self.is_empty() {
            return;
        }
        stack.clear();
        stack.push(0);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            for (id, item) in &node.items {
                if item.overlaps(aabb) && item.intersects_sphere(center, radius_sqr) {
                    out.push(*id);
                }
            }
            let Some(first) = node.children else {
                continue;
            };
            let c = node.center;
            let left = aabb.min.x <= c.x;
            let right = aabb.max.x >= c.x;
            let top = aabb.min.y <= c.y;
            let bottom = aabb.max.y >= c.y;
            if top && left {
                stack.push(first);
            }
            if top && right {
                stack.push(first + 1);
            }
            if bottom && left {
                stack.push(first + 2);
            }
            if bottom && right {
                stack.push(first + 3);
            }
        }
    }

    fn depth(&self) -> u32 {
        fn walk(nodes: &[QuadNode], index: usize) -> u32 {
            match nodes[index].children {
                Some(first) => 1 + (0..4).map(|q| walk(nodes, first + q)).max().unwrap_or(0),
                None => 1,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Child quadrant wholly containing `aabb` in XY, or `None` if it straddles
fn quadrant(aabb: &Aabb, center: Vec3) -> Option<usize> {
    let x = if aabb.min.x > center.x {
        1
    } else if aabb.max.x < center.x {
        0
    } else {
        return None;
    };
    let y = if aabb.min.y > center.y {
        2
    } else if aabb.max.y < center.y {
        0
    } else {
        return None;
    };
    Some(x + y)
}

fn quadrant_region(region: &Aabb, center: Vec3, q: usize) -> Aabb {
    let mut min = region.min;
    let mut max = region.max;
    if q & 1 == 0 {
        max.x = center.x;
    } else {
        min.x = center.x;
    }
    if q & 2 == 0 {
        max.y = center.y;
    } else {
        min.y = center.y;
    }
    Aabb::new(min, max)
}
