//! Axis-aligned bounding boxes used by both spatial indices

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Inverted box, the identity of [`Aabb::union`]
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box enclosing a sphere
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self {
            min: center - Vec3::splat(radius),
            max: center + Vec3::splat(radius),
        }
    }

    /// Box enclosing a set of points
    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |acc, &p| acc.extended(p))
    }

    /// Box enclosing a vertical cylinder or a 2D footprint over a z range
    pub fn from_footprint(min: Vec2, max: Vec2, z_low: f32, z_high: f32) -> Self {
        Self::new(min.extend(z_low), max.extend(z_high))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extended(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(self, other: Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow every face by `margin`
    pub fn inflated(self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis
    #[inline]
    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    /// Rectangle overlap in all three axes (touching counts)
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Sphere-vs-box test using the squared distance from `center` to the box
    #[inline]
    pub fn intersects_sphere(&self, center: Vec3, radius_sqr: f32) -> bool {
        let below = (self.min - center).max(Vec3::ZERO);
        let above = (center - self.max).max(Vec3::ZERO);
        let e = below + above;
        e.length_squared() <= radius_sqr
    }

    /// Whether the box fully encloses a sphere
    pub fn encloses_sphere(&self, center: Vec3, radius: f32) -> bool {
        let r = Vec3::splat(radius);
        (center - r).cmpge(self.min).all() && (center + r).cmple(self.max).all()
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Component of an axis (0 = x, 1 = y, 2 = z)
    #[inline]
    pub fn axis_range(&self, axis: usize) -> (f32, f32) {
        (self.min[axis], self.max[axis])
    }
}
