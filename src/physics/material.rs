//! Surface response parameters

use serde::{Deserialize, Serialize};

use crate::consts::FALLOFF_REFERENCE;

/// Physics material shared by every collider of an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsMaterial {
    /// Coefficient of restitution at zero impact speed
    pub elasticity: f32,
    /// How fast elasticity drops with impact speed (0 disables)
    pub elasticity_falloff: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Scatter angle in radians; negative uses the global setting
    pub scatter_angle: f32,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            elasticity: 0.3,
            elasticity_falloff: 0.0,
            friction: 0.3,
            scatter_angle: 0.0,
        }
    }
}

impl PhysicsMaterial {
    pub fn new(elasticity: f32, friction: f32) -> Self {
        Self {
            elasticity,
            friction,
            ..Self::default()
        }
    }

    /// Frictionless perfectly rigid surface with the given elasticity
    pub fn bouncy(elasticity: f32) -> Self {
        Self {
            elasticity,
            elasticity_falloff: 0.0,
            friction: 0.0,
            scatter_angle: 0.0,
        }
    }

    pub fn with_falloff(mut self, falloff: f32) -> Self {
        self.elasticity_falloff = falloff;
        self
    }

    pub fn with_scatter(mut self, scatter_angle: f32) -> Self {
        self.scatter_angle = scatter_angle;
        self
    }

    /// Elasticity after falloff for a given impact speed
    #[inline]
    pub fn elasticity_at(&self, impact_speed: f32) -> f32 {
        if self.elasticity_falloff > 0.0 {
            let falloff = self.elasticity_falloff * impact_speed.abs() / FALLOFF_REFERENCE;
            self.elasticity / (1.0 + falloff)
        } else {
            self.elasticity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falloff_halves_at_reference_speed() {
        let m = PhysicsMaterial::bouncy(0.8).with_falloff(1.0);
        assert!((m.elasticity_at(FALLOFF_REFERENCE) - 0.4).abs() < 1e-6);
        assert!((m.elasticity_at(0.0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_no_falloff() {
        let m = PhysicsMaterial::bouncy(0.5);
        assert_eq!(m.elasticity_at(100.0), 0.5);
    }
}
