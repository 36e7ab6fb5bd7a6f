//! Physics settings
//!
//! Loaded from JSON; every field falls back to its default when missing.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::{BALL_BALL_ELASTICITY, GRAVITY};
use crate::error::{PhysicsError, Result};

/// Table slope presets (degrees)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SlopePreset {
    Flat,
    #[default]
    Standard,
    Steep,
}

impl SlopePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlopePreset::Flat => "Flat",
            SlopePreset::Standard => "Standard",
            SlopePreset::Steep => "Steep",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flat" | "level" => Some(SlopePreset::Flat),
            "standard" | "std" => Some(SlopePreset::Standard),
            "steep" => Some(SlopePreset::Steep),
            _ => None,
        }
    }

    /// Playfield inclination in degrees
    pub fn degrees(&self) -> f32 {
        match self {
            SlopePreset::Flat => 0.0,
            SlopePreset::Standard => 6.5,
            SlopePreset::Steep => 7.5,
        }
    }

    /// Gravity vector for this slope. The table's Y axis runs toward the player.
    pub fn gravity(&self) -> Vec3 {
        let slope = self.degrees().to_radians();
        Vec3::new(0.0, slope.sin() * GRAVITY, -slope.cos() * GRAVITY)
    }
}

/// Physics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Gravity acceleration (units per frame²)
    pub gravity: Vec3,
    /// Coefficient of restitution between two balls
    pub ball_ball_elasticity: f32,
    /// Scatter angle (radians) used by materials with a negative scatter angle
    pub default_scatter: f32,
    /// Multiplier applied to every scatter angle
    pub difficulty: f32,
    /// Seed of the tie-breaking RNG
    pub seed: u64,
    /// Maximum sub-steps per tick before the rest of the tick is consumed in free flight
    pub max_sub_steps: u32,
    /// Run broad/narrow phase with rayon
    pub parallel: bool,
    /// Minimum ball count before the parallel path is used
    pub parallel_threshold: usize,
    /// Emit gameplay events
    pub events_enabled: bool,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: SlopePreset::Standard.gravity(),
            ball_ball_elasticity: BALL_BALL_ELASTICITY,
            default_scatter: 0.0,
            difficulty: 1.0,
            seed: 0x5eed,
            max_sub_steps: 256,
            parallel: true,
            parallel_threshold: 8,
            events_enabled: true,
        }
    }
}

impl PhysicsSettings {
    /// Settings for a given slope preset
    pub fn from_slope(preset: SlopePreset) -> Self {
        Self {
            gravity: preset.gravity(),
            ..Self::default()
        }
    }

    /// Settings with no gravity (tests, top-down tables)
    pub fn weightless() -> Self {
        Self {
            gravity: Vec3::ZERO,
            ..Self::default()
        }
    }

    /// Parse and validate settings from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded physics settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the step driver cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidSetting {
                field: "gravity",
                reason: format!("{:?} is not finite", self.gravity),
            });
        }
        if !(0.0..=1.0).contains(&self.ball_ball_elasticity) {
            return Err(PhysicsError::InvalidSetting {
                field: "ball_ball_elasticity",
                reason: format!("{} outside [0, 1]", self.ball_ball_elasticity),
            });
        }
        if !self.difficulty.is_finite() || self.difficulty < 0.0 {
            return Err(PhysicsError::InvalidSetting {
                field: "difficulty",
                reason: format!("{} must be a non-negative number", self.difficulty),
            });
        }
        if self.max_sub_steps == 0 {
            return Err(PhysicsError::InvalidSetting {
                field: "max_sub_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Effective scatter angle for a material value (negative selects the default)
    pub fn scatter_for(&self, material_scatter: f32) -> f32 {
        let angle = if material_scatter < 0.0 {
            self.default_scatter
        } else {
            material_scatter
        };
        angle * self.difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PhysicsSettings::default().validate().is_ok());
        assert!(PhysicsSettings::weightless().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "seed": 42, "parallel": false }"#;
        let settings = PhysicsSettings::from_json_str(json).unwrap();
        assert_eq!(settings.seed, 42);
        assert!(!settings.parallel);
        assert_eq!(settings.max_sub_steps, PhysicsSettings::default().max_sub_steps);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PhysicsSettings::from_json_str(r#"{ "ball_ball_elasticity": 1.5 }"#).unwrap_err();
        assert!(matches!(
            err,
            PhysicsError::InvalidSetting { field: "ball_ball_elasticity", .. }
        ));

        let err = PhysicsSettings::from_json_str(r#"{ "max_sub_steps": 0 }"#).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidSetting { field: "max_sub_steps", .. }));

        assert!(matches!(
            PhysicsSettings::from_json_str("{ nope").unwrap_err(),
            PhysicsError::Json(_)
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_gravity() {
        let settings = PhysicsSettings::from_slope(SlopePreset::Steep);
        let json = settings.to_json_string().unwrap();
        let back = PhysicsSettings::from_json_str(&json).unwrap();
        assert!((back.gravity - settings.gravity).length() < 1e-6);
    }

    #[test]
    fn test_slope_gravity_points_down_and_toward_player() {
        let g = SlopePreset::Standard.gravity();
        assert!(g.z < 0.0);
        assert!(g.y > 0.0);
        assert!((g.length() - GRAVITY).abs() < 1e-4);
        assert_eq!(SlopePreset::Flat.gravity().y, 0.0);
        assert_eq!(SlopePreset::from_str("STD"), Some(SlopePreset::Standard));
    }

    #[test]
    fn test_scatter_for() {
        let mut settings = PhysicsSettings::default();
        settings.default_scatter = 0.2;
        settings.difficulty = 0.5;
        assert!((settings.scatter_for(-1.0) - 0.1).abs() < 1e-6);
        assert!((settings.scatter_for(0.4) - 0.2).abs() < 1e-6);
    }
}
