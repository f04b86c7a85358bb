//! Immutable simulation settings.
//!
//! Every tunable constant lives in [`SimSettings`]. Settings are plain
//! serde data so they can be loaded from JSON:
//!
//! ```
//! use spear_pipeline::config::SimSettings;
//!
//! let settings = SimSettings::from_json_str(r#"{ "mob_speed": 2.5 }"#).unwrap();
//! assert_eq!(settings.mob_speed, 2.5);
//! assert_eq!(settings.shooting_range, 50.0);
//! ```

use std::path::Path;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transform::{angle_deg, lerp_clamped, rotation_from_euler_deg};

/// Speed attenuation applied when a spear bounces.
///
/// The factor is interpolated from `at_flat` to `at_inverted` by the angle
/// between the surface normal and world up, over 0..180 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BounceAttenuation {
    pub at_flat: f32,
    pub at_inverted: f32,
}

impl BounceAttenuation {
    pub fn factor(&self, normal: Vec3) -> f32 {
        let t = angle_deg(normal, Vec3::Y) / 180.0;
        lerp_clamped(self.at_flat, self.at_inverted, t)
    }
}

impl Default for BounceAttenuation {
    fn default() -> Self {
        Self {
            at_flat: 0.5,
            at_inverted: 1.0,
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Target ping-pong speed (units per second)
    pub target_speed: f32,
    pub target_left: f32,
    pub target_right: f32,
    /// Target position before the first tick
    pub target_origin: Vec3,

    /// Max length of the mob's line-of-sight ray
    pub shooting_range: f32,
    /// Spear spawn offset from the throwing mob
    pub throwing_point: Vec3,
    /// Spear spawn rotation as Euler angles in degrees
    pub throwing_rotation_deg: Vec3,

    pub mob_speed: f32,
    /// Distance at which a waypoint counts as reached
    pub arrive_radius: f32,
    pub spawn_origin: Vec3,
    pub spawn_spacing: f32,

    pub spear_launch_speed: f32,
    pub gravity: Vec3,
    /// Spears past this z are pushed back and bounced
    pub boundary_z: f32,
    pub boundary_clamp_z: f32,
    /// Height above a hit surface a spear is snapped to
    pub hit_lift: f32,
    pub bounce: BounceAttenuation,

    /// Collision layer index of walls
    pub wall_layer: u32,
    /// Minimum items per parallel task
    pub min_batch: usize,

    /// Spear slots kept per mob; 0 is treated as 1
    pub spears_per_mob: usize,
    pub mob_pool_expandable: bool,
    pub spear_pool_expandable: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            target_speed: 60.0,
            target_left: -50.0,
            target_right: 50.0,
            target_origin: Vec3::new(0.0, 5.0, 100.0),
            shooting_range: 50.0,
            throwing_point: Vec3::new(0.8, 0.8, 0.0),
            throwing_rotation_deg: Vec3::new(-45.0, 0.0, 0.0),
            mob_speed: 1.0,
            arrive_radius: 2.0,
            spawn_origin: Vec3::new(0.0, 1.0, 0.0),
            spawn_spacing: 2.0,
            spear_launch_speed: 11.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            boundary_z: 200.0,
            boundary_clamp_z: 198.0,
            hit_lift: 0.1,
            bounce: BounceAttenuation::default(),
            wall_layer: 8,
            min_batch: 100,
            spears_per_mob: 1,
            mob_pool_expandable: true,
            spear_pool_expandable: true,
        }
    }
}

impl SimSettings {
    /// Parse settings from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn wall_mask(&self) -> u32 {
        1u32.checked_shl(self.wall_layer).unwrap_or(0)
    }

    pub fn throwing_rotation(&self) -> Quat {
        rotation_from_euler_deg(self.throwing_rotation_deg)
    }
}
