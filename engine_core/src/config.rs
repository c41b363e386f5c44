//! Configuration system.
//!
//! Loads engine configuration from JSON strings (file IO left to the host).
//! Every field has a default, so `{}` is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a simulation host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed simulation tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default)]
    pub collision: CollisionConfig,
    #[serde(default)]
    pub ricochet: RicochetConfig,
}

fn default_tick_hz() -> u32 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            collision: CollisionConfig::default(),
            ricochet: RicochetConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Wall-clock duration of one tick. A zero rate is treated as 1 Hz.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    /// Simulated seconds per tick.
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_hz.max(1) as f32
    }
}

/// Broad- and narrow-phase tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Edge length of a broad-phase grid cell, in world units.
    pub chunk_size: f32,
    /// Fraction of the penetration depth returned as the push.
    pub damping: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64.0,
            damping: 0.75,
        }
    }
}

/// Alignment band in which a contact counts as a glancing hit.
///
/// Alignment is the cosine between a mover's heading and the contact push:
/// head-on hits sit near -1, grazing hits near 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RicochetConfig {
    pub min_alignment: f32,
    pub max_alignment: f32,
}

impl Default for RicochetConfig {
    fn default() -> Self {
        Self {
            min_alignment: -0.6,
            max_alignment: 0.6,
        }
    }
}

impl RicochetConfig {
    /// True if `alignment` lies inside the band, bounds included.
    pub fn is_glancing(&self, alignment: f32) -> bool {
        (self.min_alignment..=self.max_alignment).contains(&alignment)
    }
}
