//! # Destruction Settings
//!
//! Tuning values loaded once at startup from TOML.
//!
//! ```toml
//! structural_margin = 2.0
//! probe_distance = 0.5
//! seed = 12648430
//!
//! [forward_impulse]
//! min = 200.0
//! max = 250.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DestructionError, DestructionResult};

/// Closed range a launch impulse magnitude is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpulseRange {
    /// Lower bound (inclusive).
    pub min: f32,
    /// Upper bound (inclusive).
    pub max: f32,
}

impl ImpulseRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &str) -> DestructionResult<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min < 0.0 || self.min > self.max {
            return Err(DestructionError::InvalidSettings(format!(
                "{name} must satisfy 0 <= min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Settings for every destructible in a world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestructionConfig {
    /// `min_voxel_count = ceil(anchor_count * structural_margin)`.
    pub structural_margin: f32,
    /// Length of the contact-resolving probe, centered on the raw impact.
    pub probe_distance: f32,
    /// Visible-voxel proxies shared by all destructibles.
    pub visible_pool_capacity: usize,
    /// Debris proxies shared by all destructibles.
    pub debris_pool_capacity: usize,
    /// Seconds a debris proxy lives before it settles and is recycled.
    pub debris_lifetime_secs: f32,
    /// Bounded capacity of the destruction event bus.
    pub event_capacity: usize,
    /// Seed for launch impulse randomness.
    pub seed: u64,
    /// Magnitude along the launch direction.
    pub forward_impulse: ImpulseRange,
    /// Magnitude along `cross(forward, up)`, random sign.
    pub lateral_impulse: ImpulseRange,
    /// Magnitude along world up, random sign.
    pub vertical_impulse: ImpulseRange,
}

impl Default for DestructionConfig {
    fn default() -> Self {
        Self {
            structural_margin: 2.0,
            probe_distance: 0.5,
            visible_pool_capacity: 4096,
            debris_pool_capacity: 1024,
            debris_lifetime_secs: 6.0,
            event_capacity: 1024,
            seed: 0x00C0_FFEE,
            forward_impulse: ImpulseRange::new(200.0, 250.0),
            lateral_impulse: ImpulseRange::new(150.0, 200.0),
            vertical_impulse: ImpulseRange::new(100.0, 150.0),
        }
    }
}

impl DestructionConfig {
    /// Parses and validates settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` for malformed TOML and `InvalidSettings` for
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> DestructionResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML settings file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`DestructionConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> DestructionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` naming the first bad field.
    pub fn validate(&self) -> DestructionResult<()> {
        if !(self.structural_margin.is_finite() && self.structural_margin > 0.0) {
            return Err(DestructionError::InvalidSettings(format!(
                "structural_margin must be positive, got {}",
                self.structural_margin
            )));
        }
        if !(self.probe_distance.is_finite() && self.probe_distance > 0.0) {
            return Err(DestructionError::InvalidSettings(format!(
                "probe_distance must be positive, got {}",
                self.probe_distance
            )));
        }
        if !(self.debris_lifetime_secs.is_finite() && self.debris_lifetime_secs > 0.0) {
            return Err(DestructionError::InvalidSettings(format!(
                "debris_lifetime_secs must be positive, got {}",
                self.debris_lifetime_secs
            )));
        }
        self.forward_impulse.validate("forward_impulse")?;
        self.lateral_impulse.validate("lateral_impulse")?;
        self.vertical_impulse.validate("vertical_impulse")?;
        if self.visible_pool_capacity == 0 || self.debris_pool_capacity == 0 {
            return Err(DestructionError::InvalidSettings(
                "pool capacities must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(DestructionError::InvalidSettings(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum non-separated voxels a destructible with `anchor_count`
    /// anchors needs to stay standing.
    #[must_use]
    pub fn min_voxel_count(&self, anchor_count: usize) -> usize {
        (anchor_count as f32 * self.structural_margin).ceil() as usize
    }
}
